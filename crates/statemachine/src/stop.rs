//! Cooperative cancellation for long-running snapshot transfers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A clonable, poll-able stop flag.
///
/// The caller owning a long-running `open`, `save_snapshot` or
/// `recover_from_snapshot` call triggers the signal; the machine polls it
/// at safe points and aborts the transfer promptly with
/// [`SmError::Stopped`](crate::SmError::Stopped) instead of completing.
/// Timeout policy belongs to the caller; this type carries none.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the in-flight operation abort.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Poll the signal. Once true, stays true.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
