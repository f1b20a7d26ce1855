//! Application state machine contract for the replicated log.
//!
//! A replicated object is an application-supplied state machine that the
//! apply engine drives with already-agreed-upon log entries. This crate
//! defines the three machine flavours an application can implement, the
//! optional extra capabilities a machine may declare, and the data types
//! that cross the boundary (log entries, snapshot streams, the cooperative
//! stop signal).
//!
//! A machine implements exactly one of:
//!
//! - [`StateMachine`] — applies one entry at a time and cannot snapshot
//!   while live.
//! - [`ConcurrentStateMachine`] — applies batches and can produce an
//!   isolated snapshot context while continuing to serve later updates.
//! - [`OnDiskStateMachine`] — keeps its authoritative data on durable
//!   storage; adds a one-time `open` step and a durability `sync`.
//!
//! Machines may additionally implement [`StateHash`] and/or [`RawLookup`];
//! both are probed once when the machine is wrapped for the apply engine.

pub mod entry;
pub mod machine;
pub mod snapshot;
pub mod stop;

pub use entry::{Entry, EntryResult};
pub use machine::{
    ConcurrentStateMachine, OnDiskStateMachine, RawLookup, StateHash, StateMachine,
    StateMachineKind,
};
pub use snapshot::{SnapshotFile, SnapshotFileSet};
pub use stop::StopSignal;

use std::any::Any;
use std::io;
use thiserror::Error;

/// Polymorphic query handed to [`machine::StateMachine::lookup`]. The
/// machine downcasts it to whatever query type it understands.
pub type Query = Box<dyn Any + Send>;

/// Polymorphic result returned from a lookup.
pub type QueryResult = Box<dyn Any + Send>;

/// Opaque point-in-time isolation token returned by `prepare_snapshot` and
/// handed back, unchanged, to the matching `save_snapshot` call.
pub type SnapshotContext = Box<dyn Any + Send>;

/// Canonical error type for state machine operations.
///
/// Errors surfaced by the wrapped machine propagate through the apply
/// engine verbatim; `NotImplemented` and `Stopped` are stable signals the
/// caller is expected to branch on.
#[derive(Error, Debug)]
pub enum SmError {
    /// The machine does not provide the requested optional capability.
    #[error("not implemented by this state machine")]
    NotImplemented,
    /// A snapshot save or recover was aborted via the stop signal.
    #[error("snapshot stopped by request")]
    Stopped,
    /// Failure reported by the application state machine.
    #[error("state machine: {0}")]
    Machine(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries an `SmError`.
pub type SmResult<T> = Result<T, SmError>;
