//! Byte-oriented key-value contract for the log and snapshot persistence
//! layer.
//!
//! The persistence layer below the apply engine talks to storage only
//! through [`KvStore`]: point get/put/delete, ordered range iteration
//! between byte bounds, atomic batched writes, range deletion and manual
//! compaction. Two implementations ship here: [`MemKv`] for tests and
//! development, and [`DiskKv`], a durable log-structured store.

pub mod disk;
pub mod mem;

pub use disk::DiskKv;
pub use mem::MemKv;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::ops::Bound;
use std::path::PathBuf;
use thiserror::Error;

/// Canonical error type for key-value storage.
#[derive(Error, Debug)]
pub enum KvError {
    /// A durable record failed validation while being read back.
    #[error("corrupted: {0}")]
    Corrupted(String),
    /// The store was closed and can no longer serve requests.
    #[error("store closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `KvError`.
pub type KvResult<T> = Result<T, KvError>;

/// Configuration for a durable key-value store.
///
/// # Example
/// ```
/// use kvstore::KvConfig;
/// use std::path::PathBuf;
///
/// let config = KvConfig::builder()
///     .dir(PathBuf::from("./kv_data"))
///     .fsync(false)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct KvConfig {
    /// Directory holding the record log and manifest.
    pub dir: PathBuf,
    /// Fsync the log after every mutation. Disable only where losing the
    /// tail of the log on crash is acceptable.
    #[builder(default = true)]
    pub fsync: bool,
}

/// One operation queued in a [`WriteBatch`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// An ordered set of mutations committed atomically.
///
/// Either every operation in the batch becomes visible and durable, or
/// none does.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(BatchOp::Delete { key: key.to_vec() });
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Byte-range key-value storage boundary.
///
/// Keys are opaque byte strings ordered lexicographically. Implementations
/// assume a single writer; callers serialize mutations.
pub trait KvStore: Send {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Point lookup. `None` when the key is absent.
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> KvResult<()>;

    fn delete(&mut self, key: &[u8]) -> KvResult<()>;

    /// Visit pairs in key order from `first` up to `last`; `inclusive`
    /// selects whether `last` itself is visited. The visitor returns
    /// `false` to stop early.
    fn scan(
        &self,
        first: &[u8],
        last: &[u8],
        inclusive: bool,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> KvResult<bool>,
    ) -> KvResult<()>;

    /// Apply a batch of mutations atomically.
    fn commit(&mut self, batch: WriteBatch) -> KvResult<()>;

    /// Delete every key in the half-open range `[first, last)`.
    fn remove_range(&mut self, first: &[u8], last: &[u8]) -> KvResult<()>;

    /// Reclaim space held by obsolete records overlapping `[first, last)`.
    /// Implementations may compact more than the requested range.
    fn compact_range(&mut self, first: &[u8], last: &[u8]) -> KvResult<()>;

    /// Flush and release resources. Call at most once.
    fn close(&mut self) -> KvResult<()>;
}

pub(crate) fn scan_map(
    map: &BTreeMap<Vec<u8>, Vec<u8>>,
    first: &[u8],
    last: &[u8],
    inclusive: bool,
    visit: &mut dyn FnMut(&[u8], &[u8]) -> KvResult<bool>,
) -> KvResult<()> {
    if first > last {
        return Ok(());
    }
    let upper = if inclusive {
        Bound::Included(last)
    } else {
        Bound::Excluded(last)
    };
    for (key, value) in map.range::<[u8], _>((Bound::Included(first), upper)) {
        if !visit(key, value)? {
            break;
        }
    }
    Ok(())
}

pub(crate) fn keys_in_range(
    map: &BTreeMap<Vec<u8>, Vec<u8>>,
    first: &[u8],
    last: &[u8],
) -> Vec<Vec<u8>> {
    if first >= last {
        return Vec::new();
    }
    map.range::<[u8], _>((Bound::Included(first), Bound::Excluded(last)))
        .map(|(key, _)| key.clone())
        .collect()
}
