//! In-memory key-value store for tests and development.

use crate::{BatchOp, KvError, KvResult, KvStore, WriteBatch, keys_in_range, scan_map};
use std::collections::BTreeMap;

/// Volatile `BTreeMap`-backed store. Same contract as the durable store,
/// no persistence; `compact_range` is a no-op.
#[derive(Debug, Default)]
pub struct MemKv {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    closed: bool,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> KvResult<()> {
        if self.closed {
            return Err(KvError::Closed);
        }
        Ok(())
    }
}

impl KvStore for MemKv {
    fn name(&self) -> &'static str {
        "mem"
    }

    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.ensure_open()?;
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> KvResult<()> {
        self.ensure_open()?;
        self.map.remove(key);
        Ok(())
    }

    fn scan(
        &self,
        first: &[u8],
        last: &[u8],
        inclusive: bool,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> KvResult<bool>,
    ) -> KvResult<()> {
        self.ensure_open()?;
        scan_map(&self.map, first, last, inclusive, visit)
    }

    fn commit(&mut self, batch: WriteBatch) -> KvResult<()> {
        self.ensure_open()?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    self.map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    self.map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn remove_range(&mut self, first: &[u8], last: &[u8]) -> KvResult<()> {
        self.ensure_open()?;
        for key in keys_in_range(&self.map, first, last) {
            self.map.remove(&key);
        }
        Ok(())
    }

    fn compact_range(&mut self, _first: &[u8], _last: &[u8]) -> KvResult<()> {
        self.ensure_open()
    }

    fn close(&mut self) -> KvResult<()> {
        self.closed = true;
        self.map.clear();
        Ok(())
    }
}
