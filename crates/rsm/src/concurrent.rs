//! Adapter for batched machines with snapshot isolation.

use crate::managed::Capabilities;

use statemachine::{
    ConcurrentStateMachine, Entry, Query, QueryResult, SmResult, SnapshotContext, SnapshotFile,
    SnapshotFileSet, StateMachineKind, StopSignal,
};
use std::io::{Read, Write};

/// Wraps a machine that applies batches and can serialize a snapshot from
/// a previously captured context while later updates proceed. Isolation
/// between the captured view and ongoing updates is entirely the
/// machine's responsibility; the adapter threads the context through
/// unchanged.
pub struct ConcurrentAdapter {
    sm: Box<dyn ConcurrentStateMachine>,
    caps: Capabilities,
}

impl ConcurrentAdapter {
    pub fn new(sm: Box<dyn ConcurrentStateMachine>) -> Self {
        let caps = Capabilities {
            hash: sm.as_state_hash().is_some(),
            raw_lookup: sm.as_raw_lookup().is_some(),
        };
        Self { sm, caps }
    }

    pub fn open(&mut self, _stop: &StopSignal) -> SmResult<u64> {
        panic!("open called on a concurrent state machine");
    }

    pub fn update(&mut self, entries: Vec<Entry>) -> SmResult<Vec<Entry>> {
        self.sm.update(entries)
    }

    pub fn lookup(&self, query: Query) -> SmResult<QueryResult> {
        self.sm.lookup(query)
    }

    pub fn raw_lookup(&self, query: &[u8]) -> SmResult<Vec<u8>> {
        self.caps.raw_lookup(self.sm.as_raw_lookup(), query)
    }

    pub fn sync(&mut self) -> SmResult<()> {
        panic!("sync called on a concurrent state machine");
    }

    pub fn prepare(&mut self) -> SmResult<SnapshotContext> {
        self.sm.prepare_snapshot()
    }

    pub fn save(
        &self,
        ctx: Option<SnapshotContext>,
        writer: &mut dyn Write,
        files: &mut SnapshotFileSet,
        stop: &StopSignal,
    ) -> SmResult<()> {
        self.sm.save_snapshot(ctx, writer, files, stop)
    }

    pub fn recover(
        &mut self,
        reader: &mut dyn Read,
        files: &[SnapshotFile],
        stop: &StopSignal,
    ) -> SmResult<()> {
        self.sm.recover_from_snapshot(reader, files, stop)
    }

    pub fn close(&mut self) -> SmResult<()> {
        self.sm.close()
    }

    pub fn get_hash(&self) -> SmResult<u64> {
        self.caps.state_hash(self.sm.as_state_hash())
    }

    pub fn is_concurrent(&self) -> bool {
        true
    }

    pub fn is_on_disk(&self) -> bool {
        false
    }

    pub fn kind(&self) -> StateMachineKind {
        StateMachineKind::Concurrent
    }
}
