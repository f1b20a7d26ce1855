//! Adapter for single-entry synchronous machines.

use crate::managed::Capabilities;

use statemachine::{
    Entry, Query, QueryResult, SmResult, SnapshotContext, SnapshotFile, SnapshotFileSet,
    StateMachine, StateMachineKind, StopSignal,
};
use std::io::{Read, Write};

/// Wraps a machine that applies one entry at a time and cannot snapshot
/// while live. The caller serializes `save` with `update`; there is no
/// isolation mechanism, so `save` always serializes current state and
/// must not receive a snapshot context.
pub struct RegularAdapter {
    sm: Box<dyn StateMachine>,
    caps: Capabilities,
}

impl RegularAdapter {
    pub fn new(sm: Box<dyn StateMachine>) -> Self {
        let caps = Capabilities {
            hash: sm.as_state_hash().is_some(),
            raw_lookup: sm.as_raw_lookup().is_some(),
        };
        Self { sm, caps }
    }

    pub fn open(&mut self, _stop: &StopSignal) -> SmResult<u64> {
        panic!("open called on a regular state machine");
    }

    pub fn update(&mut self, mut entries: Vec<Entry>) -> SmResult<Vec<Entry>> {
        assert!(
            entries.len() == 1,
            "regular state machine update takes exactly one entry, got {}",
            entries.len()
        );
        let result = self.sm.update(&entries[0].cmd)?;
        entries[0].result = result;
        Ok(entries)
    }

    pub fn lookup(&self, query: Query) -> SmResult<QueryResult> {
        self.sm.lookup(query)
    }

    pub fn raw_lookup(&self, query: &[u8]) -> SmResult<Vec<u8>> {
        self.caps.raw_lookup(self.sm.as_raw_lookup(), query)
    }

    pub fn sync(&mut self) -> SmResult<()> {
        panic!("sync called on a regular state machine");
    }

    pub fn prepare(&mut self) -> SmResult<SnapshotContext> {
        panic!("prepare called on a regular state machine");
    }

    pub fn save(
        &self,
        ctx: Option<SnapshotContext>,
        writer: &mut dyn Write,
        files: &mut SnapshotFileSet,
        stop: &StopSignal,
    ) -> SmResult<()> {
        assert!(
            ctx.is_none(),
            "snapshot context passed to a regular state machine"
        );
        self.sm.save_snapshot(writer, files, stop)
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
        false
    }

    pub fn is_on_disk(&self) -> bool {
        false
    }

    pub fn kind(&self) -> StateMachineKind {
        StateMachineKind::Regular
    }
}
