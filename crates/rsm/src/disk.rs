//! Adapter for machines backed by durable storage.

use crate::managed::Capabilities;

use statemachine::{
    Entry, OnDiskStateMachine, Query, QueryResult, SmResult, SnapshotContext, SnapshotFile,
    SnapshotFileSet, StateMachineKind, StopSignal,
};
use std::io::{Read, Write};

/// Wraps a machine whose authoritative data lives in external storage.
///
/// `open` must complete exactly once before any of
/// update/lookup/sync/prepare/save/recover; it reports the index of the
/// last entry the machine's storage already applied so the engine can
/// resume without re-applying. Snapshots carry only the machine's
/// metadata; external files are never registered since the bulk data is
/// already durable.
pub struct OnDiskAdapter {
    sm: Box<dyn OnDiskStateMachine>,
    caps: Capabilities,
    opened: bool,
}

impl OnDiskAdapter {
    pub fn new(sm: Box<dyn OnDiskStateMachine>) -> Self {
        let caps = Capabilities {
            hash: sm.as_state_hash().is_some(),
            raw_lookup: sm.as_raw_lookup().is_some(),
        };
        Self {
            sm,
            caps,
            opened: false,
        }
    }

    fn ensure_opened(&self, op: &str) {
        assert!(
            self.opened,
            "{op} called before open on an on-disk state machine"
        );
    }

    pub fn open(&mut self, stop: &StopSignal) -> SmResult<u64> {
        assert!(
            !self.opened,
            "open called more than once on an on-disk state machine"
        );
        self.opened = true;
        self.sm.open(stop)
    }

    pub fn update(&mut self, entries: Vec<Entry>) -> SmResult<Vec<Entry>> {
        self.ensure_opened("update");
        self.sm.update(entries)
    }

    pub fn lookup(&self, query: Query) -> SmResult<QueryResult> {
        self.ensure_opened("lookup");
        self.sm.lookup(query)
    }

    pub fn raw_lookup(&self, query: &[u8]) -> SmResult<Vec<u8>> {
        self.caps.raw_lookup(self.sm.as_raw_lookup(), query)
    }

    pub fn sync(&mut self) -> SmResult<()> {
        self.ensure_opened("sync");
        self.sm.sync()
    }

    pub fn prepare(&mut self) -> SmResult<SnapshotContext> {
        self.ensure_opened("prepare");
        self.sm.prepare_snapshot()
    }

    pub fn save(
        &self,
        ctx: Option<SnapshotContext>,
        writer: &mut dyn Write,
        _files: &mut SnapshotFileSet,
        stop: &StopSignal,
    ) -> SmResult<()> {
        self.ensure_opened("save");
        self.sm.save_snapshot(ctx, writer, stop)
    }

    pub fn recover(
        &mut self,
        reader: &mut dyn Read,
        _files: &[SnapshotFile],
        stop: &StopSignal,
    ) -> SmResult<()> {
        self.ensure_opened("recover");
        self.sm.recover_from_snapshot(reader, stop)
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
        true
    }

    pub fn kind(&self) -> StateMachineKind {
        StateMachineKind::OnDisk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statemachine::{EntryResult, SmError};

    /// Pretends its storage already applied everything up to index 42.
    #[derive(Default)]
    struct Resumable;

    impl OnDiskStateMachine for Resumable {
        fn open(&mut self, _stop: &StopSignal) -> SmResult<u64> {
            Ok(42)
        }
        fn update(&mut self, mut entries: Vec<Entry>) -> SmResult<Vec<Entry>> {
            for entry in &mut entries {
                entry.result = EntryResult::value(entry.index);
            }
            Ok(entries)
        }
        fn lookup(&self, query: Query) -> SmResult<QueryResult> {
            Ok(query)
        }
        fn sync(&mut self) -> SmResult<()> {
            Ok(())
        }
        fn prepare_snapshot(&mut self) -> SmResult<SnapshotContext> {
            Ok(Box::new(42u64))
        }
        fn save_snapshot(
            &self,
            _ctx: Option<SnapshotContext>,
            writer: &mut dyn Write,
            _stop: &StopSignal,
        ) -> SmResult<()> {
            writer.write_all(b"meta")?;
            Ok(())
        }
        fn recover_from_snapshot(
            &mut self,
            _reader: &mut dyn Read,
            _stop: &StopSignal,
        ) -> SmResult<()> {
            Ok(())
        }
        fn close(&mut self) -> SmResult<()> {
            Ok(())
        }
    }

    fn opened_adapter() -> OnDiskAdapter {
        let mut adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        adapter.open(&StopSignal::new()).unwrap();
        adapter
    }

    #[test]
    fn open_reports_the_recovered_index() {
        let mut adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        assert_eq!(adapter.open(&StopSignal::new()).unwrap(), 42);
    }

    #[test]
    #[should_panic(expected = "open called more than once")]
    fn open_twice_is_a_contract_violation() {
        let mut adapter = opened_adapter();
        let _ = adapter.open(&StopSignal::new());
    }

    #[test]
    #[should_panic(expected = "update called before open")]
    fn update_before_open_is_a_contract_violation() {
        let mut adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        let _ = adapter.update(vec![Entry::new(1, vec![])]);
    }

    #[test]
    #[should_panic(expected = "lookup called before open")]
    fn lookup_before_open_is_a_contract_violation() {
        let adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        let _ = adapter.lookup(Box::new(()));
    }

    #[test]
    #[should_panic(expected = "sync called before open")]
    fn sync_before_open_is_a_contract_violation() {
        let mut adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        let _ = adapter.sync();
    }

    #[test]
    #[should_panic(expected = "prepare called before open")]
    fn prepare_before_open_is_a_contract_violation() {
        let mut adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        let _ = adapter.prepare();
    }

    #[test]
    #[should_panic(expected = "save called before open")]
    fn save_before_open_is_a_contract_violation() {
        let adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        let mut buf = Vec::new();
        let mut files = SnapshotFileSet::new();
        let _ = adapter.save(None, &mut buf, &mut files, &StopSignal::new());
    }

    #[test]
    #[should_panic(expected = "recover called before open")]
    fn recover_before_open_is_a_contract_violation() {
        let mut adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        let mut reader: &[u8] = b"";
        let _ = adapter.recover(&mut reader, &[], &StopSignal::new());
    }

    #[test]
    fn operations_delegate_after_open() {
        let mut adapter = opened_adapter();
        let out = adapter.update(vec![Entry::new(43, vec![])]).unwrap();
        assert_eq!(out[0].result.value, 43);
        adapter.sync().unwrap();

        let ctx = adapter.prepare().unwrap();
        let mut buf = Vec::new();
        let mut files = SnapshotFileSet::new();
        adapter
            .save(Some(ctx), &mut buf, &mut files, &StopSignal::new())
            .unwrap();
        assert_eq!(buf, b"meta");
        // The file collection never reaches an on-disk machine.
        assert!(files.is_empty());
    }

    #[test]
    fn close_and_capability_queries_need_no_open() {
        let mut adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        assert!(matches!(adapter.get_hash(), Err(SmError::NotImplemented)));
        assert!(matches!(
            adapter.raw_lookup(b"q"),
            Err(SmError::NotImplemented)
        ));
        adapter.close().unwrap();
    }

    #[test]
    fn flags_are_fixed() {
        let adapter = OnDiskAdapter::new(Box::<Resumable>::default());
        assert!(adapter.is_concurrent());
        assert!(adapter.is_on_disk());
        assert_eq!(adapter.kind(), StateMachineKind::OnDisk);
    }
}
