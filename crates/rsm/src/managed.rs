//! The closed union the apply engine programs against.

use crate::concurrent::ConcurrentAdapter;
use crate::disk::OnDiskAdapter;
use crate::regular::RegularAdapter;

use statemachine::{
    ConcurrentStateMachine, Entry, OnDiskStateMachine, Query, QueryResult, RawLookup, SmError,
    SmResult, SnapshotContext, SnapshotFile, SnapshotFileSet, StateHash, StateMachine,
    StateMachineKind, StopSignal,
};
use std::io::{Read, Write};

/// Optional capabilities of a wrapped machine, probed once at
/// construction. Absence is permanent for the adapter's lifetime; the
/// hot apply path never re-probes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Capabilities {
    pub(crate) hash: bool,
    pub(crate) raw_lookup: bool,
}

impl Capabilities {
    pub(crate) fn state_hash(&self, machine: Option<&dyn StateHash>) -> SmResult<u64> {
        match machine {
            Some(hash) if self.hash => hash.state_hash(),
            _ => Err(SmError::NotImplemented),
        }
    }

    pub(crate) fn raw_lookup(
        &self,
        machine: Option<&dyn RawLookup>,
        query: &[u8],
    ) -> SmResult<Vec<u8>> {
        match machine {
            Some(raw) if self.raw_lookup => raw.raw_lookup(query),
            _ => Err(SmError::NotImplemented),
        }
    }
}

/// A state machine wrapped for the apply engine.
///
/// Exactly one instance exists per replicated object. The engine
/// serializes all `update` calls; the adapter performs no locking of its
/// own. Lifecycle: on-disk machines must see `open` exactly once before
/// anything else, the other two flavours must never see it; every
/// flavour sees `close` at most once.
pub enum ManagedStateMachine {
    Regular(RegularAdapter),
    Concurrent(ConcurrentAdapter),
    OnDisk(OnDiskAdapter),
}

impl ManagedStateMachine {
    /// Wrap a single-entry synchronous machine.
    pub fn regular(sm: Box<dyn StateMachine>) -> Self {
        Self::Regular(RegularAdapter::new(sm))
    }

    /// Wrap a batched machine capable of concurrent snapshots.
    pub fn concurrent(sm: Box<dyn ConcurrentStateMachine>) -> Self {
        Self::Concurrent(ConcurrentAdapter::new(sm))
    }

    /// Wrap a machine whose authoritative data is on durable storage.
    pub fn on_disk(sm: Box<dyn OnDiskStateMachine>) -> Self {
        Self::OnDisk(OnDiskAdapter::new(sm))
    }

    /// One-time initialization for on-disk machines. Returns the index of
    /// the last entry already applied by the machine's own storage.
    ///
    /// # Panics
    /// On the regular and concurrent variants, and on a second call to
    /// the on-disk variant.
    pub fn open(&mut self, stop: &StopSignal) -> SmResult<u64> {
        match self {
            Self::Regular(sm) => sm.open(stop),
            Self::Concurrent(sm) => sm.open(stop),
            Self::OnDisk(sm) => sm.open(stop),
        }
    }

    /// Apply a non-empty ordered batch of committed entries, filling each
    /// entry's result in place. The same sequence flows back in the same
    /// order.
    ///
    /// # Panics
    /// On the regular variant when the batch size is not exactly one.
    pub fn update(&mut self, entries: Vec<Entry>) -> SmResult<Vec<Entry>> {
        match self {
            Self::Regular(sm) => sm.update(entries),
            Self::Concurrent(sm) => sm.update(entries),
            Self::OnDisk(sm) => sm.update(entries),
        }
    }

    /// Read-only query against current state.
    pub fn lookup(&self, query: Query) -> SmResult<QueryResult> {
        match self {
            Self::Regular(sm) => sm.lookup(query),
            Self::Concurrent(sm) => sm.lookup(query),
            Self::OnDisk(sm) => sm.lookup(query),
        }
    }

    /// Byte-oriented read-only query. Returns
    /// [`SmError::NotImplemented`] when the wrapped machine did not
    /// declare the capability.
    pub fn raw_lookup(&self, query: &[u8]) -> SmResult<Vec<u8>> {
        match self {
            Self::Regular(sm) => sm.raw_lookup(query),
            Self::Concurrent(sm) => sm.raw_lookup(query),
            Self::OnDisk(sm) => sm.raw_lookup(query),
        }
    }

    /// Force in-core state down to stable storage.
    ///
    /// # Panics
    /// On the regular and concurrent variants; only on-disk machines
    /// carry durable state.
    pub fn sync(&mut self) -> SmResult<()> {
        match self {
            Self::Regular(sm) => sm.sync(),
            Self::Concurrent(sm) => sm.sync(),
            Self::OnDisk(sm) => sm.sync(),
        }
    }

    /// Capture an isolation point for a future [`save`](Self::save)
    /// without blocking subsequent updates.
    ///
    /// # Panics
    /// On the regular variant, which has no isolation mechanism.
    pub fn prepare(&mut self) -> SmResult<SnapshotContext> {
        match self {
            Self::Regular(sm) => sm.prepare(),
            Self::Concurrent(sm) => sm.prepare(),
            Self::OnDisk(sm) => sm.prepare(),
        }
    }

    /// Serialize the state captured at `ctx` (or live state, for the
    /// regular variant) into `writer`, registering external files in
    /// `files`. Cancellable through `stop`; a cancelled save returns an
    /// error and leaves the written bytes unusable.
    ///
    /// # Panics
    /// On the regular variant when `ctx` is present.
    pub fn save(
        &self,
        ctx: Option<SnapshotContext>,
        writer: &mut dyn Write,
        files: &mut SnapshotFileSet,
        stop: &StopSignal,
    ) -> SmResult<()> {
        match self {
            Self::Regular(sm) => sm.save(ctx, writer, files, stop),
            Self::Concurrent(sm) => sm.save(ctx, writer, files, stop),
            Self::OnDisk(sm) => sm.save(ctx, writer, files, stop),
        }
    }

    /// Rebuild state from a previously produced snapshot. Same
    /// cancellation contract as [`save`](Self::save).
    pub fn recover(
        &mut self,
        reader: &mut dyn Read,
        files: &[SnapshotFile],
        stop: &StopSignal,
    ) -> SmResult<()> {
        match self {
            Self::Regular(sm) => sm.recover(reader, files, stop),
            Self::Concurrent(sm) => sm.recover(reader, files, stop),
            Self::OnDisk(sm) => sm.recover(reader, files, stop),
        }
    }

    /// Release resources. Call at most once.
    pub fn close(&mut self) -> SmResult<()> {
        match self {
            Self::Regular(sm) => sm.close(),
            Self::Concurrent(sm) => sm.close(),
            Self::OnDisk(sm) => sm.close(),
        }
    }

    /// Deterministic digest of current state, or
    /// [`SmError::NotImplemented`] when the capability is absent.
    pub fn get_hash(&self) -> SmResult<u64> {
        match self {
            Self::Regular(sm) => sm.get_hash(),
            Self::Concurrent(sm) => sm.get_hash(),
            Self::OnDisk(sm) => sm.get_hash(),
        }
    }

    /// Whether the machine can snapshot concurrently with updates.
    /// Constant for the adapter's lifetime.
    pub fn is_concurrent(&self) -> bool {
        match self {
            Self::Regular(sm) => sm.is_concurrent(),
            Self::Concurrent(sm) => sm.is_concurrent(),
            Self::OnDisk(sm) => sm.is_concurrent(),
        }
    }

    /// Whether the machine keeps its authoritative data on durable
    /// storage. Constant for the adapter's lifetime.
    pub fn is_on_disk(&self) -> bool {
        match self {
            Self::Regular(sm) => sm.is_on_disk(),
            Self::Concurrent(sm) => sm.is_on_disk(),
            Self::OnDisk(sm) => sm.is_on_disk(),
        }
    }

    /// Flavour discriminant, fixed at construction.
    pub fn kind(&self) -> StateMachineKind {
        match self {
            Self::Regular(sm) => sm.kind(),
            Self::Concurrent(sm) => sm.kind(),
            Self::OnDisk(sm) => sm.kind(),
        }
    }
}
