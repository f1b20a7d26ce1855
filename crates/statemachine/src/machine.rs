//! The three state machine flavours and their optional capabilities.

use crate::snapshot::{SnapshotFile, SnapshotFileSet};
use crate::stop::StopSignal;
use crate::{Entry, EntryResult, Query, QueryResult, SmResult, SnapshotContext};

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Discriminant for the flavour of a wrapped state machine. Fixed at
/// construction and constant for the machine's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateMachineKind {
    /// Single-entry synchronous machine.
    Regular,
    /// Batched machine capable of snapshotting concurrently with updates.
    Concurrent,
    /// Machine whose authoritative data lives on durable storage.
    OnDisk,
}

/// Deterministic digest of a machine's current state.
///
/// Optional; probed once when the machine is wrapped. Used for replica
/// state comparison, so the digest must be a pure function of the applied
/// entry sequence.
pub trait StateHash {
    fn state_hash(&self) -> SmResult<u64>;
}

/// Byte-in/byte-out query path distinct from the general polymorphic
/// lookup. Optional; probed once when the machine is wrapped.
pub trait RawLookup {
    fn raw_lookup(&self, query: &[u8]) -> SmResult<Vec<u8>>;
}

/// A synchronous state machine that applies one command at a time.
///
/// The apply engine serializes all calls; a regular machine cannot
/// snapshot while updates are in flight, so `save_snapshot` always runs
/// with the apply path quiesced and serializes live state.
pub trait StateMachine: Send {
    /// Apply a single committed command and return its result.
    fn update(&mut self, cmd: &[u8]) -> SmResult<EntryResult>;

    /// Read-only query against current state.
    fn lookup(&self, query: Query) -> SmResult<QueryResult>;

    /// Serialize current state into `writer`, registering any external
    /// files in `files`. Must poll `stop` and abort with
    /// [`SmError::Stopped`](crate::SmError::Stopped) when it fires.
    fn save_snapshot(
        &self,
        writer: &mut dyn Write,
        files: &mut SnapshotFileSet,
        stop: &StopSignal,
    ) -> SmResult<()>;

    /// Rebuild state from a snapshot stream and its external files. Same
    /// cancellation contract as `save_snapshot`.
    fn recover_from_snapshot(
        &mut self,
        reader: &mut dyn Read,
        files: &[SnapshotFile],
        stop: &StopSignal,
    ) -> SmResult<()>;

    /// Release resources. Called at most once.
    fn close(&mut self) -> SmResult<()>;

    /// Capability probe, checked once at wrap time.
    fn as_state_hash(&self) -> Option<&dyn StateHash> {
        None
    }

    /// Capability probe, checked once at wrap time.
    fn as_raw_lookup(&self) -> Option<&dyn RawLookup> {
        None
    }
}

/// A state machine that applies batches of entries and supports taking a
/// snapshot while continuing to serve later updates.
///
/// `prepare_snapshot` captures an isolation token cheaply; the machine is
/// responsible for keeping the captured view consistent (e.g. via
/// copy-on-write) while updates applied after the prepare proceed.
pub trait ConcurrentStateMachine: Send {
    /// Apply a non-empty ordered batch, filling each entry's result in
    /// place, and return the same sequence in the same order.
    fn update(&mut self, entries: Vec<Entry>) -> SmResult<Vec<Entry>>;

    /// Read-only query against current state.
    fn lookup(&self, query: Query) -> SmResult<QueryResult>;

    /// Capture an isolation point for a future `save_snapshot` without
    /// blocking subsequent updates.
    fn prepare_snapshot(&mut self) -> SmResult<SnapshotContext>;

    /// Serialize the state captured by `ctx` into `writer`. Updates
    /// applied after the matching `prepare_snapshot` must not be visible
    /// in the stream.
    fn save_snapshot(
        &self,
        ctx: Option<SnapshotContext>,
        writer: &mut dyn Write,
        files: &mut SnapshotFileSet,
        stop: &StopSignal,
    ) -> SmResult<()>;

    fn recover_from_snapshot(
        &mut self,
        reader: &mut dyn Read,
        files: &[SnapshotFile],
        stop: &StopSignal,
    ) -> SmResult<()>;

    /// Release resources. Called at most once.
    fn close(&mut self) -> SmResult<()>;

    fn as_state_hash(&self) -> Option<&dyn StateHash> {
        None
    }

    fn as_raw_lookup(&self) -> Option<&dyn RawLookup> {
        None
    }
}

/// A state machine whose authoritative data lives on durable storage.
///
/// `open` must be called exactly once, before anything else; it reports
/// the index of the last entry the machine's own storage already applied
/// so the engine can skip re-applying entries below it after a restart.
/// Snapshots here carry only the machine's metadata; the bulk of the data
/// is already durable.
pub trait OnDiskStateMachine: Send {
    /// One-time initialization. Returns the last applied index recovered
    /// from the machine's own storage. Polls `stop` during long recovery.
    fn open(&mut self, stop: &StopSignal) -> SmResult<u64>;

    /// Apply a non-empty ordered batch, filling results in place.
    fn update(&mut self, entries: Vec<Entry>) -> SmResult<Vec<Entry>>;

    /// Read-only query against current state.
    fn lookup(&self, query: Query) -> SmResult<QueryResult>;

    /// Force all in-core state down to stable storage.
    fn sync(&mut self) -> SmResult<()>;

    /// Capture an isolation point for a future `save_snapshot`.
    fn prepare_snapshot(&mut self) -> SmResult<SnapshotContext>;

    /// Serialize the metadata of the state captured by `ctx`. No external
    /// file registration; data files are already on durable storage.
    fn save_snapshot(
        &self,
        ctx: Option<SnapshotContext>,
        writer: &mut dyn Write,
        stop: &StopSignal,
    ) -> SmResult<()>;

    fn recover_from_snapshot(&mut self, reader: &mut dyn Read, stop: &StopSignal) -> SmResult<()>;

    /// Release resources. Called at most once.
    fn close(&mut self) -> SmResult<()>;

    fn as_state_hash(&self) -> Option<&dyn StateHash> {
        None
    }

    fn as_raw_lookup(&self) -> Option<&dyn RawLookup> {
        None
    }
}
