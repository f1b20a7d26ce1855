//! Snapshot stream collaborators.
//!
//! A snapshot is a primary byte stream owned by the machine plus, for
//! machines that keep large blobs outside it, a set of registered external
//! files captured alongside the stream. The stream format belongs entirely
//! to the machine; this module only carries the file registrations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An external file captured as part of a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Machine-assigned identifier, unique within one snapshot.
    pub file_id: u64,
    /// Location of the file at registration time.
    pub path: PathBuf,
    /// Application-defined metadata describing the file.
    pub metadata: Vec<u8>,
}

/// Ordered collection of external files registered during a snapshot save.
///
/// The order of registration is preserved and presented unchanged to
/// `recover_from_snapshot` on the restoring node.
#[derive(Debug, Default)]
pub struct SnapshotFileSet {
    files: Vec<SnapshotFile>,
}

impl SnapshotFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an external file to be captured with the snapshot.
    pub fn add_file(&mut self, file_id: u64, path: impl Into<PathBuf>, metadata: Vec<u8>) {
        self.files.push(SnapshotFile {
            file_id,
            path: path.into(),
            metadata,
        });
    }

    pub fn files(&self) -> &[SnapshotFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<SnapshotFile> {
        self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
