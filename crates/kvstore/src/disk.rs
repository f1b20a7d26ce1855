//! Durable log-structured key-value store.
//!
//! ## File Layout
//!
//! ```text
//! {dir}/
//! ├── kv-{generation}.log   # Append-only mutation records
//! └── manifest.json         # Current log generation
//! ```
//!
//! ## Record Format
//!
//! Each record in the log has a fixed header followed by a variable-length
//! payload:
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Header (12 bytes)                  │
//! │ ├─ magic: u32 (0x4b564c47 "KVLG") │
//! │ ├─ checksum: u32 (CRC32)          │
//! │ └─ length: u32                     │
//! ├────────────────────────────────────┤
//! │ Payload (bincode LogRecord)        │
//! └────────────────────────────────────┘
//! ```
//!
//! On open, the live map is rebuilt by replaying the current log; replay
//! stops at the first record that fails magic or checksum validation, so a
//! torn tail from a crash is dropped rather than applied. A batch commit
//! is a single record, which makes it atomic across restarts. Compaction
//! rewrites a fresh log from live data and flips the manifest atomically.

use crate::{BatchOp, KvConfig, KvError, KvResult, KvStore, WriteBatch, keys_in_range, scan_map};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for record validation: "KVLG" in ASCII
const KV_MAGIC: u32 = 0x4b564c47;

/// Size of the record header in bytes
const HEADER_SIZE: usize = 12;

/// Header for each record in the log.
#[derive(Clone, Debug)]
struct RecordHeader {
    magic: u32,
    checksum: u32,
    length: u32,
}

impl RecordHeader {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf[8..12].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            checksum: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            length: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
        }
    }
}

/// One durable mutation. A `Batch` is written as a single record so the
/// whole batch survives or none of it does.
#[derive(Debug, Serialize, Deserialize)]
enum LogRecord {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    RemoveRange { first: Vec<u8>, last: Vec<u8> },
    Batch { ops: Vec<BatchOp> },
}

/// Persistent pointer to the current log generation, written atomically.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Manifest {
    generation: u64,
}

/// Durable key-value store that survives restarts.
pub struct DiskKv {
    config: KvConfig,
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Append handle for the current log; `None` once closed.
    log: Option<File>,
    generation: u64,
}

impl DiskKv {
    /// Open or create a store under `config.dir`.
    ///
    /// On startup:
    /// 1. Creates the directory if needed
    /// 2. Loads `manifest.json` to find the current log generation
    /// 3. Rebuilds the live map by replaying the log
    pub fn open(config: KvConfig) -> KvResult<Self> {
        fs::create_dir_all(&config.dir)?;

        let manifest = Self::load_manifest(&config.dir)?;
        let log_path = Self::log_path(&config.dir, manifest.generation);
        let map = Self::replay(&log_path)?;
        let log = OpenOptions::new().create(true).append(true).open(&log_path)?;

        Ok(Self {
            config,
            map,
            log: Some(log),
            generation: manifest.generation,
        })
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn log_path(dir: &Path, generation: u64) -> PathBuf {
        dir.join(format!("kv-{generation:06}.log"))
    }

    fn load_manifest(dir: &Path) -> KvResult<Manifest> {
        let path = dir.join("manifest.json");
        if !path.exists() {
            return Ok(Manifest::default());
        }
        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| KvError::Corrupted(format!("manifest: {e}")))
    }

    /// Write the manifest atomically: tmp file, fsync, rename, dir fsync.
    fn save_manifest(&self, manifest: &Manifest) -> io::Result<()> {
        let path = self.config.dir.join("manifest.json");
        let temp_path = self.config.dir.join("manifest.json.tmp");

        let contents =
            serde_json::to_string_pretty(manifest).map_err(|e| io::Error::other(e.to_string()))?;
        fs::write(&temp_path, &contents)?;

        let file = File::open(&temp_path)?;
        file.sync_all()?;

        fs::rename(&temp_path, &path)?;

        let dir = File::open(&self.config.dir)?;
        dir.sync_all()?;

        Ok(())
    }

    /// Rebuild the live map by replaying the log. Replay stops at the
    /// first record that fails validation, dropping a torn tail.
    fn replay(log_path: &Path) -> KvResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut map = BTreeMap::new();

        if !log_path.exists() {
            return Ok(map);
        }

        let file = File::open(log_path)?;
        let mut reader = BufReader::new(file);

        loop {
            let mut header_buf = [0u8; HEADER_SIZE];
            match reader.read_exact(&mut header_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let header = RecordHeader::from_bytes(&header_buf);
            if header.magic != KV_MAGIC {
                break;
            }

            let mut payload = vec![0u8; header.length as usize];
            if reader.read_exact(&mut payload).is_err() {
                break;
            }

            if crc32fast::hash(&payload) != header.checksum {
                break;
            }

            let config = bincode::config::legacy();
            match bincode::serde::decode_from_slice::<LogRecord, _>(&payload, config) {
                Ok((record, _)) => Self::apply_record(&mut map, record),
                Err(_) => break,
            }
        }

        Ok(map)
    }

    fn apply_record(map: &mut BTreeMap<Vec<u8>, Vec<u8>>, record: LogRecord) {
        match record {
            LogRecord::Put { key, value } => {
                map.insert(key, value);
            }
            LogRecord::Delete { key } => {
                map.remove(&key);
            }
            LogRecord::RemoveRange { first, last } => {
                for key in keys_in_range(map, &first, &last) {
                    map.remove(&key);
                }
            }
            LogRecord::Batch { ops } => {
                for op in ops {
                    match op {
                        BatchOp::Put { key, value } => {
                            map.insert(key, value);
                        }
                        BatchOp::Delete { key } => {
                            map.remove(&key);
                        }
                    }
                }
            }
        }
    }

    /// Append one record to the log, fsyncing when configured.
    fn append_record(&mut self, record: &LogRecord) -> KvResult<()> {
        let Some(file) = self.log.as_mut() else {
            return Err(KvError::Closed);
        };

        let config = bincode::config::legacy();
        let payload = bincode::serde::encode_to_vec(record, config)
            .map_err(|e| io::Error::other(e.to_string()))?;

        let header = RecordHeader {
            magic: KV_MAGIC,
            checksum: crc32fast::hash(&payload),
            length: payload.len() as u32,
        };

        file.write_all(&header.to_bytes())?;
        file.write_all(&payload)?;
        if self.config.fsync {
            file.sync_all()?;
        }

        Ok(())
    }

    fn ensure_open(&self) -> KvResult<()> {
        if self.log.is_none() {
            return Err(KvError::Closed);
        }
        Ok(())
    }
}

impl KvStore for DiskKv {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        let record = LogRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        self.append_record(&record)?;
        Self::apply_record(&mut self.map, record);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> KvResult<()> {
        let record = LogRecord::Delete { key: key.to_vec() };
        self.append_record(&record)?;
        Self::apply_record(&mut self.map, record);
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
        if batch.is_empty() {
            return self.ensure_open();
        }
        let record = LogRecord::Batch {
            ops: batch.into_ops(),
        };
        self.append_record(&record)?;
        Self::apply_record(&mut self.map, record);
        Ok(())
    }

    fn remove_range(&mut self, first: &[u8], last: &[u8]) -> KvResult<()> {
        let record = LogRecord::RemoveRange {
            first: first.to_vec(),
            last: last.to_vec(),
        };
        self.append_record(&record)?;
        Self::apply_record(&mut self.map, record);
        Ok(())
    }

    /// Rewrite the log from live data under a new generation, then flip
    /// the manifest and drop the old log. The whole log is rewritten, so
    /// obsolete records inside the requested range are reclaimed along
    /// with everything else.
    fn compact_range(&mut self, _first: &[u8], _last: &[u8]) -> KvResult<()> {
        self.ensure_open()?;

        let next = self.generation + 1;
        let next_path = Self::log_path(&self.config.dir, next);
        let temp_path = next_path.with_extension("log.tmp");

        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            let config = bincode::config::legacy();
            for (key, value) in &self.map {
                let record = LogRecord::Put {
                    key: key.clone(),
                    value: value.clone(),
                };
                let payload = bincode::serde::encode_to_vec(&record, config)
                    .map_err(|e| io::Error::other(e.to_string()))?;
                let header = RecordHeader {
                    magic: KV_MAGIC,
                    checksum: crc32fast::hash(&payload),
                    length: payload.len() as u32,
                };
                writer.write_all(&header.to_bytes())?;
                writer.write_all(&payload)?;
            }
            writer.flush()?;
            let file = writer.into_inner().map_err(|e| io::Error::other(e.to_string()))?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &next_path)?;
        let dir = File::open(&self.config.dir)?;
        dir.sync_all()?;

        self.save_manifest(&Manifest { generation: next })?;

        let old_path = Self::log_path(&self.config.dir, self.generation);
        let _ = fs::remove_file(&old_path);

        self.log = Some(OpenOptions::new().append(true).open(&next_path)?);
        self.generation = next;
        Ok(())
    }

    fn close(&mut self) -> KvResult<()> {
        if let Some(file) = self.log.take() {
            file.sync_all()?;
        }
        self.map.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open_kv(dir: &Path) -> DiskKv {
        let config = KvConfig::builder().dir(dir.to_path_buf()).fsync(false).build();
        DiskKv::open(config).unwrap()
    }

    #[test]
    fn open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("store");
        let _kv = open_kv(&nested);
        assert!(nested.exists());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut kv = open_kv(dir.path());
            kv.put(b"alpha", b"1").unwrap();
            kv.put(b"beta", b"2").unwrap();
            kv.delete(b"alpha").unwrap();
            kv.close().unwrap();
        }
        {
            let kv = open_kv(dir.path());
            assert_eq!(kv.get(b"alpha").unwrap(), None);
            assert_eq!(kv.get(b"beta").unwrap(), Some(b"2".to_vec()));
        }
    }

    #[test]
    fn batch_commit_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut kv = open_kv(dir.path());
            let mut batch = WriteBatch::new();
            batch.put(b"a", b"1");
            batch.put(b"b", b"2");
            batch.delete(b"a");
            kv.commit(batch).unwrap();
        }
        {
            let kv = open_kv(dir.path());
            assert_eq!(kv.get(b"a").unwrap(), None);
            assert_eq!(kv.get(b"b").unwrap(), Some(b"2".to_vec()));
        }
    }

    #[test]
    fn torn_tail_is_dropped_on_replay() {
        let dir = TempDir::new().unwrap();
        {
            let mut kv = open_kv(dir.path());
            kv.put(b"kept", b"1").unwrap();
        }

        // Simulate a crash mid-append: garbage where a header should be.
        let log_path = DiskKv::log_path(dir.path(), 0);
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(&[0xde, 0xad, 0xbe]).unwrap();
        drop(file);

        let kv = open_kv(dir.path());
        assert_eq!(kv.get(b"kept").unwrap(), Some(b"1".to_vec()));
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn corrupted_payload_stops_replay() {
        let dir = TempDir::new().unwrap();
        {
            let mut kv = open_kv(dir.path());
            kv.put(b"first", b"1").unwrap();
            kv.put(b"second", b"2").unwrap();
        }

        // Flip a byte in the last record's payload.
        let log_path = DiskKv::log_path(dir.path(), 0);
        let mut contents = fs::read(&log_path).unwrap();
        let last = contents.len() - 1;
        contents[last] ^= 0xff;
        fs::write(&log_path, &contents).unwrap();

        let kv = open_kv(dir.path());
        assert_eq!(kv.get(b"first").unwrap(), Some(b"1".to_vec()));
        assert_eq!(kv.get(b"second").unwrap(), None);
    }

    #[test]
    fn remove_range_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut kv = open_kv(dir.path());
            for key in [&b"a"[..], b"b", b"c"] {
                kv.put(key, b"v").unwrap();
            }
            kv.remove_range(b"a", b"c").unwrap();
        }
        {
            let kv = open_kv(dir.path());
            assert_eq!(kv.get(b"a").unwrap(), None);
            assert_eq!(kv.get(b"b").unwrap(), None);
            assert_eq!(kv.get(b"c").unwrap(), Some(b"v".to_vec()));
        }
    }

    #[test]
    fn compaction_preserves_live_data() {
        let dir = TempDir::new().unwrap();
        {
            let mut kv = open_kv(dir.path());
            for i in 0..50u32 {
                kv.put(format!("key-{i:03}").as_bytes(), b"old").unwrap();
            }
            for i in 0..50u32 {
                kv.put(format!("key-{i:03}").as_bytes(), b"new").unwrap();
            }
            for i in 25..50u32 {
                kv.delete(format!("key-{i:03}").as_bytes()).unwrap();
            }

            let before = fs::metadata(DiskKv::log_path(dir.path(), 0)).unwrap().len();
            kv.compact_range(b"", b"\xff").unwrap();
            let after = fs::metadata(DiskKv::log_path(dir.path(), 1)).unwrap().len();
            assert!(after < before);
            assert!(!DiskKv::log_path(dir.path(), 0).exists());

            // Still writable after the generation flip.
            kv.put(b"post", b"compact").unwrap();
        }
        {
            let kv = open_kv(dir.path());
            assert_eq!(kv.len(), 26);
            assert_eq!(kv.get(b"key-000").unwrap(), Some(b"new".to_vec()));
            assert_eq!(kv.get(b"key-030").unwrap(), None);
            assert_eq!(kv.get(b"post").unwrap(), Some(b"compact".to_vec()));
        }
    }

    #[test]
    fn scan_sees_replayed_data_in_order() {
        let dir = TempDir::new().unwrap();
        {
            let mut kv = open_kv(dir.path());
            kv.put(b"c", b"3").unwrap();
            kv.put(b"a", b"1").unwrap();
            kv.put(b"b", b"2").unwrap();
        }

        let kv = open_kv(dir.path());
        let mut keys = Vec::new();
        kv.scan(b"a", b"c", true, &mut |key, _| {
            keys.push(key.to_vec());
            Ok(true)
        })
        .unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn closed_store_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let mut kv = open_kv(dir.path());
        kv.close().unwrap();
        assert!(matches!(kv.put(b"a", b"1"), Err(KvError::Closed)));
        assert!(matches!(kv.get(b"a"), Err(KvError::Closed)));
    }
}
