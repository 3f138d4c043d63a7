//! Append-only tombstone log.
//!
//! Each record is a big-endian `u32` length followed by a `bincode`-encoded
//! [`Record`]. Records are synced to disk before [`TombstoneLog::add`] or
//! [`TombstoneLog::remove`] return, and replayed in order on open. A torn
//! record at the end of the file (crash mid-append) is ignored.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::StorageResult;
use crate::keys::{ChunkKey, Key};

#[derive(Debug, Serialize, Deserialize)]
enum Record {
    Add(Key),
    Remove(Key),
}

/// Persistent set of keys deleted at one node.
#[derive(Debug)]
pub struct TombstoneLog {
    path: PathBuf,
    keys: FxHashSet<Key>,
}

impl TombstoneLog {
    /// Open the log at `path`, replaying it if it exists.
    ///
    /// The file is only created by the first append.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut keys = FxHashSet::default();
        let mut rest = bytes.as_slice();
        while !rest.is_empty() {
            if rest.len() < 4 {
                warn!(path = %path.display(), "ignoring torn tombstone record");
                break;
            }
            let len = BigEndian::read_u32(rest) as usize;
            let Some(body) = rest.get(4..4 + len) else {
                warn!(path = %path.display(), "ignoring torn tombstone record");
                break;
            };
            match bincode::deserialize(body)? {
                Record::Add(key) => keys.insert(key),
                Record::Remove(key) => keys.remove(&key),
            };
            rest = &rest[4 + len..];
        }

        Ok(Self { path, keys })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }

    #[must_use]
    pub fn contains_chunk(&self, key: &ChunkKey) -> bool {
        // Skip the allocation when there is nothing to hide.
        !self.keys.is_empty() && self.keys.contains(&Key::Chunk(key.clone()))
    }

    #[must_use]
    pub fn contains_file(&self, path: &str) -> bool {
        !self.keys.is_empty() && self.keys.contains(&Key::File(path.to_owned()))
    }

    /// Record a tombstone. Returns `false` if it was already present.
    pub fn add(&mut self, key: Key) -> StorageResult<bool> {
        if self.keys.contains(&key) {
            return Ok(false);
        }
        let record = Record::Add(key);
        self.append(&record)?;
        if let Record::Add(key) = record {
            trace!(%key, "tombstoned");
            self.keys.insert(key);
        }
        Ok(true)
    }

    /// Drop a tombstone. Returns `false` if there was none.
    pub fn remove(&mut self, key: &Key) -> StorageResult<bool> {
        if !self.keys.contains(key) {
            return Ok(false);
        }
        self.append(&Record::Remove(key.clone()))?;
        self.keys.remove(key);
        Ok(true)
    }

    /// Tombstoned chunks, sorted.
    pub fn chunks(&self) -> Vec<&ChunkKey> {
        let mut chunks: Vec<&ChunkKey> = self
            .keys
            .iter()
            .filter_map(|key| match key {
                Key::Chunk(chunk) => Some(chunk),
                Key::File(_) => None,
            })
            .collect();
        chunks.sort_unstable();
        chunks
    }

    /// Tombstoned files, sorted.
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self
            .keys
            .iter()
            .filter_map(|key| match key {
                Key::File(path) => Some(path.as_str()),
                Key::Chunk(_) => None,
            })
            .collect();
        files.sort_unstable();
        files
    }

    fn append(&self, record: &Record) -> StorageResult<()> {
        let body = bincode::serialize(record)?;
        let mut buf = Vec::with_capacity(4 + body.len());
        buf.write_u32::<BigEndian>(body.len() as u32)?;
        buf.extend_from_slice(&body);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buf)?;
        file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(cx: i32, cz: i32) -> Key {
        Key::from(ChunkKey::new(cx, cz, ""))
    }

    #[test]
    fn test_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tombstones.log");
        {
            let mut log = TombstoneLog::open(&path).unwrap();
            assert!(!path.exists());
            assert!(log.add(chunk(1, 1)).unwrap());
            assert!(!log.add(chunk(1, 1)).unwrap());
            assert!(log.add(Key::File("level.dat".into())).unwrap());
            assert!(log.add(chunk(2, 2)).unwrap());
            assert!(log.remove(&chunk(2, 2)).unwrap());
            assert!(!log.remove(&chunk(9, 9)).unwrap());
        }

        let log = TombstoneLog::open(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.contains_chunk(&ChunkKey::new(1, 1, "")));
        assert!(!log.contains_chunk(&ChunkKey::new(2, 2, "")));
        assert!(log.contains_file("level.dat"));
        assert_eq!(log.files(), vec!["level.dat"]);
        assert_eq!(log.chunks(), vec![&ChunkKey::new(1, 1, "")]);
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tombstones.log");
        {
            let mut log = TombstoneLog::open(&path).unwrap();
            log.add(chunk(3, 4)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0, 0, 0, 40, 1, 2]).unwrap();
        drop(file);

        let log = TombstoneLog::open(&path).unwrap();
        assert_eq!(log.len(), 1);
        assert!(log.contains(&chunk(3, 4)));
    }
}
