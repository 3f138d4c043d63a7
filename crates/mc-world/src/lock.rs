//! `session.lock` handling.
//!
//! The newest opener of a world writes the current time in milliseconds
//! (big-endian `i64`) to `session.lock`. An older session can notice it has
//! been superseded by comparing the file against the stamp it wrote.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, warn};

use crate::error::WorldResult;

/// File name of the lock, relative to the world root.
pub const SESSION_LOCK: &str = "session.lock";

/// Ownership marker for a world folder.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
    stamp: i64,
    released: bool,
}

impl SessionLock {
    /// Claim the world at `root`, superseding any previous session.
    pub fn acquire(root: impl AsRef<Path>) -> WorldResult<Self> {
        let path = root.as_ref().join(SESSION_LOCK);
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let mut bytes = [0u8; 8];
        BigEndian::write_i64(&mut bytes, stamp);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), stamp, "acquired session lock");

        Ok(Self {
            path,
            stamp,
            released: false,
        })
    }

    #[must_use]
    pub const fn stamp(&self) -> i64 {
        self.stamp
    }

    /// Whether the lock file still carries our stamp.
    #[must_use]
    pub fn is_held(&self) -> bool {
        !self.released && self.is_held_on_disk()
    }

    /// Remove the lock file if it is still ours.
    pub fn release(mut self) -> WorldResult<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> WorldResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if !self.is_held_on_disk() {
            warn!(path = %self.path.display(), "session lock was taken over, leaving it in place");
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_held_on_disk(&self) -> bool {
        fs::read(&self.path)
            .ok()
            .filter(|bytes| bytes.len() == 8)
            .is_some_and(|bytes| BigEndian::read_i64(&bytes) == self.stamp)
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(path = %self.path.display(), "failed to release session lock: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = SessionLock::acquire(dir.path()).unwrap();
        assert!(lock.is_held());
        assert!(dir.path().join(SESSION_LOCK).exists());
        lock.release().unwrap();
        assert!(!dir.path().join(SESSION_LOCK).exists());
    }

    #[test]
    fn test_superseded_lock_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let first = SessionLock::acquire(dir.path()).unwrap();

        let mut other = [0u8; 8];
        BigEndian::write_i64(&mut other, first.stamp() + 1);
        fs::write(dir.path().join(SESSION_LOCK), other).unwrap();

        assert!(!first.is_held());
        drop(first);
        assert_eq!(fs::read(dir.path().join(SESSION_LOCK)).unwrap(), other);
    }
}
