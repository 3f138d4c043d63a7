//! Keys addressed by revision nodes.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Key::Chunk(ChunkKey)                                      │
//! │    cx, cz: i32   chunk coordinates                          │
//! │    dim: String   dimension, "" for the overworld            │
//! ├────────────────────────────────────────────────────────────┤
//! │  Key::File(String)                                         │
//! │    `/`-separated path relative to the world root            │
//! └────────────────────────────────────────────────────────────┘
//! ```

use core::fmt;

use mc_region::ChunkPos;
use serde::{Deserialize, Serialize};

/// A chunk in a specific dimension.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub cx: i32,
    pub cz: i32,
    pub dim: String,
}

impl ChunkKey {
    #[inline]
    #[must_use]
    pub fn new(cx: i32, cz: i32, dim: impl Into<String>) -> Self {
        Self {
            cx,
            cz,
            dim: dim.into(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn pos(&self) -> ChunkPos {
        ChunkPos::new(self.cx, self.cz)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk ({}, {}) in {:?}", self.cx, self.cz, self.dim)
    }
}

/// Anything a node can store or tombstone.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    Chunk(ChunkKey),
    File(String),
}

impl From<ChunkKey> for Key {
    fn from(key: ChunkKey) -> Self {
        Self::Chunk(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunk(key) => key.fmt(f),
            Self::File(path) => write!(f, "file {path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering() {
        // Chunks sort before files, then by coordinates.
        let a = Key::from(ChunkKey::new(0, 5, ""));
        let b = Key::from(ChunkKey::new(1, 0, ""));
        let c = Key::File("level.dat".into());
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_bincode_roundtrip() {
        let key = Key::from(ChunkKey::new(-3, 9, "DIM-1"));
        let bytes = bincode::serialize(&key).unwrap();
        let back: Key = bincode::deserialize(&bytes).unwrap();
        assert_eq!(key, back);
        assert_eq!(back.to_string(), "chunk (-3, 9) in \"DIM-1\"");
    }
}
