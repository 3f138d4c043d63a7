//! Sets of keys touched between two revisions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::keys::{ChunkKey, Key};

/// Chunks (per dimension) and files that differ between two revisions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub chunks: BTreeMap<String, BTreeSet<(i32, i32)>>,
    pub files: BTreeSet<String>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_chunk(&mut self, key: &ChunkKey) {
        self.chunks
            .entry(key.dim.clone())
            .or_default()
            .insert((key.cx, key.cz));
    }

    pub fn insert_file(&mut self, path: impl Into<String>) {
        self.files.insert(path.into());
    }

    pub fn insert(&mut self, key: &Key) {
        match key {
            Key::Chunk(chunk) => self.insert_chunk(chunk),
            Key::File(path) => self.insert_file(path.as_str()),
        }
    }

    /// Merge `other` into `self`.
    pub fn union(&mut self, other: &Self) {
        for (dim, positions) in &other.chunks {
            self.chunks
                .entry(dim.clone())
                .or_default()
                .extend(positions.iter().copied());
        }
        self.files.extend(other.files.iter().cloned());
    }

    #[must_use]
    pub fn contains_chunk(&self, cx: i32, cz: i32, dim: &str) -> bool {
        self.chunks
            .get(dim)
            .is_some_and(|positions| positions.contains(&(cx, cz)))
    }

    #[must_use]
    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunk_count() == 0 && self.files.is_empty()
    }

    /// Every changed chunk as a key, ordered by dimension then position.
    pub fn chunk_keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.chunks.iter().flat_map(|(dim, positions)| {
            positions
                .iter()
                .map(move |&(cx, cz)| ChunkKey::new(cx, cz, dim.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union() {
        let mut a = ChangeSet::new();
        a.insert_chunk(&ChunkKey::new(1, 1, ""));
        a.insert_file("level.dat");

        let mut b = ChangeSet::new();
        b.insert_chunk(&ChunkKey::new(1, 1, ""));
        b.insert(&Key::from(ChunkKey::new(0, 0, "DIM1")));
        b.insert(&Key::File("data/raids.dat".into()));

        a.union(&b);
        assert_eq!(a.chunk_count(), 2);
        assert_eq!(a.file_count(), 2);
        assert!(a.contains_chunk(0, 0, "DIM1"));
        assert!(!a.contains_chunk(0, 0, ""));
        assert!(a.contains_file("data/raids.dat"));
        assert_eq!(
            a.chunk_keys().collect::<Vec<_>>(),
            vec![ChunkKey::new(1, 1, ""), ChunkKey::new(0, 0, "DIM1")]
        );
    }

    #[test]
    fn test_empty() {
        let mut set = ChangeSet::new();
        assert!(set.is_empty());
        set.chunks.entry("DIM-1".into()).or_default();
        assert!(set.is_empty());
        set.insert_file("x");
        assert!(!set.is_empty());
    }
}
