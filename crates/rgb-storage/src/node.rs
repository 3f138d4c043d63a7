//! Revision nodes and the arena that links them.
//!
//! A node is an overlay: its own backend holds the chunks and files written
//! at that node, its tombstone log holds the keys it deleted, and `parent`
//! names the node consulted for everything else. `parent` is structural, not
//! chronological: after a collapse, reversion nodes point at later states.
//!
//! Reads walk `node -> parent -> ...`. At each node a physical hit wins,
//! then a tombstone ends the walk as not present.

use core::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mc_region::ChunkPos;
use mc_world::{StorageBackend, WorldError};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::{debug, warn};

use crate::changes::ChangeSet;
use crate::error::{StorageError, StorageResult};
use crate::keys::{ChunkKey, Key};
use crate::tombstones::TombstoneLog;

/// File holding a node's tombstones, inside its metadata directory.
pub const TOMBSTONE_LOG: &str = "tombstones.log";

/// File holding a node's revision info, inside its metadata directory.
pub const REVISION_INFO: &str = "revision-info.json";

/// Monotonic node sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a node reports from `changes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Differences {
    /// Derived on demand from the node's own keys and tombstones.
    Lazy,
    /// Fixed snapshot, set when a node takes over a position during collapse.
    Precomputed(ChangeSet),
}

/// One operation of the copy routine, read from a source node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CopyOp {
    DeleteChunk(ChunkKey),
    WriteChunk(ChunkKey),
    DeleteFile(String),
    WriteFile(String),
}

impl fmt::Display for CopyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteChunk(key) => write!(f, "deleting {key}"),
            Self::WriteChunk(key) => write!(f, "writing {key}"),
            Self::DeleteFile(path) => write!(f, "deleting file {path}"),
            Self::WriteFile(path) => write!(f, "writing file {path}"),
        }
    }
}

pub(crate) struct RevisionNode {
    pub(crate) id: NodeId,
    pub(crate) backend: Box<dyn StorageBackend>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) tombstones: TombstoneLog,
    pub(crate) readonly: bool,
    pub(crate) differences: Differences,
    /// Holds the tombstone log and revision info, and for overlays the backend.
    meta_dir: PathBuf,
    /// Overlays are deleted from disk when destroyed; the canonical root never is.
    ephemeral: bool,
}

impl RevisionNode {
    pub(crate) fn new(
        id: NodeId,
        backend: Box<dyn StorageBackend>,
        parent: Option<NodeId>,
        meta_dir: PathBuf,
        ephemeral: bool,
    ) -> StorageResult<Self> {
        fs::create_dir_all(&meta_dir)?;
        let tombstones = TombstoneLog::open(meta_dir.join(TOMBSTONE_LOG))?;
        Ok(Self {
            id,
            backend,
            parent,
            tombstones,
            readonly: false,
            differences: Differences::Lazy,
            meta_dir,
            ephemeral,
        })
    }

    pub(crate) fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub(crate) fn info(&self) -> StorageResult<Option<Value>> {
        match fs::read(self.meta_dir.join(REVISION_INFO)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn set_info(&self, info: Option<&Value>) -> StorageResult<()> {
        let path = self.meta_dir.join(REVISION_INFO);
        match info {
            Some(value) => fs::write(path, serde_json::to_vec_pretty(value)?)?,
            None => match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    /// Keys stored or tombstoned at this node alone.
    pub(crate) fn own_changes(&self) -> StorageResult<ChangeSet> {
        let mut changes = ChangeSet::new();
        for op in self.copy_ops()? {
            match op {
                CopyOp::DeleteChunk(key) | CopyOp::WriteChunk(key) => changes.insert_chunk(&key),
                CopyOp::DeleteFile(path) | CopyOp::WriteFile(path) => changes.insert_file(path),
            }
        }
        Ok(changes)
    }

    pub(crate) fn changes(&self) -> StorageResult<ChangeSet> {
        match &self.differences {
            Differences::Precomputed(changes) => Ok(changes.clone()),
            Differences::Lazy => self.own_changes(),
        }
    }

    /// This node's own contents as copy operations: dead chunks, live chunks
    /// per dimension, dead files, live files.
    pub(crate) fn copy_ops(&self) -> StorageResult<Vec<CopyOp>> {
        let mut ops: Vec<CopyOp> = self
            .tombstones
            .chunks()
            .into_iter()
            .map(|key| CopyOp::DeleteChunk(key.clone()))
            .collect();
        for dim in self.backend.list_dimensions()? {
            for pos in self.backend.chunk_positions(&dim)? {
                ops.push(CopyOp::WriteChunk(ChunkKey::new(pos.x, pos.z, dim.as_str())));
            }
        }
        ops.extend(
            self.tombstones
                .files()
                .into_iter()
                .map(|path| CopyOp::DeleteFile(path.to_owned())),
        );
        ops.extend(self.backend.list_all_files()?.into_iter().map(CopyOp::WriteFile));
        Ok(ops)
    }

    fn own_chunk(&self, key: &ChunkKey) -> StorageResult<Option<Vec<u8>>> {
        match self.backend.read_chunk_bytes(key.cx, key.cz, &key.dim) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_present() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn own_file(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        match self.backend.read_file(path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_present() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for RevisionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevisionNode")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("readonly", &self.readonly)
            .field("tombstones", &self.tombstones.len())
            .field("meta_dir", &self.meta_dir)
            .finish_non_exhaustive()
    }
}

/// Owner of every live node.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    nodes: FxHashMap<NodeId, RevisionNode>,
}

impl NodeArena {
    pub(crate) fn insert(&mut self, node: RevisionNode) {
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn get(&self, id: NodeId) -> StorageResult<&RevisionNode> {
        self.nodes.get(&id).ok_or(StorageError::InvalidNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> StorageResult<&mut RevisionNode> {
        self.nodes.get_mut(&id).ok_or(StorageError::InvalidNode(id))
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// `id` followed by its ancestors, nearest first.
    pub(crate) fn lineage(&self, id: NodeId) -> StorageResult<Vec<&RevisionNode>> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(next) = cursor {
            let node = self.get(next)?;
            chain.push(node);
            cursor = node.parent;
        }
        Ok(chain)
    }

    /// Remove a node and, for overlays, its directory.
    pub(crate) fn destroy(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        let RevisionNode {
            backend,
            meta_dir,
            ephemeral,
            ..
        } = node;
        // Release open region files before removing the directory.
        drop(backend);
        if ephemeral {
            if let Err(e) = fs::remove_dir_all(&meta_dir) {
                warn!(node = %id, path = %meta_dir.display(), "failed to remove node directory: {e}");
            }
        }
        debug!(node = %id, "destroyed revision node");
    }

    /// Point every node whose parent is a key of `links` at the mapped node.
    pub(crate) fn relink(&mut self, links: &FxHashMap<NodeId, NodeId>, skip: &[NodeId]) {
        for node in self.nodes.values_mut() {
            if skip.contains(&node.id) {
                continue;
            }
            if let Some(to) = node.parent.and_then(|parent| links.get(&parent)) {
                node.parent = Some(*to);
            }
        }
    }

    // ==================== Reads ====================

    pub(crate) fn read_chunk(&self, id: NodeId, key: &ChunkKey) -> StorageResult<Vec<u8>> {
        for node in self.lineage(id)? {
            if let Some(data) = node.own_chunk(key)? {
                return Ok(data);
            }
            if node.tombstones.contains_chunk(key) {
                break;
            }
        }
        Err(StorageError::ChunkNotPresent {
            cx: key.cx,
            cz: key.cz,
            dim: key.dim.clone(),
        })
    }

    pub(crate) fn contains_chunk(&self, id: NodeId, key: &ChunkKey) -> StorageResult<bool> {
        for node in self.lineage(id)? {
            if node.backend.contains_chunk(key.cx, key.cz, &key.dim)? {
                return Ok(true);
            }
            if node.tombstones.contains_chunk(key) {
                return Ok(false);
            }
        }
        Ok(false)
    }

    pub(crate) fn read_file(&self, id: NodeId, path: &str) -> StorageResult<Vec<u8>> {
        for node in self.lineage(id)? {
            if let Some(data) = node.own_file(path)? {
                return Ok(data);
            }
            if node.tombstones.contains_file(path) {
                break;
            }
        }
        Err(StorageError::FileNotPresent(path.to_owned()))
    }

    pub(crate) fn contains_file(&self, id: NodeId, path: &str) -> StorageResult<bool> {
        Ok(self.file_path(id, path)?.is_some())
    }

    /// On-disk location of the nearest visible copy of `path`.
    pub(crate) fn file_path(&self, id: NodeId, path: &str) -> StorageResult<Option<PathBuf>> {
        for node in self.lineage(id)? {
            if node.backend.contains_file(path) {
                return Ok(Some(node.backend.file_path(path)));
            }
            if node.tombstones.contains_file(path) {
                break;
            }
        }
        Ok(None)
    }

    pub(crate) fn list_dimensions(&self, id: NodeId) -> StorageResult<Vec<String>> {
        let mut dims = Vec::new();
        for node in self.lineage(id)? {
            for dim in node.backend.list_dimensions()? {
                if !dims.contains(&dim) {
                    dims.push(dim);
                }
            }
        }
        dims.sort();
        Ok(dims)
    }

    /// Visible chunks: a nearer tombstone hides farther copies, a nearer
    /// copy wins over a farther tombstone.
    pub(crate) fn chunk_positions(&self, id: NodeId, dim: &str) -> StorageResult<Vec<ChunkPos>> {
        let mut hidden = FxHashSet::default();
        let mut visible = FxHashSet::default();
        for node in self.lineage(id)? {
            for pos in node.backend.chunk_positions(dim)? {
                if !hidden.contains(&pos) {
                    visible.insert(pos);
                }
            }
            hidden.extend(
                node.tombstones
                    .chunks()
                    .into_iter()
                    .filter(|key| key.dim == dim)
                    .map(ChunkKey::pos),
            );
        }
        let mut positions: Vec<ChunkPos> = visible.into_iter().collect();
        positions.sort_unstable();
        Ok(positions)
    }

    pub(crate) fn list_all_files(&self, id: NodeId) -> StorageResult<Vec<String>> {
        let mut hidden: FxHashSet<String> = FxHashSet::default();
        let mut visible = FxHashSet::default();
        for node in self.lineage(id)? {
            for path in node.backend.list_all_files()? {
                if !hidden.contains(&path) {
                    visible.insert(path);
                }
            }
            hidden.extend(node.tombstones.files().into_iter().map(str::to_owned));
        }
        let mut files: Vec<String> = visible.into_iter().collect();
        files.sort();
        Ok(files)
    }

    /// Entries directly inside `folder`, derived from the visible files.
    pub(crate) fn list_folder(&self, id: NodeId, folder: &str) -> StorageResult<Vec<String>> {
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{}/", folder.trim_end_matches('/'))
        };
        let mut entries: Vec<String> = self
            .list_all_files(id)?
            .into_iter()
            .filter_map(|path| {
                let rest = path.strip_prefix(&prefix)?;
                let child = rest.split('/').next()?;
                Some(format!("{prefix}{child}"))
            })
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    // ==================== Writes ====================

    /// Write into the node's own backend, clearing its own tombstone.
    pub(crate) fn write_chunk(&mut self, id: NodeId, key: &ChunkKey, data: &[u8]) -> StorageResult<()> {
        let node = self.get_mut(id)?;
        node.backend.write_chunk_bytes(key.cx, key.cz, &key.dim, data)?;
        node.tombstones.remove(&Key::Chunk(key.clone()))?;
        Ok(())
    }

    /// Remove the node's own copy, and tombstone the key if an ancestor
    /// would still show it.
    pub(crate) fn delete_chunk(&mut self, id: NodeId, key: &ChunkKey) -> StorageResult<()> {
        if !self.contains_chunk(id, key)? {
            return Err(StorageError::ChunkNotPresent {
                cx: key.cx,
                cz: key.cz,
                dim: key.dim.clone(),
            });
        }
        let parent = self.get(id)?.parent;
        let shadowed = match parent {
            Some(parent) => self.contains_chunk(parent, key)?,
            None => false,
        };

        let node = self.get_mut(id)?;
        match node.backend.delete_chunk(key.cx, key.cz, &key.dim) {
            Ok(()) => {}
            Err(e) if e.is_not_present() => {}
            Err(e) => return Err(e.into()),
        }
        if shadowed {
            node.tombstones.add(Key::Chunk(key.clone()))?;
        }
        Ok(())
    }

    pub(crate) fn write_file(&mut self, id: NodeId, path: &str, data: &[u8]) -> StorageResult<()> {
        let node = self.get_mut(id)?;
        node.backend.write_file(path, data)?;
        node.tombstones.remove(&Key::File(path.to_owned()))?;
        Ok(())
    }

    pub(crate) fn delete_file(&mut self, id: NodeId, path: &str) -> StorageResult<()> {
        if !self.contains_file(id, path)? {
            return Err(StorageError::FileNotPresent(path.to_owned()));
        }
        let parent = self.get(id)?.parent;
        let shadowed = match parent {
            Some(parent) => self.contains_file(parent, path)?,
            None => false,
        };

        let node = self.get_mut(id)?;
        match node.backend.delete_file(path) {
            Ok(()) => {}
            Err(e) if e.is_not_present() => {}
            Err(e) => return Err(e.into()),
        }
        if shadowed {
            node.tombstones.add(Key::File(path.to_owned()))?;
        }
        Ok(())
    }

    // ==================== Collapse ====================

    /// Apply one operation read from `source` to the physical backend of
    /// `root`. With a `reversion` node, the canonical pre-image is saved
    /// there first, or a tombstone if the canonical backend lacked the key.
    pub(crate) fn apply_copy(
        &mut self,
        source: NodeId,
        root: NodeId,
        reversion: Option<NodeId>,
        op: &CopyOp,
    ) -> StorageResult<()> {
        match op {
            CopyOp::DeleteChunk(key) | CopyOp::WriteChunk(key) => {
                let data = match op {
                    CopyOp::WriteChunk(_) => Some(read_own(self.get(source)?.own_chunk(key)?, op)?),
                    _ => None,
                };
                let before = self.get(root)?.own_chunk(key)?;
                if data.is_none() && before.is_none() {
                    return Ok(());
                }
                if let Some(reversion) = reversion {
                    self.save_chunk_preimage(reversion, key, before.as_deref())?;
                }
                let canonical = &mut self.get_mut(root)?.backend;
                match data {
                    Some(data) => canonical.write_chunk_bytes(key.cx, key.cz, &key.dim, &data)?,
                    None => canonical.delete_chunk(key.cx, key.cz, &key.dim)?,
                }
            }
            CopyOp::DeleteFile(path) | CopyOp::WriteFile(path) => {
                let data = match op {
                    CopyOp::WriteFile(_) => Some(read_own(self.get(source)?.own_file(path)?, op)?),
                    _ => None,
                };
                let before = self.get(root)?.own_file(path)?;
                if data.is_none() && before.is_none() {
                    return Ok(());
                }
                if let Some(reversion) = reversion {
                    self.save_file_preimage(reversion, path, before.as_deref())?;
                }
                let canonical = &mut self.get_mut(root)?.backend;
                match data {
                    Some(data) => canonical.write_file(path, &data)?,
                    None => canonical.delete_file(path)?,
                }
            }
        }
        Ok(())
    }

    fn save_chunk_preimage(&mut self, id: NodeId, key: &ChunkKey, before: Option<&[u8]>) -> StorageResult<()> {
        let node = self.get_mut(id)?;
        if node.backend.contains_chunk(key.cx, key.cz, &key.dim)? || node.tombstones.contains_chunk(key) {
            return Ok(());
        }
        match before {
            Some(bytes) => node.backend.write_chunk_bytes(key.cx, key.cz, &key.dim, bytes)?,
            None => {
                node.tombstones.add(Key::Chunk(key.clone()))?;
            }
        }
        Ok(())
    }

    fn save_file_preimage(&mut self, id: NodeId, path: &str, before: Option<&[u8]>) -> StorageResult<()> {
        let node = self.get_mut(id)?;
        if node.backend.contains_file(path) || node.tombstones.contains_file(path) {
            return Ok(());
        }
        match before {
            Some(bytes) => node.backend.write_file(path, bytes)?,
            None => {
                node.tombstones.add(Key::File(path.to_owned()))?;
            }
        }
        Ok(())
    }
}

/// A listed key that cannot be read back means the overlay changed under us.
fn read_own(data: Option<Vec<u8>>, op: &CopyOp) -> StorageResult<Vec<u8>> {
    data.ok_or_else(|| {
        StorageError::World(WorldError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            format!("source vanished while {op}"),
        )))
    })
}

#[cfg(test)]
mod tests {
    use mc_world::{WorldFolder, WorldOptions};

    use super::*;

    fn overlay(dir: &Path, id: u64, parent: Option<u64>) -> RevisionNode {
        let meta = dir.join(format!("node-{id}"));
        let backend = WorldFolder::open(meta.join("world"), WorldOptions::default()).unwrap();
        RevisionNode::new(NodeId(id), Box::new(backend), parent.map(NodeId), meta, true).unwrap()
    }

    fn chain(dir: &Path, len: u64) -> NodeArena {
        let mut arena = NodeArena::default();
        for id in 0..len {
            arena.insert(overlay(dir, id, id.checked_sub(1)));
        }
        arena
    }

    #[test]
    fn test_nearest_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut arena = chain(dir.path(), 3);
        let key = ChunkKey::new(4, 4, "");

        arena.write_chunk(NodeId(0), &key, b"old").unwrap();
        arena.write_chunk(NodeId(1), &key, b"new").unwrap();
        assert_eq!(arena.read_chunk(NodeId(2), &key).unwrap(), b"new");
        assert_eq!(arena.read_chunk(NodeId(0), &key).unwrap(), b"old");
    }

    #[test]
    fn test_delete_tombstones_only_when_shadowing() {
        let dir = tempfile::tempdir().unwrap();
        let mut arena = chain(dir.path(), 3);
        let inherited = ChunkKey::new(1, 1, "");
        let local = ChunkKey::new(2, 2, "");

        arena.write_chunk(NodeId(0), &inherited, b"x").unwrap();
        arena.write_chunk(NodeId(2), &local, b"y").unwrap();

        arena.delete_chunk(NodeId(2), &inherited).unwrap();
        arena.delete_chunk(NodeId(2), &local).unwrap();
        let node = arena.get(NodeId(2)).unwrap();
        assert!(node.tombstones.contains_chunk(&inherited));
        assert!(!node.tombstones.contains_chunk(&local));

        assert!(arena.read_chunk(NodeId(2), &inherited).unwrap_err().is_not_present());
        assert!(arena.delete_chunk(NodeId(2), &inherited).unwrap_err().is_not_present());
        assert_eq!(arena.read_chunk(NodeId(1), &inherited).unwrap(), b"x");
    }

    #[test]
    fn test_tombstones_are_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let mut arena = chain(dir.path(), 3);
        let key = ChunkKey::new(0, 0, "DIM1");

        arena.write_chunk(NodeId(0), &key, b"ancient").unwrap();
        arena.delete_chunk(NodeId(1), &key).unwrap();
        arena.write_chunk(NodeId(2), &key, b"fresh").unwrap();

        assert_eq!(arena.read_chunk(NodeId(2), &key).unwrap(), b"fresh");
        // Removing the nearer copy exposes the tombstone, not the ancient copy.
        let node = arena.get_mut(NodeId(2)).unwrap();
        node.backend.delete_chunk(0, 0, "DIM1").unwrap();
        assert!(!arena.contains_chunk(NodeId(2), &key).unwrap());
    }

    #[test]
    fn test_enumeration_respects_tombstones() {
        let dir = tempfile::tempdir().unwrap();
        let mut arena = chain(dir.path(), 3);
        for x in 0..4 {
            arena.write_chunk(NodeId(0), &ChunkKey::new(x, 0, ""), b"base").unwrap();
        }
        arena.write_file(NodeId(0), "level.dat", b"l").unwrap();
        arena.write_file(NodeId(0), "data/a.dat", b"a").unwrap();

        arena.delete_chunk(NodeId(1), &ChunkKey::new(1, 0, "")).unwrap();
        arena.delete_chunk(NodeId(1), &ChunkKey::new(2, 0, "")).unwrap();
        arena.write_chunk(NodeId(2), &ChunkKey::new(2, 0, ""), b"back").unwrap();
        arena.delete_file(NodeId(2), "data/a.dat").unwrap();
        arena.write_file(NodeId(2), "data/b.dat", b"b").unwrap();

        let positions: Vec<(i32, i32)> = arena
            .chunk_positions(NodeId(2), "")
            .unwrap()
            .into_iter()
            .map(|p| (p.x, p.z))
            .collect();
        assert_eq!(positions, vec![(0, 0), (2, 0), (3, 0)]);
        assert_eq!(
            arena.list_all_files(NodeId(2)).unwrap(),
            vec!["data/b.dat", "level.dat"]
        );
        assert_eq!(arena.list_folder(NodeId(2), "").unwrap(), vec!["data", "level.dat"]);
        assert_eq!(arena.list_folder(NodeId(2), "data").unwrap(), vec!["data/b.dat"]);
    }

    #[test]
    fn test_changes_and_info() {
        let dir = tempfile::tempdir().unwrap();
        let mut arena = chain(dir.path(), 2);
        arena.write_chunk(NodeId(0), &ChunkKey::new(9, 9, ""), b"x").unwrap();
        arena.delete_chunk(NodeId(1), &ChunkKey::new(9, 9, "")).unwrap();
        arena.write_file(NodeId(1), "level.dat", b"l").unwrap();

        let node = arena.get(NodeId(1)).unwrap();
        let changes = node.changes().unwrap();
        assert!(changes.contains_chunk(9, 9, ""));
        assert!(changes.contains_file("level.dat"));

        assert_eq!(node.info().unwrap(), None);
        let info = serde_json::json!({ "label": "dig" });
        node.set_info(Some(&info)).unwrap();
        assert_eq!(node.info().unwrap(), Some(info));
        node.set_info(None).unwrap();
        assert_eq!(node.info().unwrap(), None);
    }

    #[test]
    fn test_destroy_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut arena = chain(dir.path(), 2);
        arena.write_chunk(NodeId(1), &ChunkKey::new(0, 0, ""), b"x").unwrap();
        let meta = arena.get(NodeId(1)).unwrap().meta_dir().to_path_buf();
        assert!(meta.is_dir());

        arena.destroy(NodeId(1));
        assert!(!meta.exists());
        assert!(!arena.contains(NodeId(1)));
        assert!(matches!(
            arena.read_chunk(NodeId(1), &ChunkKey::new(0, 0, "")),
            Err(StorageError::InvalidNode(NodeId(1)))
        ));
    }
}
