//! Borrowed views of a single revision.

use std::path::PathBuf;

use mc_region::ChunkPos;
use serde_json::Value;
use tracing::trace;

use crate::changes::ChangeSet;
use crate::error::{StorageError, StorageResult};
use crate::history::RevisionHistory;
use crate::keys::ChunkKey;
use crate::node::{NodeArena, NodeId};

/// Read access to one revision.
#[derive(Clone, Copy)]
pub struct Revision<'h> {
    history: &'h RevisionHistory,
    index: usize,
    id: NodeId,
}

impl<'h> Revision<'h> {
    pub(crate) const fn new(history: &'h RevisionHistory, index: usize, id: NodeId) -> Self {
        Self { history, index, id }
    }

    fn arena(&self) -> &'h NodeArena {
        &self.history.arena
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Whether this revision is the canonical root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == self.history.root
    }

    /// Destroyed nodes count as read-only.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.arena().get(self.id).ok().is_none_or(|node| node.readonly)
    }

    pub fn read_chunk_bytes(&self, cx: i32, cz: i32, dim: &str) -> StorageResult<Vec<u8>> {
        self.arena().read_chunk(self.id, &ChunkKey::new(cx, cz, dim))
    }

    pub fn contains_chunk(&self, cx: i32, cz: i32, dim: &str) -> StorageResult<bool> {
        self.arena().contains_chunk(self.id, &ChunkKey::new(cx, cz, dim))
    }

    pub fn chunk_positions(&self, dim: &str) -> StorageResult<Vec<ChunkPos>> {
        self.arena().chunk_positions(self.id, dim)
    }

    pub fn chunk_count(&self, dim: &str) -> StorageResult<usize> {
        Ok(self.chunk_positions(dim)?.len())
    }

    pub fn list_dimensions(&self) -> StorageResult<Vec<String>> {
        self.arena().list_dimensions(self.id)
    }

    pub fn read_file(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.arena().read_file(self.id, path)
    }

    pub fn contains_file(&self, path: &str) -> StorageResult<bool> {
        self.arena().contains_file(self.id, path)
    }

    pub fn list_folder(&self, path: &str) -> StorageResult<Vec<String>> {
        self.arena().list_folder(self.id, path)
    }

    pub fn list_all_files(&self) -> StorageResult<Vec<String>> {
        self.arena().list_all_files(self.id)
    }

    /// On-disk location of the copy of `path` this revision shows.
    pub fn file_path(&self, path: &str) -> StorageResult<Option<PathBuf>> {
        self.arena().file_path(self.id, path)
    }

    /// Keys that differ from the previous revision.
    pub fn changes(&self) -> StorageResult<ChangeSet> {
        self.arena().get(self.id)?.changes()
    }

    pub fn info(&self) -> StorageResult<Option<Value>> {
        self.arena().get(self.id)?.info()
    }
}

/// Write access to one revision. Writes fail on read-only revisions.
pub struct RevisionMut<'h> {
    history: &'h mut RevisionHistory,
    index: usize,
    id: NodeId,
}

impl<'h> RevisionMut<'h> {
    pub(crate) fn new(history: &'h mut RevisionHistory, index: usize, id: NodeId) -> Self {
        Self { history, index, id }
    }

    /// Reborrow as a read view.
    #[must_use]
    pub fn view(&self) -> Revision<'_> {
        Revision::new(self.history, self.index, self.id)
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    fn writable(&mut self) -> StorageResult<&mut NodeArena> {
        if self.history.arena.get(self.id)?.readonly {
            return Err(StorageError::ReadOnly { index: self.index });
        }
        Ok(&mut self.history.arena)
    }

    pub fn read_chunk_bytes(&self, cx: i32, cz: i32, dim: &str) -> StorageResult<Vec<u8>> {
        self.view().read_chunk_bytes(cx, cz, dim)
    }

    pub fn read_file(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.view().read_file(path)
    }

    pub fn write_chunk_bytes(&mut self, cx: i32, cz: i32, dim: &str, data: &[u8]) -> StorageResult<()> {
        let id = self.id;
        trace!(revision = self.index, cx, cz, dim, len = data.len(), "write chunk");
        self.writable()?.write_chunk(id, &ChunkKey::new(cx, cz, dim), data)
    }

    pub fn delete_chunk(&mut self, cx: i32, cz: i32, dim: &str) -> StorageResult<()> {
        let id = self.id;
        trace!(revision = self.index, cx, cz, dim, "delete chunk");
        self.writable()?.delete_chunk(id, &ChunkKey::new(cx, cz, dim))
    }

    pub fn write_file(&mut self, path: &str, data: &[u8]) -> StorageResult<()> {
        let id = self.id;
        trace!(revision = self.index, path, len = data.len(), "write file");
        self.writable()?.write_file(id, path, data)
    }

    pub fn delete_file(&mut self, path: &str) -> StorageResult<()> {
        let id = self.id;
        trace!(revision = self.index, path, "delete file");
        self.writable()?.delete_file(id, path)
    }

    /// Info is metadata and may be set on read-only revisions too.
    pub fn set_info(&mut self, info: &Value) -> StorageResult<()> {
        self.history.arena.get(self.id)?.set_info(Some(info))
    }
}
