//! The storage backend interface consumed by revision nodes.

use std::path::PathBuf;

use mc_region::ChunkPos;

use crate::error::WorldResult;

/// Chunk and file CRUD over one storage location.
///
/// Chunks are addressed by `(cx, cz, dim)`, where `dim` names a dimension
/// (`""` for the overworld). Files are addressed by `/`-separated paths
/// relative to the backend root and never include chunk storage itself.
///
/// Reads take `&self`; anything that changes stored data takes `&mut self`.
pub trait StorageBackend {
    /// Dimensions that have chunk storage.
    fn list_dimensions(&self) -> WorldResult<Vec<String>>;

    /// Positions of every chunk stored in `dim`.
    fn chunk_positions(&self, dim: &str) -> WorldResult<Vec<ChunkPos>>;

    /// Number of chunks stored in `dim`.
    fn chunk_count(&self, dim: &str) -> WorldResult<usize> {
        Ok(self.chunk_positions(dim)?.len())
    }

    fn contains_chunk(&self, cx: i32, cz: i32, dim: &str) -> WorldResult<bool>;

    /// Fails with a not-present error when no chunk is stored.
    fn read_chunk_bytes(&self, cx: i32, cz: i32, dim: &str) -> WorldResult<Vec<u8>>;

    fn write_chunk_bytes(&mut self, cx: i32, cz: i32, dim: &str, data: &[u8]) -> WorldResult<()>;

    /// Fails with a not-present error when no chunk is stored.
    fn delete_chunk(&mut self, cx: i32, cz: i32, dim: &str) -> WorldResult<()>;

    fn contains_file(&self, path: &str) -> bool;

    /// Entries directly inside `path` (files and folders), as relative paths.
    fn list_folder(&self, path: &str) -> WorldResult<Vec<String>>;

    /// Every plain file below the root, as relative paths.
    fn list_all_files(&self) -> WorldResult<Vec<String>>;

    fn read_file(&self, path: &str) -> WorldResult<Vec<u8>>;

    fn write_file(&mut self, path: &str, data: &[u8]) -> WorldResult<()>;

    fn delete_file(&mut self, path: &str) -> WorldResult<()>;

    /// Absolute on-disk location of `path`.
    fn file_path(&self, path: &str) -> PathBuf;
}
