//! Storage error types.

use mc_world::WorldError;
use thiserror::Error;

use crate::node::NodeId;

/// Storage error type.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error.
    #[error("world error: {0}")]
    World(#[from] WorldError),

    /// No revision in the chain shows this chunk.
    #[error("chunk ({cx}, {cz}) not present in dimension {dim:?}")]
    ChunkNotPresent { cx: i32, cz: i32, dim: String },

    /// No revision in the chain shows this file.
    #[error("file not present: {0}")]
    FileNotPresent(String),

    /// Write attempted on a read-only revision.
    #[error("revision {index} is read-only")]
    ReadOnly { index: usize },

    /// Revision index out of range.
    #[error("invalid revision: {0}")]
    InvalidRevision(usize),

    /// The node was destroyed.
    #[error("revision node {0} no longer exists")]
    InvalidNode(NodeId),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Revision info could not be encoded or decoded.
    #[error("revision info error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tombstone log record could not be encoded or decoded.
    #[error("tombstone log error: {0}")]
    Log(#[from] bincode::Error),
}

impl StorageError {
    /// Whether this is the expected "nothing stored here" signal.
    #[must_use]
    pub fn is_not_present(&self) -> bool {
        match self {
            Self::ChunkNotPresent { .. } | Self::FileNotPresent(_) => true,
            Self::World(e) => e.is_not_present(),
            _ => false,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
