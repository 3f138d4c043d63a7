//! World storage error types.

use mc_region::RegionError;
use thiserror::Error;

/// World storage error type.
#[derive(Debug, Error)]
pub enum WorldError {
    /// No chunk is stored at this position.
    #[error("chunk ({cx}, {cz}) not present in dimension {dim:?}")]
    ChunkNotPresent { cx: i32, cz: i32, dim: String },

    /// No file is stored at this path.
    #[error("file not present: {0}")]
    FileNotPresent(String),

    /// The path escapes the world folder or is otherwise unusable.
    #[error("invalid world path: {0:?}")]
    InvalidPath(String),

    /// The world folder was opened read-only.
    #[error("world folder is read-only")]
    ReadOnly,

    /// Region file error.
    #[error("region error: {0}")]
    Region(#[from] RegionError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorldError {
    /// Whether this is the expected "nothing stored here" signal.
    #[must_use]
    pub const fn is_not_present(&self) -> bool {
        matches!(
            self,
            Self::ChunkNotPresent { .. }
                | Self::FileNotPresent(_)
                | Self::Region(RegionError::ChunkNotPresent { .. })
        )
    }
}

/// Result type for world storage operations.
pub type WorldResult<T> = Result<T, WorldError>;
