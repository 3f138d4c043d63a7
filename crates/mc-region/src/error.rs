//! Region file error types.

use thiserror::Error;

/// Region file error type.
#[derive(Debug, Error)]
pub enum RegionError {
    /// No record is stored for this chunk.
    #[error("chunk ({cx}, {cz}) not present")]
    ChunkNotPresent { cx: i32, cz: i32 },

    /// The record is structurally corrupt.
    #[error("region format error: {0}")]
    Format(String),

    /// The record uses a compression byte we do not know.
    #[error("unknown compression format {0}")]
    UnknownCompression(u8),

    /// A record would need 256 sectors or more.
    #[error("chunk too large: needs {sectors} sectors (max 255)")]
    ChunkTooLarge { sectors: usize },

    /// The region file was opened read-only.
    #[error("region file is read-only")]
    ReadOnly,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegionError {
    /// Whether this is the expected "nothing stored here" signal.
    #[must_use]
    pub const fn is_not_present(&self) -> bool {
        matches!(self, Self::ChunkNotPresent { .. })
    }

    /// Whether this error indicates on-disk corruption that repair can act on.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Format(_) | Self::UnknownCompression(_))
    }
}

/// Result type for region operations.
pub type RegionResult<T> = Result<T, RegionError>;
