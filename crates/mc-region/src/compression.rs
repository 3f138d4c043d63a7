//! Record payload compression.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

use crate::error::{RegionError, RegionResult};

/// Compression byte stored after the record length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionFormat {
    /// Legacy gzip stream.
    Gzip = 1,
    /// Deflate in a zlib wrapper. Everything we write uses this.
    Zlib = 2,
}

impl CompressionFormat {
    /// Decode the on-disk format byte.
    pub const fn from_byte(byte: u8) -> RegionResult<Self> {
        match byte {
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Zlib),
            other => Err(RegionError::UnknownCompression(other)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Compress `data` at `level` (0-9).
    pub fn compress(self, data: &[u8], level: u32) -> RegionResult<Vec<u8>> {
        let level = Compression::new(level.min(9));
        let compressed = match self {
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
        };
        Ok(compressed)
    }

    /// Decompress a record payload.
    ///
    /// A stream that fails to inflate is corruption, not an IO failure.
    pub fn decompress(self, payload: &[u8]) -> RegionResult<Vec<u8>> {
        let mut out = Vec::new();
        let result = match self {
            Self::Gzip => GzDecoder::new(payload).read_to_end(&mut out),
            Self::Zlib => ZlibDecoder::new(payload).read_to_end(&mut out),
        };
        result.map_err(|e| RegionError::Format(format!("failed to inflate {self:?} payload: {e}")))?;
        Ok(out)
    }
}
