//! Sector-allocated region files.
//!
//! A region file stores up to 1024 variable-length, compressed chunk records
//! keyed by chunk position, in fixed 4096-byte sectors behind two header
//! tables. This crate is the standalone codec: it knows nothing about worlds,
//! dimensions or revisions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  RegionFile                                                         │
//! │    - Offset + timestamp tables held in memory, written through      │
//! │    - Free-sector map derived from the offset table on open         │
//! │    - In-place reuse, first-fit, then append at EOF                  │
//! └─────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  RepairIter                                                         │
//! │    - Discards out-of-range, overlapping and unparsable entries      │
//! │    - Moves misplaced chunks to their own empty slot                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use mc_region::{RegionFile, RegionOptions};
//!
//! let mut region = RegionFile::open("world/region/r.0.0.mca", RegionOptions::default())?;
//! region.write_chunk(3, 7, &chunk_nbt)?;
//! let bytes = region.read_chunk(3, 7)?;
//!
//! for step in region.repair_iter() {
//!     println!("{step}");
//! }
//! ```

#![allow(clippy::redundant_pub_crate)]

mod compression;
mod error;
mod nbt;
mod pos;
mod progress;
mod region;
mod repair;

pub use compression::CompressionFormat;
pub use error::{RegionError, RegionResult};
pub use nbt::{CoordinateProbe, NbtCoordinateProbe};
pub use pos::{ChunkPos, REGION_WIDTH, RegionPos, SLOTS};
pub use progress::Progress;
pub use region::{
    Allocation, HEADER_SECTORS, MAX_RECORD_SECTORS, RegionFile, RegionOptions, SECTOR_SIZE,
};
pub use repair::{RepairIter, RepairReport};
