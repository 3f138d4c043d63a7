//! World folder storage.
//!
//! A world is a directory holding chunk data in per-dimension region folders
//! next to arbitrary plain files. This crate exposes it through the
//! [`StorageBackend`] trait, which revision history layers build on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  WorldFolder (StorageBackend)                                       │
//! │    - Chunks routed to <dim>/region/r.<x>.<z>.mca                    │
//! │    - Plain files addressed by relative paths                        │
//! │    - Corrupt reads trigger a region repair and one retry            │
//! └─────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  LruMap<(dim, RegionPos), RegionFile>                               │
//! │    - Bounded set of open region files                               │
//! │    - Eviction hook runs before an entry is dropped                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use mc_world::{StorageBackend, WorldFolder, WorldOptions};
//!
//! let mut world = WorldFolder::open("saves/world", WorldOptions::default())?;
//! world.write_chunk_bytes(0, 0, "", &chunk_nbt)?;
//! world.write_file("level.dat", &level)?;
//!
//! for dim in world.list_dimensions()? {
//!     println!("{dim:?}: {} chunks", world.chunk_count(&dim)?);
//! }
//! ```

mod backend;
mod error;
mod folder;
mod lock;
mod lru;

pub use backend::StorageBackend;
pub use error::{WorldError, WorldResult};
pub use folder::{REGION_DIR, WorldFolder, WorldOptions};
pub use lock::{SESSION_LOCK, SessionLock};
pub use lru::{EvictHook, LruMap};
pub use mc_region::{ChunkPos, Progress};
