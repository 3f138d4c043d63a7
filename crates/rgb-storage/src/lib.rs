//! Disk-backed revision history with undo past collapse.
//!
//! Edits to a world go into lightweight copy-on-write overlays instead of
//! the canonical world folder, so any number of them can be undone or
//! redone without keeping full snapshots:
//!
//! - **Overlays**: each revision stores only what it wrote, plus tombstones
//!   for what it deleted, and falls back to its parent for everything else
//! - **Selection**: moving between revisions reports which keys changed
//! - **Collapse**: accumulated overlays are folded into the canonical world,
//!   leaving reversion nodes behind so earlier revisions stay reachable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  RevisionHistory                                                    │
//! │    - Ordered revision list + canonical root position                │
//! │    - create / select / close revisions                              │
//! │    - WriteAllChanges: orphan replay, then one step per index        │
//! └─────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  NodeArena                                                          │
//! │    - RevisionNode: backend + TombstoneLog + parent link             │
//! │    - Reads walk parents until a hit or a tombstone                  │
//! └─────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  StorageBackend (mc-world)                                          │
//! │    - Canonical WorldFolder for the root                             │
//! │    - Session-private WorldFolder per overlay                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rgb_storage::{HistoryConfig, RevisionHistory};
//!
//! let mut history = RevisionHistory::open("saves/world", HistoryConfig::from_env())?;
//!
//! // Edit in a new revision
//! let mut rev = history.create_revision(None)?;
//! rev.write_chunk_bytes(1, 1, "", &chunk_nbt)?;
//!
//! // Undo, then redo
//! let changed = history.select_revision(0)?;
//! history.select_revision(1)?;
//!
//! // Fold everything into the world folder, reporting progress
//! for step in history.write_all_changes_iter(None) {
//!     println!("{}", step?);
//! }
//! history.close()?;
//! ```

#![allow(clippy::redundant_pub_crate)]

mod changes;
mod collapse;
mod config;
mod error;
mod history;
mod keys;
mod node;
mod revision;
mod tombstones;

pub use changes::ChangeSet;
pub use collapse::WriteAllChanges;
pub use config::HistoryConfig;
pub use error::{StorageError, StorageResult};
pub use history::RevisionHistory;
pub use keys::{ChunkKey, Key};
pub use mc_region::Progress;
pub use node::{NodeId, REVISION_INFO, TOMBSTONE_LOG};
pub use revision::{Revision, RevisionMut};
pub use tombstones::TombstoneLog;
