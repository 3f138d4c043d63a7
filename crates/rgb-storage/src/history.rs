//! The revision list and its canonical root.
//!
//! `order` is the user-visible revision list. Exactly one entry is the
//! canonical root node (at `root_index`) except while an orphan chain is
//! pending: then `order[root_index]` is the chain's tail and the root is
//! only reachable through parent links.
//!
//! ```text
//!  index:    0          1          2          3
//!          [ R1 ] ──▶ [ R2 ] ──▶ [root] ◀── [ C ]
//!          reversion nodes       canonical   overlay
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use mc_world::{SessionLock, StorageBackend, WorldFolder};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::changes::ChangeSet;
use crate::collapse::{OrphanPass, StepPass, WriteAllChanges};
use crate::config::HistoryConfig;
use crate::error::{StorageError, StorageResult};
use crate::node::{Differences, NodeArena, NodeId, RevisionNode};
use crate::revision::{Revision, RevisionMut};

/// Session directory name holding the root's metadata.
const ROOT_DIR: &str = "root";

/// Undo/redo history over a canonical storage backend.
pub struct RevisionHistory {
    pub(crate) arena: NodeArena,
    pub(crate) order: Vec<NodeId>,
    pub(crate) root: NodeId,
    pub(crate) root_index: usize,
    pub(crate) orphan_index: Option<usize>,
    selected: usize,
    next_id: u64,
    config: HistoryConfig,
    // Dropped after the arena so overlay region files are closed first.
    session: TempDir,
    lock: Option<SessionLock>,
}

impl RevisionHistory {
    /// Open the world folder at `world` as the canonical root and take its
    /// session lock.
    pub fn open(world: impl AsRef<Path>, config: HistoryConfig) -> StorageResult<Self> {
        let world = world.as_ref();
        let backend = WorldFolder::open(world, config.world_options(false))?;
        let lock = SessionLock::acquire(world)?;
        info!(path = %world.display(), "opened world history");
        Self::with_backend(Box::new(backend), config, Some(lock))
    }

    /// Use any backend as the canonical root. No session lock is taken.
    pub fn new(backend: impl StorageBackend + 'static, config: HistoryConfig) -> StorageResult<Self> {
        Self::with_backend(Box::new(backend), config, None)
    }

    fn with_backend(
        backend: Box<dyn StorageBackend>,
        config: HistoryConfig,
        lock: Option<SessionLock>,
    ) -> StorageResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("rgb-history-");
        let session = match &config.temp_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };

        let root_id = NodeId(0);
        let mut root = RevisionNode::new(root_id, backend, None, session.path().join(ROOT_DIR), false)?;
        root.readonly = true;
        root.differences = Differences::Precomputed(ChangeSet::new());

        let mut arena = NodeArena::default();
        arena.insert(root);
        debug!(session = %session.path().display(), "created revision session");

        Ok(Self {
            arena,
            order: vec![root_id],
            root: root_id,
            root_index: 0,
            orphan_index: None,
            selected: 0,
            next_id: 1,
            config,
            session,
            lock,
        })
    }

    // ==================== Accessors ====================

    /// Number of revisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Always `false`: the root revision exists for the history's lifetime.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn head_index(&self) -> usize {
        self.order.len() - 1
    }

    #[must_use]
    pub const fn selected_index(&self) -> usize {
        self.selected
    }

    /// Position of the canonical root in the revision list.
    #[must_use]
    pub const fn root_index(&self) -> usize {
        self.root_index
    }

    /// Position of a detached chain waiting for the next collapse.
    #[must_use]
    pub const fn orphan_chain_index(&self) -> Option<usize> {
        self.orphan_index
    }

    #[must_use]
    pub fn session_dir(&self) -> &Path {
        self.session.path()
    }

    #[must_use]
    pub const fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub(crate) fn node_at(&self, index: usize) -> StorageResult<NodeId> {
        self.order
            .get(index)
            .copied()
            .ok_or(StorageError::InvalidRevision(index))
    }

    // ==================== Views ====================

    pub fn revision(&self, index: usize) -> StorageResult<Revision<'_>> {
        let id = self.node_at(index)?;
        Ok(Revision::new(self, index, id))
    }

    pub fn revision_mut(&mut self, index: usize) -> StorageResult<RevisionMut<'_>> {
        let id = self.node_at(index)?;
        Ok(RevisionMut::new(self, index, id))
    }

    pub fn head(&self) -> StorageResult<Revision<'_>> {
        self.revision(self.head_index())
    }

    pub fn head_mut(&mut self) -> StorageResult<RevisionMut<'_>> {
        self.revision_mut(self.head_index())
    }

    /// The revision chosen by [`select_revision`](Self::select_revision).
    pub fn selected(&self) -> StorageResult<Revision<'_>> {
        self.revision(self.selected)
    }

    // ==================== Revisions ====================

    /// Start a writable revision on top of `target` (the head by default).
    ///
    /// Revisions after `target` are dropped. Branching below the root
    /// detaches the chain between `target` and the root until the next
    /// collapse.
    pub fn create_revision(&mut self, target: Option<usize>) -> StorageResult<RevisionMut<'_>> {
        let target = target.unwrap_or_else(|| self.head_index());
        let parent = self.node_at(target)?;
        let id = self.spawn_overlay(Some(parent))?;

        if target < self.root_index {
            debug!(target, root_index = self.root_index, "detaching orphan chain");
            self.root_index = target;
            self.orphan_index = Some(target);
        }
        self.arena.get_mut(parent)?.readonly = true;

        let dropped = self.order.split_off(target + 1);
        if !dropped.is_empty() {
            let pending = self.orphan_chain()?;
            for old in dropped {
                if old != self.root && !pending.contains(&old) {
                    self.arena.destroy(old);
                }
            }
        }

        self.order.push(id);
        let index = self.head_index();
        self.selected = index;
        debug!(node = %id, index, "created revision");
        Ok(RevisionMut::new(self, index, id))
    }

    /// Make the head read-only, so the next edit needs a new revision.
    pub fn close_revision(&mut self) -> StorageResult<()> {
        let head = self.node_at(self.head_index())?;
        self.arena.get_mut(head)?.readonly = true;
        Ok(())
    }

    /// Move the selection. Returns what differs between the old and new
    /// selection, or `None` if it did not move.
    pub fn select_revision(&mut self, index: usize) -> StorageResult<Option<ChangeSet>> {
        self.node_at(index)?;
        if index == self.selected {
            return Ok(None);
        }
        let changes = self.revision_changes(self.selected, index)?;
        debug!(from = self.selected, to = index, "selected revision");
        self.selected = index;
        Ok(Some(changes))
    }

    /// Union of the changes of every revision after `min(a, b)` up to and
    /// including `max(a, b)`.
    pub fn revision_changes(&self, a: usize, b: usize) -> StorageResult<ChangeSet> {
        let (lo, hi) = (a.min(b), a.max(b));
        self.node_at(hi)?;
        let mut changes = ChangeSet::new();
        for &id in &self.order[lo + 1..=hi] {
            changes.union(&self.arena.get(id)?.changes()?);
        }
        Ok(changes)
    }

    /// Every revision index with its info.
    pub fn list_revisions(&self) -> StorageResult<Vec<(usize, Option<Value>)>> {
        self.order
            .iter()
            .enumerate()
            .map(|(index, &id)| -> StorageResult<_> { Ok((index, self.arena.get(id)?.info()?)) })
            .collect()
    }

    pub fn revision_info(&self, index: usize) -> StorageResult<Option<Value>> {
        self.arena.get(self.node_at(index)?)?.info()
    }

    pub fn set_revision_info(&mut self, index: usize, info: &Value) -> StorageResult<()> {
        self.arena.get(self.node_at(index)?)?.set_info(Some(info))
    }

    // ==================== Collapse ====================

    /// Fold every revision between the root and `target` (the head by
    /// default) into the canonical backend.
    pub fn write_all_changes(&mut self, target: Option<usize>) -> StorageResult<()> {
        for step in self.write_all_changes_iter(target) {
            step?;
        }
        Ok(())
    }

    /// Progress-iterator form of [`write_all_changes`](Self::write_all_changes).
    ///
    /// Stopping early keeps every completed step. A partially copied step is
    /// rolled back from the pre-images its reversion node saved.
    pub fn write_all_changes_iter(&mut self, target: Option<usize>) -> WriteAllChanges<'_> {
        WriteAllChanges::new(self, target)
    }

    /// Release every overlay, the session directory and the session lock.
    pub fn close(self) -> StorageResult<()> {
        let Self {
            arena,
            session,
            lock,
            ..
        } = self;
        drop(arena);
        let path = session.path().to_path_buf();
        session.close()?;
        if let Some(lock) = lock {
            lock.release()?;
        }
        info!(session = %path.display(), "closed world history");
        Ok(())
    }

    // ==================== Internals ====================

    fn spawn_overlay(&mut self, parent: Option<NodeId>) -> StorageResult<NodeId> {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let meta_dir: PathBuf = self.session.path().join(format!("node-{id}"));
        let backend = WorldFolder::open(meta_dir.join("world"), self.config.world_options(false))?;
        let node = RevisionNode::new(id, Box::new(backend), parent, meta_dir, true)?;
        self.arena.insert(node);
        Ok(id)
    }

    /// Nodes reachable from the pending orphan tail, the root included.
    fn orphan_chain(&self) -> StorageResult<FxHashSet<NodeId>> {
        let Some(index) = self.orphan_index else {
            return Ok(FxHashSet::default());
        };
        Ok(self
            .arena
            .lineage(self.order[index])?
            .into_iter()
            .map(|node| node.id)
            .collect())
    }

    pub(crate) fn resolve_target(&self, target: Option<usize>) -> StorageResult<usize> {
        let target = target.unwrap_or_else(|| self.head_index());
        self.node_at(target)?;
        Ok(target)
    }

    /// Plan the replay of a pending orphan chain, nearest the root first.
    pub(crate) fn begin_orphan(&self) -> StorageResult<Option<OrphanPass>> {
        let Some(index) = self.orphan_index else {
            return Ok(None);
        };
        let chain: Vec<NodeId> = self
            .arena
            .lineage(self.order[index])?
            .into_iter()
            .map(|node| node.id)
            .take_while(|&id| id != self.root)
            .collect();

        let mut ops = Vec::new();
        for &id in chain.iter().rev() {
            ops.extend(self.arena.get(id)?.copy_ops()?.into_iter().map(|op| (id, op)));
        }
        info!(index, nodes = chain.len(), ops = ops.len(), "replaying orphan chain");
        Ok(Some(OrphanPass::new(chain, ops)))
    }

    /// Put the root at the orphan position and drop the replayed chain.
    pub(crate) fn finish_orphan(&mut self, chain: Vec<NodeId>) -> StorageResult<()> {
        let Some(index) = self.orphan_index else {
            return Ok(());
        };
        if let Some(&tail) = chain.first() {
            let tail_node = self.arena.get(tail)?;
            let changes = tail_node.changes()?;
            let info = tail_node.info()?;
            let root = self.arena.get_mut(self.root)?;
            root.set_info(info.as_ref())?;
            root.differences = Differences::Precomputed(changes);

            let links: FxHashMap<NodeId, NodeId> = [(tail, self.root)].into_iter().collect();
            self.arena.relink(&links, &chain);
        }

        self.order[index] = self.root;
        self.orphan_index = None;
        for id in chain {
            self.arena.destroy(id);
        }
        info!(index, "reattached root");
        Ok(())
    }

    /// Plan one collapse step from the root toward `target`.
    pub(crate) fn begin_step(&mut self, target: usize) -> StorageResult<Option<StepPass>> {
        if target == self.root_index {
            return Ok(None);
        }
        let next = if target > self.root_index {
            self.root_index + 1
        } else {
            self.root_index - 1
        };
        let current = self.order[next];
        let ops = self.arena.get(current)?.copy_ops()?;
        let reversion = self.spawn_overlay(Some(self.root))?;
        debug!(index = next, node = %current, reversion = %reversion, ops = ops.len(), "collapse step");
        Ok(Some(StepPass::new(current, reversion, next, ops)))
    }

    /// Swap the reversion node and the root into place after a step's copy.
    pub(crate) fn finish_step(&mut self, current: NodeId, reversion: NodeId, next: usize) -> StorageResult<()> {
        let changes = self.arena.get(current)?.changes()?;
        let root_info = self.arena.get(self.root)?.info()?;
        let current_info = self.arena.get(current)?.info()?;
        self.arena.get(reversion)?.set_info(root_info.as_ref())?;
        self.arena.get(self.root)?.set_info(current_info.as_ref())?;

        let root = self.arena.get_mut(self.root)?;
        let old = std::mem::replace(&mut root.differences, Differences::Precomputed(changes));
        let reversion_node = self.arena.get_mut(reversion)?;
        reversion_node.differences = old;
        reversion_node.readonly = true;

        let links: FxHashMap<NodeId, NodeId> =
            [(self.root, reversion), (current, self.root)].into_iter().collect();
        self.arena.relink(&links, &[reversion, current]);

        self.order[self.root_index] = reversion;
        self.order[next] = self.root;
        self.root_index = next;
        self.arena.destroy(current);
        info!(index = next, "collapsed revision into root");
        Ok(())
    }

    /// Undo a step that was never placed: write every pre-image the
    /// reversion node saved back into the root, then destroy the node.
    pub(crate) fn rollback_step(&mut self, reversion: NodeId) -> StorageResult<()> {
        let restored = self.restore_preimages(reversion);
        self.arena.destroy(reversion);
        let count = restored?;
        debug!(reversion = %reversion, restored = count, "rolled back collapse step");
        Ok(())
    }

    fn restore_preimages(&mut self, reversion: NodeId) -> StorageResult<usize> {
        let ops = self.arena.get(reversion)?.copy_ops()?;
        for op in &ops {
            self.arena.apply_copy(reversion, self.root, None, op)?;
        }
        Ok(ops.len())
    }
}
