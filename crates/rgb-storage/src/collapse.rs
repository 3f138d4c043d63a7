//! `write_all_changes` as a pull-based progress iterator.
//!
//! ```text
//!  Start ──▶ Orphan pass (if a chain is detached) ──▶ Step pass ──▶ Step pass ──▶ Done
//!                replay chain into root                one per index toward target
//! ```
//!
//! Each item is one copy operation. A step pass owns a reversion node that
//! is only placed into the revision list when the pass finishes. If the
//! iterator is dropped or fails first, the pre-images in that node are
//! written back into the canonical backend and the node is destroyed, so
//! every revision reads as it did before the step began. An orphan pass
//! needs no rollback: the detached chain still shadows every key it copies.

use core::iter::FusedIterator;

use mc_region::Progress;
use tracing::{error, warn};

use crate::error::StorageResult;
use crate::history::RevisionHistory;
use crate::node::{CopyOp, NodeId};

pub(crate) struct OrphanPass {
    chain: Vec<NodeId>,
    ops: Vec<(NodeId, CopyOp)>,
    cursor: usize,
}

impl OrphanPass {
    pub(crate) const fn new(chain: Vec<NodeId>, ops: Vec<(NodeId, CopyOp)>) -> Self {
        Self {
            chain,
            ops,
            cursor: 0,
        }
    }
}

pub(crate) struct StepPass {
    current: NodeId,
    reversion: NodeId,
    next: usize,
    ops: Vec<CopyOp>,
    cursor: usize,
}

impl StepPass {
    pub(crate) const fn new(current: NodeId, reversion: NodeId, next: usize, ops: Vec<CopyOp>) -> Self {
        Self {
            current,
            reversion,
            next,
            ops,
            cursor: 0,
        }
    }
}

enum Phase {
    Start,
    Orphan(OrphanPass),
    Step(StepPass),
    Done,
}

/// Iterator returned by
/// [`RevisionHistory::write_all_changes_iter`](crate::RevisionHistory::write_all_changes_iter).
///
/// Yields `Ok(Progress)` after every copied key and at the end of every
/// pass. After the first `Err` it yields nothing more.
pub struct WriteAllChanges<'h> {
    history: &'h mut RevisionHistory,
    requested: Option<usize>,
    target: usize,
    phase: Phase,
}

impl<'h> WriteAllChanges<'h> {
    pub(crate) fn new(history: &'h mut RevisionHistory, target: Option<usize>) -> Self {
        Self {
            history,
            requested: target,
            target: 0,
            phase: Phase::Start,
        }
    }

    /// Apply the next operation of the current pass, if any remain.
    fn apply_next(&mut self) -> StorageResult<Option<Progress>> {
        let history = &mut *self.history;
        let root = history.root;
        match &mut self.phase {
            Phase::Orphan(pass) => {
                let Some((source, op)) = pass.ops.get(pass.cursor) else {
                    return Ok(None);
                };
                history.arena.apply_copy(*source, root, None, op)?;
                pass.cursor += 1;
                Ok(Some(Progress::new(
                    pass.cursor,
                    pass.ops.len() + 1,
                    format!("Reattaching root: {op}"),
                )))
            }
            Phase::Step(pass) => {
                let Some(op) = pass.ops.get(pass.cursor) else {
                    return Ok(None);
                };
                history
                    .arena
                    .apply_copy(pass.current, root, Some(pass.reversion), op)?;
                pass.cursor += 1;
                Ok(Some(Progress::new(
                    pass.cursor,
                    pass.ops.len() + 1,
                    format!("Collapsing revision {}: {op}", pass.next),
                )))
            }
            Phase::Start | Phase::Done => Ok(None),
        }
    }

    /// Plan the next step toward the target, or finish.
    fn next_step(&mut self) -> StorageResult<Phase> {
        Ok(self
            .history
            .begin_step(self.target)?
            .map_or(Phase::Done, Phase::Step))
    }

    fn advance(&mut self) -> StorageResult<Option<Progress>> {
        if let Some(progress) = self.apply_next()? {
            return Ok(Some(progress));
        }

        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Start => {
                self.target = self.history.resolve_target(self.requested)?;
                self.phase = match self.history.begin_orphan()? {
                    Some(pass) => Phase::Orphan(pass),
                    None => self.next_step()?,
                };
                Ok(None)
            }
            Phase::Orphan(pass) => {
                let total = pass.ops.len() + 1;
                self.history.finish_orphan(pass.chain)?;
                self.phase = self.next_step()?;
                Ok(Some(Progress::new(total, total, "Reattached root")))
            }
            Phase::Step(pass) => {
                let total = pass.ops.len() + 1;
                if let Err(e) = self.history.finish_step(pass.current, pass.reversion, pass.next) {
                    if let Err(rollback) = self.history.rollback_step(pass.reversion) {
                        error!(index = pass.next, "failed to roll back collapse step: {rollback}");
                    }
                    return Err(e);
                }
                let message = format!("Collapsed revision {}", pass.next);
                self.phase = self.next_step()?;
                Ok(Some(Progress::new(total, total, message)))
            }
            Phase::Done => Ok(None),
        }
    }

    /// Stop, rolling back a step whose reversion node was never placed.
    fn abort(&mut self) {
        if let Phase::Step(pass) = std::mem::replace(&mut self.phase, Phase::Done) {
            warn!(
                index = pass.next,
                copied = pass.cursor,
                of = pass.ops.len(),
                "collapse step interrupted, rolling back"
            );
            if let Err(e) = self.history.rollback_step(pass.reversion) {
                error!(index = pass.next, "failed to roll back collapse step: {e}");
            }
        }
    }
}

impl Iterator for WriteAllChanges<'_> {
    type Item = StorageResult<Progress>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.advance() {
                Ok(Some(progress)) => return Some(Ok(progress)),
                Ok(None) if matches!(self.phase, Phase::Done) => return None,
                Ok(None) => {}
                Err(e) => {
                    self.abort();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl FusedIterator for WriteAllChanges<'_> {}

impl Drop for WriteAllChanges<'_> {
    fn drop(&mut self) {
        self.abort();
    }
}
