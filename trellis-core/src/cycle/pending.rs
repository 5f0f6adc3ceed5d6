//! Pending accumulators of the two cycles.

use indexmap::IndexMap;

use crate::boundary::BoundaryId;
use crate::engine::ChangeBatch;

#[derive(Debug, Clone, Copy)]
struct Dirty {
    depth: usize,
    force: bool,
}

/// Boundaries waiting for the update phase.
#[derive(Debug, Default)]
pub(crate) struct DirtySet {
    entries: IndexMap<BoundaryId, Dirty>,
}

impl DirtySet {
    /// Mark a boundary dirty. A forced mark stays forced.
    pub(crate) fn mark(&mut self, id: BoundaryId, depth: usize, force: bool) {
        self.entries
            .entry(id)
            .and_modify(|d| {
                d.force |= force;
                d.depth = depth;
            })
            .or_insert(Dirty { depth, force });
    }

    /// Drop a boundary from the set. Returns whether its mark was forced.
    pub(crate) fn cancel(&mut self, id: BoundaryId) -> Option<bool> {
        self.entries.shift_remove(&id).map(|d| d.force)
    }

    pub(crate) fn contains(&self, id: BoundaryId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Remove the shallowest boundary; ties go to the earliest mark.
    pub(crate) fn pop(&mut self) -> Option<(BoundaryId, bool)> {
        let (index, _) = self
            .entries
            .values()
            .enumerate()
            .min_by_key(|(i, d)| (d.depth, *i))?;
        let (id, dirty) = self.entries.shift_remove_index(index)?;
        Some((id, dirty.force))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Change batches waiting for the render phase, in production order.
#[derive(Debug, Default)]
pub(crate) struct RenderQueue {
    pub(crate) batches: Vec<ChangeBatch>,
}

impl RenderQueue {
    pub(crate) fn push(&mut self, batch: ChangeBatch) {
        if !batch.is_empty() {
            self.batches.push(batch);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
