//! Render infos: the instructions pairing hands to the applier.

use bitflags::bitflags;

use crate::tree::NodeId;

bitflags! {
    /// What happened to one tree node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderFlags: u16 {
        /// Create the output node and place it.
        const CREATE = 1 << 0;
        /// Relocate every top-level output node beneath the tree node.
        const MOVE = 1 << 1;
        /// Re-apply prop differences against the last applied snapshot.
        const UPDATE = 1 << 2;
        /// Tear down the subtree.
        const REMOVE = 1 << 3;
        /// Text or markup changed.
        const CONTENT = 1 << 4;
        /// The position now shows a different external node.
        const SWAP = 1 << 5;
        /// Re-derive the prop baseline from the live node.
        const REFRESH = 1 << 6;
        /// A passthrough with no output moved; fix caches only.
        const EMPTY_MOVE = 1 << 7;
    }
}

/// One instruction for the applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderInfo {
    pub node: NodeId,
    pub flags: RenderFlags,
    /// Tree parent the node was attached to before this change, for removals
    /// and moves across parents.
    pub from_parent: Option<NodeId>,
}

impl RenderInfo {
    pub fn new(node: NodeId, flags: RenderFlags) -> Self {
        Self {
            node,
            flags,
            from_parent: None,
        }
    }

    pub fn removal(node: NodeId, from_parent: Option<NodeId>) -> Self {
        Self {
            node,
            flags: RenderFlags::REMOVE,
            from_parent,
        }
    }

    pub fn is(&self, flag: RenderFlags) -> bool {
        self.flags.contains(flag)
    }
}

/// Counts for one render phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    pub moved: usize,
    pub updated: usize,
    pub removed: usize,
    /// Output nodes physically inserted or relocated.
    pub inserted: usize,
    /// Existing output nodes taken over by reassimilation.
    pub adopted: usize,
}

impl ApplyReport {
    pub fn merge(&mut self, other: &ApplyReport) {
        self.created += other.created;
        self.moved += other.moved;
        self.updated += other.updated;
        self.removed += other.removed;
        self.inserted += other.inserted;
        self.adopted += other.adopted;
    }

    pub fn is_empty(&self) -> bool {
        *self == ApplyReport::default()
    }
}
