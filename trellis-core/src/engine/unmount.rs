//! Unmounting subtrees.
//!
//! Unmounting happens during pairing: the tree nodes are detached right away
//! and a single REMOVE info is recorded for the top node. The applier tears
//! the output down and purges the nodes in the render phase.

use tracing::debug;

use super::Engine;
use crate::boundary::{BoundaryId, BoundaryKind};
use crate::cycle::DirtySet;
use crate::render::RenderInfo;
use crate::tree::NodeId;

impl Engine {
    /// Unmount `node` and everything below it.
    ///
    /// Nodes that are already detached are left alone, so a subtree reached
    /// twice (say, through a content pass and its source) is removed once.
    pub(crate) fn unmount_node(&mut self, node: NodeId, dirty: &mut DirtySet) {
        if !self.tree.is_live(node) {
            return;
        }
        self.teardown(node, dirty);
        let from_parent = self.tree.detach(node);
        self.out.infos.push(RenderInfo::removal(node, from_parent));
    }

    /// Unmount hosted boundaries, deepest first.
    fn teardown(&mut self, node: NodeId, dirty: &mut DirtySet) {
        let hosted: Vec<BoundaryId> = self
            .tree
            .descendants(node)
            .into_iter()
            .rev()
            .filter_map(|id| self.tree.get(id).and_then(|n| n.boundary()))
            .collect();
        for id in hosted {
            self.unmount_boundary(id, dirty);
        }
    }

    fn unmount_boundary(&mut self, id: BoundaryId, dirty: &mut DirtySet) {
        if id == self.root {
            return;
        }
        self.call_hook(id, |c, cx| c.will_unmount(cx));
        dirty.cancel(id);
        self.deferred.retain(|&d| d != id);
        self.renders.remove(&id);

        let Some(b) = self.boundaries.remove(&id) else {
            return;
        };
        debug!(boundary = id.raw(), "unmounted boundary");

        if let BoundaryKind::Content { forwards: Some(src) } = b.kind {
            if let Some(source) = self.boundaries.get_mut(&src) {
                source.content_passes.retain(|&p| p != id);
            }
        }
        for pass in &b.content_passes {
            if let Some(BoundaryKind::Content { forwards }) = self.boundaries.get_mut(pass).map(|p| &mut p.kind) {
                *forwards = None;
            }
        }
        self.wires.retain(|w| w.source != id && w.target != id);
    }
}
