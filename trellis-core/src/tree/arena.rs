//! Tree Arena
//!
//! All tree nodes live in one map indexed by id. Parent links are plain ids,
//! so tearing down a subtree is a matter of removing ids, never of breaking
//! reference cycles.
//!
//! # Nearest-real-node cache
//!
//! Every passthrough node caches the first output node reachable downward
//! through its children (skipping portals). After anything changes the output
//! node of `T` or the children order below an ancestor, [`Tree::propagate_dom`]
//! walks upward recomputing each passthrough ancestor and stops at the first
//! one whose value did not change, or at the first real/portal ancestor.

use std::collections::HashMap;

use smallvec::SmallVec;

use super::node::{IdGen, NodeData, NodeId, NodeKind, TreeNode};
use crate::boundary::BoundaryId;
use crate::render::RealNode;

/// Position of a node as child indices from the root.
pub type TreePath = SmallVec<[usize; 8]>;

/// The output-tree skeleton.
#[derive(Debug)]
pub struct Tree {
    /// All nodes in the tree, indexed by ID.
    nodes: HashMap<NodeId, TreeNode>,
    root: NodeId,
}

impl Tree {
    /// Create a tree holding only a root node.
    pub fn new(ids: &IdGen) -> Self {
        let root = ids.node();
        let mut nodes = HashMap::new();
        nodes.insert(root, TreeNode::new(root, NodeKind::Root, None));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// A node that exists and has not been unmounted.
    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| !n.detached)
    }

    /// Get the total number of nodes, including detached ones not yet purged.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(|n| n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map_or(&[], |n| &n.children)
    }

    /// Add a node as the last child of `parent`.
    pub(crate) fn insert(
        &mut self,
        ids: &IdGen,
        parent: NodeId,
        kind: NodeKind,
        owner: Option<BoundaryId>,
        data: NodeData,
    ) -> NodeId {
        let id = ids.node();
        let mut node = TreeNode::new(id, kind, owner);
        node.data = data;
        node.parent = Some(parent);
        if let Some(p) = self.nodes.get_mut(&parent) {
            node.depth = p.depth + 1;
            p.children.push(id);
        }
        self.nodes.insert(id, node);
        id
    }

    /// Replace the children list of `parent`, adopting every listed node.
    ///
    /// Nodes that lived under another parent are removed from its list.
    pub(crate) fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let depth = self.nodes.get(&parent).map_or(0, |p| p.depth + 1);
        for &child in &children {
            let old_parent = self.nodes.get(&child).and_then(|n| n.parent);
            if let Some(old) = old_parent.filter(|&old| old != parent) {
                if let Some(p) = self.nodes.get_mut(&old) {
                    p.children.retain(|&c| c != child);
                }
            }
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
            self.set_depth(child, depth);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children = children;
        }
    }

    fn set_depth(&mut self, id: NodeId, depth: usize) {
        let mut stack = vec![(id, depth)];
        while let Some((id, depth)) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&id) {
                if node.depth == depth {
                    continue;
                }
                node.depth = depth;
                stack.extend(node.children.iter().map(|&c| (c, depth + 1)));
            }
        }
    }

    /// Unlink `id` from its parent and mark its subtree detached.
    ///
    /// Returns the former parent. The nodes stay in the arena until
    /// [`Tree::purge`] so that pending render-infos can still read them.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|&c| c != id);
        }
        for node_id in self.descendants(id) {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.detached = true;
            }
        }
        parent
    }

    /// Remove a subtree from the arena, returning the removed nodes.
    pub(crate) fn purge(&mut self, id: NodeId) -> Vec<TreeNode> {
        if let Some(p) = self.parent(id).and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|&c| c != id);
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.nodes.remove(&n))
            .collect()
    }

    /// `id` and all nodes below it, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(id);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Child indices from the root down to `id`.
    pub fn path(&self, id: NodeId) -> TreePath {
        let mut path = TreePath::new();
        let mut cur = id;
        while let Some(parent) = self.parent(cur) {
            let index = self
                .children(parent)
                .iter()
                .position(|&c| c == cur)
                .unwrap_or(usize::MAX);
            path.push(index);
            cur = parent;
        }
        path.reverse();
        path
    }

    // ------------------------------------------------------------------------
    // Nearest-real-node cache
    // ------------------------------------------------------------------------

    /// First inline output node among the children of `id`.
    fn first_inline_dom(&self, id: NodeId) -> Option<RealNode> {
        self.children(id)
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .find_map(TreeNode::inline_dom)
    }

    /// Re-thread the cache upward after the output node of `from` (or the
    /// order of its children) changed.
    pub(crate) fn propagate_dom(&mut self, from: NodeId) {
        let mut cur = Some(from);
        while let Some(id) = cur {
            let Some(node) = self.nodes.get(&id) else {
                return;
            };
            let kind = node.kind;
            let parent = node.parent;
            if kind.is_passthrough() {
                let fresh = self.first_inline_dom(id);
                let node = match self.nodes.get_mut(&id) {
                    Some(node) => node,
                    None => return,
                };
                if node.dom == fresh && id != from {
                    return;
                }
                node.dom = fresh;
            } else if id != from {
                return;
            }
            cur = parent;
        }
    }

    /// Recompute every cached pointer bottom-up.
    pub(crate) fn rebuild_dom_cache(&mut self) {
        let order = self.descendants(self.root);
        for id in order.into_iter().rev() {
            if self.kind(id).is_some_and(NodeKind::is_passthrough) {
                let fresh = self.first_inline_dom(id);
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.dom = fresh;
                }
            }
        }
    }

    /// The nearest real node below `id` by a full downward scan.
    pub fn scan_dom(&self, id: NodeId) -> Option<RealNode> {
        let node = self.nodes.get(&id)?;
        if !node.kind.is_passthrough() {
            return node.dom;
        }
        node.children.iter().find_map(|&c| match self.kind(c) {
            Some(NodeKind::Portal) => None,
            _ => self.scan_dom(c),
        })
    }

    /// Check every cached pointer reachable from the root against a full scan.
    ///
    /// Returns the first node whose cache is stale.
    pub fn verify_dom_cache(&self) -> Result<(), NodeId> {
        for id in self.descendants(self.root) {
            let node = &self.nodes[&id];
            if node.kind.is_passthrough() && node.dom != self.scan_dom(id) {
                return Err(id);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Insertion points
    // ------------------------------------------------------------------------

    /// Top-level real nodes at or below `id`.
    ///
    /// With `through_portals`, the top-level real nodes of every portal below
    /// `id` are included too, even portals nested inside real nodes. Those
    /// live in another container and have to be detached on their own.
    pub fn real_roots(&self, id: NodeId, through_portals: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        // (node, already covered by a real ancestor in the same container)
        let mut stack = vec![(id, false)];
        while let Some((id, covered)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let children = node.children.iter().rev();
            match node.kind {
                NodeKind::Real => {
                    if !covered {
                        out.push(id);
                    }
                    if through_portals {
                        stack.extend(children.map(|&c| (c, true)));
                    }
                }
                NodeKind::Portal if !through_portals => {}
                NodeKind::Portal => stack.extend(children.map(|&c| (c, false))),
                _ => stack.extend(children.map(|&c| (c, covered))),
            }
        }
        out
    }

    /// The output node that physically contains `id`, walking up through
    /// passthrough nodes. The root resolves to `container`.
    pub(crate) fn real_parent(&self, id: NodeId, container: RealNode) -> Option<RealNode> {
        let mut cur = self.parent(id);
        while let Some(pid) = cur {
            let parent = self.nodes.get(&pid)?;
            match parent.kind {
                NodeKind::Real | NodeKind::Portal => return parent.dom,
                NodeKind::Root => return Some(container),
                _ => cur = parent.parent,
            }
        }
        None
    }

    /// The nearest subsequent inline output node, used as insert-before
    /// reference. `None` means "append".
    pub(crate) fn next_real_sibling(&self, id: NodeId) -> Option<RealNode> {
        let mut cur = id;
        loop {
            let pid = self.parent(cur)?;
            let parent = self.nodes.get(&pid)?;
            let siblings = &parent.children;
            let start = siblings.iter().position(|&c| c == cur)? + 1;
            let next = siblings[start..]
                .iter()
                .filter_map(|c| self.nodes.get(c))
                .find_map(TreeNode::inline_dom);
            if next.is_some() {
                return next;
            }
            if !parent.kind.is_passthrough() || parent.kind == NodeKind::Root {
                return None;
            }
            cur = pid;
        }
    }
}
