//! Tree Nodes
//!
//! This module defines the node type that lives in the output-tree skeleton.

use std::cell::Cell;
use std::rc::Rc;

use crate::boundary::BoundaryId;
use crate::def::{Attachments, ContentDef, Key};
use crate::render::RealNode;
use crate::value::Props;

/// Unique identifier for a node in the tree skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Host-scoped id generator shared by tree nodes and boundaries.
#[derive(Debug, Default)]
pub struct IdGen {
    next: Cell<u64>,
}

impl IdGen {
    pub(crate) fn next_raw(&self) -> u64 {
        let id = self.next.get();
        self.next.set(id + 1);
        id
    }

    /// Generate a new node ID.
    pub fn node(&self) -> NodeId {
        NodeId(self.next_raw())
    }
}

/// The kind of node in the tree skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Owns a real output node (element, text, markup, external node).
    Real,

    /// Children live inside another output container.
    Portal,

    /// Hosts a source boundary.
    Boundary,

    /// Hosts a content boundary forwarding ancestor content.
    ContentPass,

    /// An isolated sub-host.
    NestedHost,

    /// Children are inlined into the parent.
    Fragment,

    /// The host root.
    Root,

    /// Placeholder with no output.
    Empty,
}

impl NodeKind {
    /// Passthrough kinds have no output node of their own; their `dom`
    /// caches the nearest real node reachable downward.
    pub fn is_passthrough(self) -> bool {
        !matches!(self, NodeKind::Real | NodeKind::Portal)
    }
}

/// Render data copied from the def that realizes the node.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeData {
    pub(crate) tag: Option<Rc<str>>,
    pub(crate) content: Option<ContentDef>,
    /// Content last written to the output node.
    pub(crate) applied_content: Option<ContentDef>,
    pub(crate) external: Option<RealNode>,
    /// External node last swapped in for `external`.
    pub(crate) applied_external: Option<RealNode>,
    pub(crate) key: Option<Key>,
    /// Target props.
    pub(crate) props: Props,
    /// Props last written to the output node; `None` until first applied.
    pub(crate) applied_props: Option<Props>,
    pub(crate) attachments: Attachments,
}

/// A node in the tree skeleton.
#[derive(Debug)]
pub struct TreeNode {
    /// Unique identifier for this node.
    pub(crate) id: NodeId,

    /// What kind of node this is.
    pub(crate) kind: NodeKind,

    /// Back-reference to the parent; the parent owns this node.
    pub(crate) parent: Option<NodeId>,

    /// Owned children, in output order.
    pub(crate) children: Vec<NodeId>,

    /// Own output node for real kinds (and the container for portals);
    /// otherwise the nearest real output node reachable downward.
    pub(crate) dom: Option<RealNode>,

    /// Boundary hosted by this node.
    pub(crate) boundary: Option<BoundaryId>,

    /// Boundary whose pairing created this node.
    pub(crate) owner: Option<BoundaryId>,

    /// Distance from the root.
    pub(crate) depth: usize,

    /// Unmounted; waiting for the applier to tear it down.
    pub(crate) detached: bool,

    pub(crate) data: NodeData,
}

impl TreeNode {
    pub(crate) fn new(id: NodeId, kind: NodeKind, owner: Option<BoundaryId>) -> Self {
        Self {
            id,
            kind,
            parent: None,
            children: Vec::new(),
            dom: None,
            boundary: None,
            owner,
            depth: 0,
            detached: false,
            data: NodeData::default(),
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The node's own output node, or the cached nearest one below it.
    pub fn dom(&self) -> Option<RealNode> {
        self.dom
    }

    /// The output node that counts for insertion points among siblings.
    ///
    /// Portal content lives elsewhere and never counts.
    pub(crate) fn inline_dom(&self) -> Option<RealNode> {
        match self.kind {
            NodeKind::Portal => None,
            _ => self.dom,
        }
    }

    pub fn boundary(&self) -> Option<BoundaryId> {
        self.boundary
    }

    pub fn owner(&self) -> Option<BoundaryId> {
        self.owner
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn tag(&self) -> Option<&str> {
        self.data.tag.as_deref()
    }

    pub fn key(&self) -> Option<&Key> {
        self.data.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.data.props
    }
}
