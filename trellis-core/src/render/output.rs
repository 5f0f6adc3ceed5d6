//! Output Backend
//!
//! The engine never touches a concrete output tree directly. Everything goes
//! through [`OutputBackend`], a narrow factory/mutator over opaque node
//! handles. Attribute and style semantics are the backend's business; the
//! engine only hands it prop diffs.

use std::rc::Rc;

use crate::value::{Props, PropsDiff};

/// Handle to a node of the real output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealNode(u64);

impl RealNode {
    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RealNode {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A real output tree the engine can render into.
pub trait OutputBackend {
    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> RealNode;

    /// Create a detached plain-text node.
    fn create_text(&mut self, text: &str) -> RealNode;

    /// Create a detached node holding raw markup.
    fn create_markup(&mut self, markup: &str) -> RealNode;

    /// Replace the content of a text or markup node.
    fn set_text(&mut self, node: RealNode, text: &str);

    /// Apply prop writes to a node.
    fn apply_props(&mut self, node: RealNode, diff: &PropsDiff);

    /// Read back the node's current observable props.
    fn read_props(&self, node: RealNode) -> Props;

    /// Insert `node` under `parent` before `before` (append when `None`).
    ///
    /// A node that is already attached elsewhere is moved.
    fn insert(&mut self, parent: RealNode, node: RealNode, before: Option<RealNode>);

    /// Detach a node from its parent. Detaching a detached node is a no-op.
    fn detach(&mut self, node: RealNode);

    fn parent(&self, node: RealNode) -> Option<RealNode>;

    fn next_sibling(&self, node: RealNode) -> Option<RealNode>;

    fn children(&self, node: RealNode) -> Vec<RealNode>;

    /// Element tag, `None` for text and markup nodes.
    fn tag(&self, node: RealNode) -> Option<Rc<str>>;

    /// Text of a text or markup node.
    fn text(&self, node: RealNode) -> Option<String>;

    /// Copy a node, with its subtree when `deep`.
    fn clone_node(&mut self, node: RealNode, deep: bool) -> RealNode;
}
