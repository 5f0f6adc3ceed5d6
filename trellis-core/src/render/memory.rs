//! In-memory output tree.
//!
//! [`MemoryDom`] is a complete [`OutputBackend`] kept in a hash map. It counts
//! the operations performed on it, which makes it the backend of choice for
//! tests that assert how much work a render did.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use super::output::{OutputBackend, RealNode};
use crate::value::{Props, PropsDiff};

#[derive(Debug, Clone)]
enum MemKind {
    Element(Rc<str>),
    Text(String),
    Markup(String),
}

#[derive(Debug, Clone)]
struct MemNode {
    kind: MemKind,
    props: Props,
    parent: Option<RealNode>,
    children: Vec<RealNode>,
}

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomStats {
    pub created: usize,
    pub inserted: usize,
    pub detached: usize,
    pub prop_writes: usize,
    pub text_writes: usize,
}

/// A hash-map backed output tree.
#[derive(Debug, Default)]
pub struct MemoryDom {
    nodes: HashMap<RealNode, MemNode>,
    next_id: u64,
    stats: DomStats,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DomStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DomStats::default();
    }

    /// Number of nodes ever created and not dropped.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn alloc(&mut self, kind: MemKind) -> RealNode {
        let id = RealNode::from(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            MemNode {
                kind,
                props: Props::new(),
                parent: None,
                children: Vec::new(),
            },
        );
        self.stats.created += 1;
        id
    }

    /// Serialize a node and its subtree as HTML-like markup.
    ///
    /// Prop values are written with their display text; containers are skipped.
    pub fn to_markup(&self, node: RealNode) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    /// Markup of a node's children only.
    pub fn inner_markup(&self, node: RealNode) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_markup(child, &mut out);
        }
        out
    }

    fn write_markup(&self, node: RealNode, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            MemKind::Text(text) | MemKind::Markup(text) => out.push_str(text),
            MemKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in n.props.iter() {
                    if let Some(text) = value.to_text() {
                        let _ = write!(out, " {name}=\"{text}\"");
                    }
                }
                out.push('>');
                for &child in &n.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn unlink(&mut self, node: RealNode) {
        let parent = self.nodes.get_mut(&node).and_then(|n| n.parent.take());
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|&c| c != node);
        }
    }
}

impl OutputBackend for MemoryDom {
    fn create_element(&mut self, tag: &str) -> RealNode {
        self.alloc(MemKind::Element(Rc::from(tag)))
    }

    fn create_text(&mut self, text: &str) -> RealNode {
        self.alloc(MemKind::Text(text.to_string()))
    }

    fn create_markup(&mut self, markup: &str) -> RealNode {
        self.alloc(MemKind::Markup(markup.to_string()))
    }

    fn set_text(&mut self, node: RealNode, text: &str) {
        if let Some(n) = self.nodes.get_mut(&node) {
            match &mut n.kind {
                MemKind::Text(t) | MemKind::Markup(t) => {
                    *t = text.to_string();
                    self.stats.text_writes += 1;
                }
                MemKind::Element(_) => {}
            }
        }
    }

    fn apply_props(&mut self, node: RealNode, diff: &PropsDiff) {
        let Some(n) = self.nodes.get_mut(&node) else {
            return;
        };
        for (name, value) in &diff.set {
            n.props.set(name, value.clone());
        }
        for name in &diff.removed {
            n.props.remove(name);
        }
        self.stats.prop_writes += diff.set.len() + diff.removed.len();
    }

    fn read_props(&self, node: RealNode) -> Props {
        self.nodes
            .get(&node)
            .map(|n| n.props.clone())
            .unwrap_or_default()
    }

    fn insert(&mut self, parent: RealNode, node: RealNode, before: Option<RealNode>) {
        if parent == node || !self.nodes.contains_key(&parent) {
            return;
        }
        self.unlink(node);
        let Some(p) = self.nodes.get_mut(&parent) else {
            return;
        };
        let index = before
            .and_then(|b| p.children.iter().position(|&c| c == b))
            .unwrap_or(p.children.len());
        p.children.insert(index, node);
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = Some(parent);
        }
        self.stats.inserted += 1;
    }

    fn detach(&mut self, node: RealNode) {
        if self.parent(node).is_some() {
            self.unlink(node);
            self.stats.detached += 1;
        }
    }

    fn parent(&self, node: RealNode) -> Option<RealNode> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn next_sibling(&self, node: RealNode) -> Option<RealNode> {
        let parent = self.parent(node)?;
        let siblings = &self.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|&c| c == node)?;
        siblings.get(index + 1).copied()
    }

    fn children(&self, node: RealNode) -> Vec<RealNode> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn tag(&self, node: RealNode) -> Option<Rc<str>> {
        match &self.nodes.get(&node)?.kind {
            MemKind::Element(tag) => Some(Rc::clone(tag)),
            _ => None,
        }
    }

    fn text(&self, node: RealNode) -> Option<String> {
        match &self.nodes.get(&node)?.kind {
            MemKind::Text(t) | MemKind::Markup(t) => Some(t.clone()),
            MemKind::Element(_) => None,
        }
    }

    fn clone_node(&mut self, node: RealNode, deep: bool) -> RealNode {
        let Some(source) = self.nodes.get(&node).cloned() else {
            return self.alloc(MemKind::Text(String::new()));
        };
        let copy = self.alloc(source.kind);
        if let Some(n) = self.nodes.get_mut(&copy) {
            n.props = source.props;
        }
        if deep {
            for child in source.children {
                let child_copy = self.clone_node(child, true);
                self.insert(copy, child_copy, None);
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CompareDepth;

    #[test]
    fn insert_moves_attached_nodes() {
        let mut dom = MemoryDom::new();
        let a = dom.create_element("div");
        let b = dom.create_element("div");
        let x = dom.create_text("x");

        dom.insert(a, x, None);
        dom.insert(b, x, None);
        assert!(dom.children(a).is_empty());
        assert_eq!(dom.children(b), vec![x]);
        assert_eq!(dom.parent(x), Some(b));
    }

    #[test]
    fn insert_before_reference() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("ul");
        let one = dom.create_text("1");
        let two = dom.create_text("2");
        let three = dom.create_text("3");
        dom.insert(root, one, None);
        dom.insert(root, three, None);
        dom.insert(root, two, Some(three));

        assert_eq!(dom.inner_markup(root), "123");
        assert_eq!(dom.next_sibling(two), Some(three));
        assert_eq!(dom.next_sibling(three), None);
    }

    #[test]
    fn props_and_markup() {
        let mut dom = MemoryDom::new();
        let p = dom.create_element("p");
        let props = Props::new().with("class", "big").with("id", 3);
        let diff = Props::new().diff(&props, CompareDepth::Shallow);
        dom.apply_props(p, &diff);
        let t = dom.create_text("hi");
        dom.insert(p, t, None);

        assert_eq!(dom.to_markup(p), "<p class=\"big\" id=\"3\">hi</p>");
        assert_eq!(dom.stats().prop_writes, 2);
    }

    #[test]
    fn deep_clone_copies_subtree() {
        let mut dom = MemoryDom::new();
        let p = dom.create_element("p");
        let t = dom.create_text("hi");
        dom.insert(p, t, None);

        let copy = dom.clone_node(p, true);
        assert_ne!(copy, p);
        assert_eq!(dom.to_markup(copy), "<p>hi</p>");
        assert_eq!(dom.children(p), vec![t]);
    }

    #[test]
    fn detach_is_idempotent() {
        let mut dom = MemoryDom::new();
        let root = dom.create_element("div");
        let x = dom.create_text("x");
        dom.insert(root, x, None);
        dom.detach(x);
        dom.detach(x);
        assert_eq!(dom.stats().detached, 1);
    }
}
