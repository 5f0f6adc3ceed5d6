//! Definitions
//!
//! A *target def* describes what should exist at one position of the output:
//! an element, a piece of text, a component boundary, and so on. Components
//! produce fresh target defs on every render. An *applied def* is the
//! persisted counterpart the pairing engine keeps between renders; it records
//! what happened to the position in the latest pairing and which tree node
//! realizes it.
//!
//! # Key scopes
//!
//! Siblings are matched against the previous render by *group*: unkeyed defs
//! group by their kind and tag, keyed defs by their key. Fragments may either
//! share their parent's key space (`KeyScope::Wide`, so keyed items can move
//! between sibling fragments) or isolate it (`KeyScope::Isolated`, the default
//! for nested arrays).

mod applied;
mod target;

pub use applied::{AppliedDef, DefAction};
pub use target::{RenderOutput, TargetDef};

pub(crate) use target::defs_equal;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::boundary::ComponentType;
use crate::render::RealNode;

/// Explicit identity of a def among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i64::from(i))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Int(i as i64)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(Rc::from(s))
    }
}

/// Whether a fragment shares its parent's key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyScope {
    #[default]
    Wide,
    Isolated,
    /// Produced from a nested array: isolated unless the host disables
    /// `isolate_arrays`.
    Array,
}

/// Text-like content.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDef {
    pub text: Rc<str>,
    /// Raw markup rather than plain text; switching requires a new node.
    pub raw: bool,
}

/// The discriminant of a def, with its tag identity.
#[derive(Clone)]
pub enum DefKind {
    /// A real output element with a tag.
    Element(Rc<str>),
    /// Plain text or raw markup.
    Content(ContentDef),
    /// A component boundary.
    Boundary(ComponentType),
    /// A pre-existing output node passed through as-is.
    External(RealNode),
    /// Children are rendered into another output container.
    Portal(RealNode),
    /// Children are inlined into the parent.
    Fragment(KeyScope),
    /// Forwards the content supplied to the enclosing boundary.
    ContentPass,
    /// An isolated sub-host: fresh key space and content-pass chain.
    Nested,
}

impl DefKind {
    pub(crate) fn signature(&self) -> Signature {
        match self {
            DefKind::Element(tag) => Signature::Element(Rc::clone(tag)),
            DefKind::Content(_) => Signature::Content,
            DefKind::Boundary(ty) => Signature::Boundary(ty.identity()),
            DefKind::External(_) => Signature::External,
            DefKind::Portal(container) => Signature::Portal(*container),
            DefKind::Fragment(_) => Signature::Fragment,
            DefKind::ContentPass => Signature::ContentPass,
            DefKind::Nested => Signature::Nested,
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, DefKind::Boundary(_))
    }
}

impl fmt::Debug for DefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefKind::Element(tag) => write!(f, "Element({tag})"),
            DefKind::Content(c) if c.raw => write!(f, "Markup({:?})", c.text),
            DefKind::Content(c) => write!(f, "Text({:?})", c.text),
            DefKind::Boundary(ty) => write!(f, "Boundary({})", ty.name()),
            DefKind::External(node) => write!(f, "External({node:?})"),
            DefKind::Portal(node) => write!(f, "Portal({node:?})"),
            DefKind::Fragment(scope) => write!(f, "Fragment({scope:?})"),
            DefKind::ContentPass => write!(f, "ContentPass"),
            DefKind::Nested => write!(f, "Nested"),
        }
    }
}

/// Grouping identity: discriminant plus tag identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Signature {
    Element(Rc<str>),
    Content,
    Boundary(usize),
    External,
    Portal(RealNode),
    Fragment,
    ContentPass,
    Nested,
}

/// Shared slot that tracks the output node realizing a def.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<Cell<Option<RealNode>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<RealNode> {
        self.0.get()
    }

    pub(crate) fn set(&self, node: Option<RealNode>) {
        self.0.set(node);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.get()).finish()
    }
}

/// Called before an output node is removed. Returning `true` salvages the
/// node: it is forgotten by the engine but left in place (exit animations).
#[derive(Clone)]
pub struct RemoveHook(pub(crate) Rc<dyn Fn(RealNode) -> bool>);

impl RemoveHook {
    pub fn new(hook: impl Fn(RealNode) -> bool + 'static) -> Self {
        Self(Rc::new(hook))
    }

    pub(crate) fn call(&self, node: RealNode) -> bool {
        (self.0)(node)
    }
}

impl fmt::Debug for RemoveHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RemoveHook")
    }
}

/// Optional extras carried by output-node defs.
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    pub refs: Vec<NodeRef>,
    pub on_remove: Option<RemoveHook>,
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty() && self.on_remove.is_none()
    }
}
