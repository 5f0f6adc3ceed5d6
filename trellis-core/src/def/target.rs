//! Target defs and render output normalization.

use std::rc::Rc;

use super::{Attachments, ContentDef, DefKind, Key, KeyScope, NodeRef, RemoveHook};
use crate::boundary::ComponentType;
use crate::render::RealNode;
use crate::value::{CompareDepth, Props, Value};

/// What should exist at one position of the output.
///
/// # Example
///
/// ```rust,ignore
/// let list = TargetDef::element("ul").children(
///     items.iter().map(|item| TargetDef::element("li").key(item.id).child(item.label.as_str())),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct TargetDef {
    pub(crate) kind: DefKind,
    pub(crate) key: Option<Key>,
    pub(crate) props: Props,
    pub(crate) children: Vec<TargetDef>,
    pub(crate) attachments: Attachments,
}

impl TargetDef {
    fn new(kind: DefKind) -> Self {
        Self {
            kind,
            key: None,
            props: Props::new(),
            children: Vec::new(),
            attachments: Attachments::default(),
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::new(DefKind::Element(Rc::from(tag)))
    }

    pub fn text(text: impl AsRef<str>) -> Self {
        Self::new(DefKind::Content(ContentDef {
            text: Rc::from(text.as_ref()),
            raw: false,
        }))
    }

    pub fn markup(markup: impl AsRef<str>) -> Self {
        Self::new(DefKind::Content(ContentDef {
            text: Rc::from(markup.as_ref()),
            raw: true,
        }))
    }

    pub fn component(ty: &ComponentType) -> Self {
        Self::new(DefKind::Boundary(ty.clone()))
    }

    pub fn external(node: RealNode) -> Self {
        Self::new(DefKind::External(node))
    }

    pub fn portal(container: RealNode) -> Self {
        Self::new(DefKind::Portal(container))
    }

    /// A fragment sharing its parent's key space.
    pub fn fragment() -> Self {
        Self::new(DefKind::Fragment(KeyScope::Wide))
    }

    /// A fragment with its own key space.
    pub fn isolated_fragment() -> Self {
        Self::new(DefKind::Fragment(KeyScope::Isolated))
    }

    /// Placeholder for the content supplied to the rendering boundary.
    pub fn content_pass() -> Self {
        Self::new(DefKind::ContentPass)
    }

    pub fn nested() -> Self {
        Self::new(DefKind::Nested)
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.set(name, value);
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Append one child. Arrays become array-scoped fragments.
    pub fn child(mut self, child: impl Into<RenderOutput>) -> Self {
        flatten_into(vec![child.into()], &mut self.children);
        self
    }

    /// Append several children; each item is one child position.
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<RenderOutput>,
    {
        let items = children.into_iter().map(Into::into).collect();
        flatten_into(items, &mut self.children);
        self
    }

    pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
        self.attachments.refs.push(node_ref.clone());
        self
    }

    pub fn on_remove(mut self, hook: RemoveHook) -> Self {
        self.attachments.on_remove = Some(hook);
        self
    }

    pub fn kind(&self) -> &DefKind {
        &self.kind
    }

    pub fn key_ref(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props_ref(&self) -> &Props {
        &self.props
    }

    pub fn child_defs(&self) -> &[TargetDef] {
        &self.children
    }

    /// Structurally invalid defs render nothing.
    pub(crate) fn is_valid(&self) -> bool {
        match &self.kind {
            DefKind::Element(tag) => !tag.is_empty(),
            _ => true,
        }
    }
}

/// Whether two def lists describe the same output at the given prop depth.
pub(crate) fn defs_equal(a: &[TargetDef], b: &[TargetDef], depth: CompareDepth) -> bool {
    match depth {
        CompareDepth::Never => return true,
        CompareDepth::Always => return false,
        _ => {}
    }
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.kind.signature() == y.kind.signature()
                && x.key == y.key
                && kind_payload_equal(&x.kind, &y.kind)
                && !x.props.changed(&y.props, depth)
                && defs_equal(&x.children, &y.children, depth)
        })
}

fn kind_payload_equal(a: &DefKind, b: &DefKind) -> bool {
    match (a, b) {
        (DefKind::Content(x), DefKind::Content(y)) => x == y,
        (DefKind::External(x), DefKind::External(y)) => x == y,
        (DefKind::Fragment(x), DefKind::Fragment(y)) => x == y,
        _ => true,
    }
}

/// Anything a component render may return.
#[derive(Debug, Clone, Default)]
pub enum RenderOutput {
    #[default]
    None,
    /// A primitive; adjacent primitives merge into one text def.
    Text(String),
    /// An existing output node, adopted as-is.
    Node(RealNode),
    Def(TargetDef),
    List(Vec<RenderOutput>),
}

impl RenderOutput {
    /// Normalize into a flat list of defs for one child position list.
    pub fn into_defs(self) -> Vec<TargetDef> {
        let mut out = Vec::new();
        match self {
            RenderOutput::List(items) => flatten_into(items, &mut out),
            other => flatten_into(vec![other], &mut out),
        }
        out
    }
}

fn flatten_into(items: Vec<RenderOutput>, out: &mut Vec<TargetDef>) {
    let mut text: Option<String> = None;
    for item in items {
        if let RenderOutput::Text(s) = item {
            text.get_or_insert_with(String::new).push_str(&s);
            continue;
        }
        if let Some(t) = text.take() {
            out.push(TargetDef::text(t));
        }
        match item {
            RenderOutput::None | RenderOutput::Text(_) => {}
            RenderOutput::Node(node) => out.push(TargetDef::external(node)),
            RenderOutput::Def(def) if def.is_valid() => out.push(def),
            RenderOutput::Def(def) => {
                tracing::debug!(kind = ?def.kind, "dropping structurally invalid def");
            }
            RenderOutput::List(inner) => {
                let mut fragment = TargetDef::new(DefKind::Fragment(KeyScope::Array));
                flatten_into(inner, &mut fragment.children);
                out.push(fragment);
            }
        }
    }
    if let Some(t) = text {
        out.push(TargetDef::text(t));
    }
}

impl From<()> for RenderOutput {
    fn from(_: ()) -> Self {
        RenderOutput::None
    }
}

impl From<&str> for RenderOutput {
    fn from(s: &str) -> Self {
        RenderOutput::Text(s.to_string())
    }
}

impl From<String> for RenderOutput {
    fn from(s: String) -> Self {
        RenderOutput::Text(s)
    }
}

impl From<&String> for RenderOutput {
    fn from(s: &String) -> Self {
        RenderOutput::Text(s.clone())
    }
}

impl From<i64> for RenderOutput {
    fn from(i: i64) -> Self {
        RenderOutput::Text(i.to_string())
    }
}

impl From<i32> for RenderOutput {
    fn from(i: i32) -> Self {
        RenderOutput::Text(i.to_string())
    }
}

impl From<RealNode> for RenderOutput {
    fn from(node: RealNode) -> Self {
        RenderOutput::Node(node)
    }
}

impl From<TargetDef> for RenderOutput {
    fn from(def: TargetDef) -> Self {
        RenderOutput::Def(def)
    }
}

impl<T: Into<RenderOutput>> From<Vec<T>> for RenderOutput {
    fn from(items: Vec<T>) -> Self {
        RenderOutput::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RenderOutput>> From<Option<T>> for RenderOutput {
    fn from(item: Option<T>) -> Self {
        item.map(Into::into).unwrap_or_default()
    }
}
