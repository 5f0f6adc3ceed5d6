//! Applied defs: what the latest pairing realized.

use super::{DefKind, Key, TargetDef};
use crate::tree::NodeId;
use crate::value::Props;

/// What happened to an applied def in the most recent pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefAction {
    Mounted,
    Moved,
    Updated,
}

/// The persisted counterpart of a [`TargetDef`].
///
/// Applied defs of output elements own their applied children. Boundary and
/// content-pass defs are leaves here: their subtree belongs to the boundary
/// they host.
#[derive(Debug, Clone)]
pub struct AppliedDef {
    pub(crate) kind: DefKind,
    pub(crate) key: Option<Key>,
    pub(crate) props: Props,
    pub(crate) action: DefAction,
    pub(crate) node: NodeId,
    pub(crate) children: Vec<AppliedDef>,
}

impl AppliedDef {
    /// Initial applied form of a freshly mounted target def.
    ///
    /// Children are filled in by the pairing engine as it mounts them.
    pub fn from_target(def: &TargetDef, node: NodeId) -> Self {
        Self {
            kind: def.kind.clone(),
            key: def.key.clone(),
            props: def.props.clone(),
            action: DefAction::Mounted,
            node,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &DefKind {
        &self.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn action(&self) -> DefAction {
        self.action
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn children(&self) -> &[AppliedDef] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::IdGen;

    #[test]
    fn from_target_starts_mounted_without_children() {
        let ids = IdGen::default();
        let def = TargetDef::element("li").key(3).prop("class", "row").child("x");
        let applied = AppliedDef::from_target(&def, ids.node());

        assert_eq!(applied.action(), DefAction::Mounted);
        assert_eq!(applied.key(), Some(&Key::Int(3)));
        assert!(applied.children().is_empty());
        assert!(applied.props().contains("class"));
    }
}
