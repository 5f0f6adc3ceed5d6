//! Boundaries
//!
//! A boundary owns one subtree of the tree skeleton and can be asked to
//! re-render it. There are three flavors:
//!
//! - **Source** boundaries wrap a state-bearing [`Component`].
//! - **Content** boundaries sit at a content-pass position and forward the
//!   content supplied to an ancestor source boundary.
//! - The **root** boundary renders whatever the host was last given.
//!
//! Each boundary goes `Unmounted -> Mounted <-> Updating`. The first update is
//! the *mount run*: it always renders and has no previous snapshots.

mod component;
mod context;
mod updater;

pub use component::{Component, ComponentType, UpdateModes};
pub use context::{HookCx, RenderCx};
pub use updater::Updater;

pub(crate) use updater::{Channel, Envelope, Request, Trigger};

use crate::def::{AppliedDef, TargetDef};
use crate::tree::NodeId;
use crate::value::Props;

/// Unique identifier for a boundary within one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundaryId(u64);

impl BoundaryId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BoundaryId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Lifecycle position of a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unmounted,
    Mounted,
    Updating,
}

pub(crate) enum BoundaryKind {
    Source {
        component: Box<dyn Component>,
        ty: ComponentType,
    },
    Content {
        /// The boundary whose content is shown here.
        forwards: Option<BoundaryId>,
    },
    Root,
}

/// One boundary and its bookkeeping.
pub(crate) struct Boundary {
    pub(crate) id: BoundaryId,
    pub(crate) kind: BoundaryKind,
    /// The tree node hosting the boundary's subtree.
    pub(crate) node: NodeId,
    pub(crate) phase: Phase,

    pub(crate) props: Props,
    pub(crate) state: Props,
    pub(crate) next_props: Option<Props>,
    pub(crate) next_state: Option<Props>,

    /// Content supplied by the def that created the boundary (or, for a
    /// content boundary, the content it last forwarded).
    pub(crate) content: Vec<TargetDef>,
    pub(crate) next_content: Option<Vec<TargetDef>>,
    /// Scope that content-pass defs inside `content` resolve against.
    pub(crate) content_scope: Option<BoundaryId>,
    /// Content boundaries forwarding this boundary's content.
    pub(crate) content_passes: Vec<BoundaryId>,

    /// What the last render realized.
    pub(crate) applied: Vec<AppliedDef>,
    pub(crate) updater: Updater,
}

impl Boundary {
    pub(crate) fn new(
        id: BoundaryId,
        kind: BoundaryKind,
        node: NodeId,
        props: Props,
        channel: Channel,
    ) -> Self {
        let state = match &kind {
            BoundaryKind::Source { component, .. } => component.initial_state(&props),
            _ => Props::new(),
        };
        Self {
            id,
            kind,
            node,
            phase: Phase::Unmounted,
            props,
            state,
            next_props: None,
            next_state: None,
            content: Vec::new(),
            next_content: None,
            content_scope: None,
            content_passes: Vec::new(),
            applied: Vec::new(),
            updater: Updater::new(id, channel),
        }
    }

    pub(crate) fn component_type(&self) -> Option<&ComponentType> {
        match &self.kind {
            BoundaryKind::Source { ty, .. } => Some(ty),
            _ => None,
        }
    }

    pub(crate) fn is_source(&self) -> bool {
        matches!(self.kind, BoundaryKind::Source { .. })
    }

    /// The state as it will be seen by the next update.
    pub(crate) fn pending_state(&mut self) -> &mut Props {
        let state = &self.state;
        self.next_state.get_or_insert_with(|| state.clone())
    }
}
