//! Reconciler
//!
//! The [`Engine`] owns the tree skeleton and every boundary of one host. It is
//! the only thing (besides the render applier) that mutates them.
//!
//! # Flow
//!
//! 1. A dirty boundary is handed to [`Engine::update_boundary`].
//! 2. The update decision runs; if the boundary re-renders, the new target
//!    defs are paired against its applied defs.
//! 3. Pairing mounts, reuses, moves and unmounts tree nodes right away and
//!    records what the output tree must do as [`RenderInfo`]s, plus the
//!    lifecycle calls to fire once the output is in place.
//! 4. The host moves that [`ChangeBatch`] into the render cycle.

mod pairing;
mod unmount;
mod update;

use std::collections::HashMap;
use std::rc::Rc;

use crate::boundary::{
    Boundary, BoundaryId, BoundaryKind, Channel, ComponentType, Envelope, Request,
};
use crate::cycle::DirtySet;
use crate::error::HostError;
use crate::render::RenderInfo;
use crate::settings::HostSettings;
use crate::tree::{IdGen, NodeKind, Tree};
use crate::value::Props;

/// Maps a source boundary's settled props and state to a state patch for
/// another boundary. `None` leaves the target alone.
pub type WireFn = Rc<dyn Fn(&Props, &Props) -> Option<Props>>;

pub(crate) struct Wire {
    pub(crate) source: BoundaryId,
    pub(crate) target: BoundaryId,
    pub(crate) map: WireFn,
}

/// A lifecycle notification waiting for the render phase.
#[derive(Debug, Clone)]
pub enum LifecycleCall {
    DidMount(BoundaryId),
    DidMove(BoundaryId),
    DidUpdate {
        boundary: BoundaryId,
        prev_props: Props,
        prev_state: Props,
    },
}

impl LifecycleCall {
    pub fn boundary(&self) -> BoundaryId {
        match self {
            LifecycleCall::DidMount(id) | LifecycleCall::DidMove(id) => *id,
            LifecycleCall::DidUpdate { boundary, .. } => *boundary,
        }
    }
}

/// Render infos and lifecycle calls produced by one boundary update.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub infos: Vec<RenderInfo>,
    pub calls: Vec<LifecycleCall>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty() && self.calls.is_empty()
    }
}

/// Tree skeleton, boundaries and pairing state of one host.
pub(crate) struct Engine {
    pub(crate) ids: IdGen,
    pub(crate) tree: Tree,
    pub(crate) boundaries: HashMap<BoundaryId, Boundary>,
    pub(crate) root: BoundaryId,
    pub(crate) settings: HostSettings,
    channel: Channel,
    wires: Vec<Wire>,

    /// Output of the updates run since the last `take_changes`.
    out: ChangeBatch,
    /// Renders per boundary in the current update phase.
    renders: HashMap<BoundaryId, usize>,
    /// Boundaries that hit the re-render cap; they run again next cycle.
    deferred: Vec<BoundaryId>,
}

impl Engine {
    pub(crate) fn new(settings: HostSettings, channel: Channel) -> Self {
        let ids = IdGen::default();
        let mut tree = Tree::new(&ids);
        let root = BoundaryId::from(ids.next_raw());
        let root_node = tree.root();
        if let Some(node) = tree.get_mut(root_node) {
            node.boundary = Some(root);
        }

        let mut root_boundary =
            Boundary::new(root, BoundaryKind::Root, root_node, Props::new(), channel.clone());
        root_boundary.phase = crate::boundary::Phase::Mounted;

        let mut boundaries = HashMap::new();
        boundaries.insert(root, root_boundary);

        Self {
            ids,
            tree,
            boundaries,
            root,
            settings,
            channel,
            wires: Vec::new(),
            out: ChangeBatch::default(),
            renders: HashMap::new(),
            deferred: Vec::new(),
        }
    }

    /// Tree depth of a boundary's node.
    pub(crate) fn depth_of(&self, id: BoundaryId) -> Option<usize> {
        let node = self.boundaries.get(&id)?.node;
        self.tree.get(node).map(|n| n.depth())
    }

    pub(crate) fn mark(&self, id: BoundaryId, force: bool, dirty: &mut DirtySet) -> Result<(), HostError> {
        let depth = self.depth_of(id).ok_or(HostError::UnknownBoundary(id))?;
        dirty.mark(id, depth, force);
        Ok(())
    }

    /// Fold a mailbox request into the target boundary and mark it dirty.
    pub(crate) fn accept(&mut self, envelope: Envelope, dirty: &mut DirtySet) -> Result<(), HostError> {
        let id = envelope.target;
        let Some(b) = self.boundaries.get_mut(&id) else {
            tracing::warn!(boundary = id.raw(), "update requested for unknown boundary");
            return Err(HostError::UnknownBoundary(id));
        };
        let force = match envelope.request {
            Request::Patch(patch) => {
                b.pending_state().merge(&patch);
                false
            }
            Request::Replace(state) => {
                b.next_state = Some(state);
                false
            }
            Request::Update { force } => force,
        };
        self.mark(id, force, dirty)
    }

    /// Give the root boundary new content.
    pub(crate) fn set_root_content(&mut self, content: Vec<crate::def::TargetDef>) {
        if let Some(root) = self.boundaries.get_mut(&self.root) {
            root.next_content = Some(content);
        }
    }

    /// Mark the root dirty; with `force`, every source boundary too.
    pub(crate) fn refresh_all(&self, force: bool, dirty: &mut DirtySet) {
        dirty.mark(self.root, 0, force);
        if force {
            for (&id, b) in &self.boundaries {
                if b.is_source() {
                    if let Some(depth) = self.depth_of(id) {
                        dirty.mark(id, depth, true);
                    }
                }
            }
        }
    }

    pub(crate) fn add_wire(&mut self, source: BoundaryId, target: BoundaryId, map: WireFn) -> Result<(), HostError> {
        for id in [source, target] {
            if !self.boundaries.contains_key(&id) {
                return Err(HostError::UnknownBoundary(id));
            }
        }
        self.wires.push(Wire { source, target, map });
        Ok(())
    }

    /// Reset the per-phase render budget.
    pub(crate) fn begin_phase(&mut self) {
        self.renders.clear();
    }

    pub(crate) fn take_changes(&mut self) -> ChangeBatch {
        std::mem::take(&mut self.out)
    }

    pub(crate) fn take_deferred(&mut self) -> Vec<BoundaryId> {
        std::mem::take(&mut self.deferred)
    }

    pub(crate) fn boundaries_of(&self, ty: &ComponentType) -> Vec<BoundaryId> {
        let mut ids: Vec<_> = self
            .boundaries
            .values()
            .filter(|b| b.component_type() == Some(ty))
            .map(|b| b.id)
            .collect();
        ids.sort_by_key(|&id| self.boundaries.get(&id).map(|b| self.tree.path(b.node)));
        ids
    }

    /// Forget every output node without touching the output tree.
    pub(crate) fn forget_output(&mut self) {
        for id in self.tree.descendants(self.tree.root()) {
            if let Some(node) = self.tree.get_mut(id) {
                if node.kind != NodeKind::Portal {
                    node.dom = None;
                }
                node.data.applied_props = None;
                node.data.applied_content = None;
                node.data.applied_external = None;
                for r in &node.data.attachments.refs {
                    r.set(None);
                }
            }
        }
    }
}
