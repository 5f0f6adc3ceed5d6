//! Contexts handed to components.
//!
//! A [`RenderCx`] lives for exactly one call of `Component::render`. State set
//! through it folds into an immediate in-place re-render instead of a new
//! cycle. A [`HookCx`] is handed to lifecycle hooks; requests made through its
//! updater are queued until the running phase finishes with the boundary.

use super::updater::Updater;
use super::BoundaryId;
use crate::def::TargetDef;
use crate::render::RealNode;
use crate::value::Props;

/// Context for one render call.
pub struct RenderCx<'a> {
    id: BoundaryId,
    updater: &'a Updater,
    content: &'a [TargetDef],
    patch: Option<Props>,
    rerender: bool,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(id: BoundaryId, updater: &'a Updater, content: &'a [TargetDef]) -> Self {
        Self {
            id,
            updater,
            content,
            patch: None,
            rerender: false,
        }
    }

    pub fn id(&self) -> BoundaryId {
        self.id
    }

    /// Handle for requests made later, outside this render.
    pub fn updater(&self) -> &Updater {
        self.updater
    }

    /// Content supplied by the parent's def.
    pub fn content(&self) -> &[TargetDef] {
        self.content
    }

    /// Merge a state patch and render again right away.
    pub fn set_state(&mut self, patch: Props) {
        self.patch.get_or_insert_with(Props::new).merge(&patch);
        self.rerender = true;
    }

    pub fn request_rerender(&mut self) {
        self.rerender = true;
    }

    /// The pending patch if another render was requested.
    pub(crate) fn finish(self) -> Option<Props> {
        self.rerender.then(|| self.patch.unwrap_or_default())
    }
}

/// Context for lifecycle hooks.
pub struct HookCx<'a> {
    id: BoundaryId,
    updater: &'a Updater,
    props: &'a Props,
    state: &'a Props,
    dom: Option<RealNode>,
}

impl<'a> HookCx<'a> {
    pub(crate) fn new(
        id: BoundaryId,
        updater: &'a Updater,
        props: &'a Props,
        state: &'a Props,
        dom: Option<RealNode>,
    ) -> Self {
        Self {
            id,
            updater,
            props,
            state,
            dom,
        }
    }

    pub fn id(&self) -> BoundaryId {
        self.id
    }

    pub fn updater(&self) -> &Updater {
        self.updater
    }

    pub fn props(&self) -> &Props {
        self.props
    }

    pub fn state(&self) -> &Props {
        self.state
    }

    /// First output node of the boundary's subtree, once rendered.
    pub fn dom(&self) -> Option<RealNode> {
        self.dom
    }
}
