//! Boundary update state machine.

use tracing::{debug, warn};

use super::{Engine, LifecycleCall};
use crate::boundary::{Boundary, BoundaryId, BoundaryKind, Component, HookCx, Phase, RenderCx, UpdateModes};
use crate::cycle::DirtySet;
use crate::def::{defs_equal, TargetDef};
use crate::value::{CompareDepth, Props};

/// Comparison depths after resolving every override.
#[derive(Debug, Clone, Copy)]
struct Modes {
    props: CompareDepth,
    state: CompareDepth,
    content: CompareDepth,
}

enum Decision {
    /// Render; carries the previous snapshots unless this is the mount run.
    Render {
        prev: Option<(Props, Props)>,
        content_changed: bool,
    },
    /// No render. Content passes still need the new content if it changed.
    Skip { content_changed: bool },
}

impl Engine {
    /// Run the update of one boundary inline.
    ///
    /// Mount runs always render. Later runs apply queued props/state, fire
    /// `before_update`, and then decide: `force`, then the component's own
    /// `should_update`, then prop/state/content comparison.
    pub(crate) fn update_boundary(&mut self, id: BoundaryId, force: bool, dirty: &mut DirtySet) {
        // A forced mark still pending is served by this run.
        let force = force || dirty.cancel(id).unwrap_or(false);
        let Some(phase) = self.boundaries.get(&id).map(|b| b.phase) else {
            return;
        };
        let mount_run = phase == Phase::Unmounted;

        if !mount_run && self.renders.get(&id).copied().unwrap_or(0) > self.settings.max_re_renders {
            warn!(boundary = id.raw(), "re-render limit reached; deferring to the next cycle");
            self.deferred.push(id);
            return;
        }

        let decision = if mount_run {
            self.call_hook(id, |c, cx| c.pre_mount(cx));
            Decision::Render {
                prev: None,
                content_changed: false,
            }
        } else {
            self.decide(id, force)
        };

        match decision {
            Decision::Skip { content_changed } => {
                debug!(boundary = id.raw(), content_changed, "skipping update");
                if content_changed {
                    self.update_content_passes(id, false, dirty);
                }
            }
            Decision::Render { prev, content_changed } => {
                if let Some((prev_props, prev_state)) = &prev {
                    self.call_hook(id, |c, cx| c.pre_update(prev_props, prev_state, cx));
                }
                let Some(defs) = self.render(id) else {
                    return;
                };
                let Some((node, old)) = self
                    .boundaries
                    .get_mut(&id)
                    .map(|b| (b.node, std::mem::take(&mut b.applied)))
                else {
                    return;
                };
                let level = super::pairing::Level {
                    owner: id,
                    scope: self.render_scope(id),
                };
                let applied = self.pair_level(node, old, defs, level, None, dirty);
                if let Some(b) = self.boundaries.get_mut(&id) {
                    b.applied = applied;
                    b.phase = Phase::Mounted;
                }
                if let Some((prev_props, prev_state)) = prev {
                    self.out.calls.push(LifecycleCall::DidUpdate {
                        boundary: id,
                        prev_props,
                        prev_state,
                    });
                }
                // Passes below a boundary that skipped are not reached by
                // the pairing above.
                if content_changed {
                    self.update_content_passes(id, true, dirty);
                }
            }
        }

        self.run_wires(id, dirty);
    }

    /// Hand new content to the content passes forwarding `id`. With
    /// `only_stale`, passes already holding the current content are left
    /// alone.
    fn update_content_passes(&mut self, id: BoundaryId, only_stale: bool, dirty: &mut DirtySet) {
        let Some(source) = self.boundaries.get(&id) else {
            return;
        };
        let passes: Vec<_> = source
            .content_passes
            .iter()
            .copied()
            .filter(|pass| {
                !only_stale
                    || self
                        .boundaries
                        .get(pass)
                        .is_some_and(|p| !defs_equal(&p.content, &source.content, CompareDepth::Deep))
            })
            .collect();
        for pass in passes {
            self.update_boundary(pass, false, dirty);
        }
    }

    fn modes(&self, b: &Boundary) -> Modes {
        let host = self.settings.update_modes.or(UpdateModes::host_defaults());
        let resolved = match &b.kind {
            BoundaryKind::Source { component, ty } => component
                .update_modes()
                .unwrap_or_default()
                .or(ty.update_modes())
                .or(host),
            _ => host,
        };
        Modes {
            props: resolved.props.unwrap_or(CompareDepth::Shallow),
            state: resolved.state.unwrap_or(CompareDepth::Shallow),
            content: resolved.content.unwrap_or(CompareDepth::Deep),
        }
    }

    /// Content a boundary is supplied with right now.
    fn forwarded_content(&self, b: &Boundary) -> Option<Vec<TargetDef>> {
        match b.kind {
            BoundaryKind::Content { forwards } => Some(
                forwards
                    .and_then(|src| self.boundaries.get(&src))
                    .map(|src| src.content.clone())
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }

    /// Scope content-pass defs in this boundary's output resolve against.
    fn render_scope(&self, id: BoundaryId) -> Option<BoundaryId> {
        let b = self.boundaries.get(&id)?;
        match b.kind {
            BoundaryKind::Source { .. } => Some(id),
            BoundaryKind::Content { forwards } => forwards
                .and_then(|src| self.boundaries.get(&src))
                .and_then(|src| src.content_scope),
            BoundaryKind::Root => None,
        }
    }

    fn decide(&mut self, id: BoundaryId, force: bool) -> Decision {
        let (modes, forwarded) = match self.boundaries.get(&id) {
            Some(b) => (self.modes(b), self.forwarded_content(b)),
            None => return Decision::Skip { content_changed: false },
        };
        let Some(b) = self.boundaries.get_mut(&id) else {
            return Decision::Skip { content_changed: false };
        };
        if let Some(content) = forwarded {
            b.next_content = Some(content);
        }

        b.phase = Phase::Updating;
        let prev_props = b.props.clone();
        let prev_state = b.state.clone();
        if let Some(props) = b.next_props.take() {
            b.props = props;
        }
        if let Some(state) = b.next_state.take() {
            b.state = state;
        }
        let content_changed = match b.next_content.take() {
            Some(content) => {
                let changed = !defs_equal(&b.content, &content, modes.content);
                b.content = content;
                changed
            }
            None => false,
        };

        let Boundary {
            kind, props, state, ..
        } = &mut *b;
        let explicit = match kind {
            BoundaryKind::Source { component, .. } => {
                component.before_update(props, state);
                component.should_update(&prev_props, &prev_state, props, state)
            }
            _ => None,
        };

        let update = force
            || explicit.unwrap_or_else(|| {
                prev_props.changed(props, modes.props)
                    || prev_state.changed(state, modes.state)
                    || content_changed
            });

        if update {
            Decision::Render {
                prev: Some((prev_props, prev_state)),
                content_changed,
            }
        } else {
            b.phase = Phase::Mounted;
            Decision::Skip { content_changed }
        }
    }

    /// Call the render function, re-rendering in place while it asks for it
    /// and the phase budget allows.
    fn render(&mut self, id: BoundaryId) -> Option<Vec<TargetDef>> {
        let max = self.settings.max_re_renders;
        let b = self.boundaries.get_mut(&id)?;
        let Boundary {
            kind,
            props,
            state,
            content,
            updater,
            ..
        } = b;

        match kind {
            BoundaryKind::Source { component, ty } => loop {
                let renders = self.renders.entry(id).or_insert(0);
                *renders += 1;
                let count = *renders;

                let mut cx = RenderCx::new(id, updater, content);
                let output = component.render(props, state, &mut cx);
                let Some(patch) = cx.finish() else {
                    return Some(output.into_defs());
                };
                state.merge(&patch);
                if count > max {
                    warn!(
                        boundary = id.raw(),
                        component = ty.name(),
                        renders = count,
                        "re-render limit reached; deferring to the next cycle"
                    );
                    self.deferred.push(id);
                    return Some(output.into_defs());
                }
            },
            BoundaryKind::Content { .. } | BoundaryKind::Root => {
                *self.renders.entry(id).or_insert(0) += 1;
                Some(content.clone())
            }
        }
    }

    /// Refresh boundaries wired to `id` with its settled props and state.
    fn run_wires(&mut self, id: BoundaryId, dirty: &mut DirtySet) {
        let targets: Vec<_> = self
            .wires
            .iter()
            .filter(|w| w.source == id)
            .map(|w| (w.target, w.map.clone()))
            .collect();
        if targets.is_empty() {
            return;
        }
        let Some((props, state)) = self.boundaries.get(&id).map(|b| (b.props.clone(), b.state.clone())) else {
            return;
        };
        for (target, map) in targets {
            let Some(patch) = map(&props, &state) else {
                continue;
            };
            if let Some(b) = self.boundaries.get_mut(&target) {
                b.pending_state().merge(&patch);
                self.update_boundary(target, false, dirty);
            }
        }
    }

    /// Run a hook of a source boundary's component.
    pub(crate) fn call_hook(&mut self, id: BoundaryId, f: impl FnOnce(&mut dyn Component, &mut HookCx<'_>)) {
        let dom = self
            .boundaries
            .get(&id)
            .and_then(|b| self.tree.get(b.node))
            .and_then(|n| n.dom());
        let Some(Boundary {
            kind: BoundaryKind::Source { component, .. },
            props,
            state,
            updater,
            ..
        }) = self.boundaries.get_mut(&id)
        else {
            return;
        };
        let mut cx = HookCx::new(id, updater, props, state, dom);
        f(component.as_mut(), &mut cx);
    }

    /// Fire a lifecycle call recorded during pairing.
    pub(crate) fn fire(&mut self, call: LifecycleCall) {
        match call {
            LifecycleCall::DidMount(id) => self.call_hook(id, |c, cx| c.did_mount(cx)),
            LifecycleCall::DidMove(id) => self.call_hook(id, |c, cx| c.did_move(cx)),
            LifecycleCall::DidUpdate {
                boundary,
                prev_props,
                prev_state,
            } => self.call_hook(boundary, |c, cx| c.did_update(&prev_props, &prev_state, cx)),
        }
    }
}
