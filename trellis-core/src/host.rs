//! Host
//!
//! A [`Host`] ties one engine, one render applier and the two refresh
//! cycles together, and is the public face of the crate. It is a cheap,
//! cloneable handle; clones drive the same host.
//!
//! # Driving
//!
//! Phases armed as immediate run inline with the call that armed them.
//! Deferred phases run when the host is ticked: either by hand with
//! [`Host::tick`] and [`Host::next_deadline`], or by awaiting
//! [`Host::run_until_idle`], which sleeps on `tokio::time` between deadlines.
//!
//! # Borrowing
//!
//! Calls that reach the host while it is running a phase (a hook holding a
//! cloned handle, say) get [`HostError::Busy`]. Hooks should go through their
//! [`Updater`] instead; its requests are folded into the running phase.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace, trace_span};

use crate::boundary::{BoundaryId, Channel, ComponentType, Trigger, Updater};
use crate::cycle::{Clock, DirtySet, RefreshCycle, RefreshHandle, RenderQueue, Timeout, TokioClock};
use crate::def::RenderOutput;
use crate::engine::{Engine, LifecycleCall};
use crate::error::HostError;
use crate::render::{
    Applier, ApplyReport, MemoryDom, OutputBackend, ReassimilateOptions, RealNode, RenderInfo,
};
use crate::settings::{HostSettings, LifecycleTiming};
use crate::tree::Tree;
use crate::value::Props;

/// Handle to a reconciliation host rendering into backend `B`.
pub struct Host<B: OutputBackend + 'static = MemoryDom> {
    inner: Rc<RefCell<HostInner<B>>>,
    clock: Rc<dyn Clock>,
    root: BoundaryId,
}

impl<B: OutputBackend + 'static> Clone for Host<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            clock: Rc::clone(&self.clock),
            root: self.root,
        }
    }
}

struct HostInner<B> {
    engine: Engine,
    applier: Applier<B>,
    updates: RefreshCycle<DirtySet>,
    renders: RefreshCycle<RenderQueue>,
    channel: Channel,
    clock: Rc<dyn Clock>,
    last_report: ApplyReport,
}

impl<B: OutputBackend + 'static> Trigger for RefCell<HostInner<B>> {
    fn poke(&self) {
        // A running phase drains the mailbox itself.
        if let Ok(mut inner) = self.try_borrow_mut() {
            inner.settle();
        }
    }
}

impl Host<MemoryDom> {
    /// A host rendering into a fresh [`MemoryDom`], timed by `tokio::time`.
    pub fn new(settings: HostSettings) -> Result<Self, HostError> {
        Self::with_clock(settings, TokioClock::new())
    }

    /// A host rendering into a fresh [`MemoryDom`].
    pub fn with_clock(settings: HostSettings, clock: impl Clock + 'static) -> Result<Self, HostError> {
        let mut dom = MemoryDom::new();
        let container = dom.create_element("root");
        Self::with_backend(dom, container, settings, clock)
    }

    /// Markup rendered into the container.
    pub fn markup(&self) -> Result<String, HostError> {
        let inner = self.borrow()?;
        Ok(inner.applier.backend().inner_markup(inner.applier.container()))
    }
}

impl<B: OutputBackend + 'static> Host<B> {
    pub fn with_backend(
        backend: B,
        container: RealNode,
        settings: HostSettings,
        clock: impl Clock + 'static,
    ) -> Result<Self, HostError> {
        settings.validate()?;
        let clock: Rc<dyn Clock> = Rc::new(clock);
        let inner = Rc::new_cyclic(|weak: &Weak<RefCell<HostInner<B>>>| {
            let trigger: Weak<dyn Trigger> = weak.clone();
            let channel = Channel::new(trigger);
            let applier = Applier::new(backend, container, settings.duplicate_nodes, settings.dom_compare);
            let updates = RefreshCycle::new("update", settings.update_timeout);
            let renders = RefreshCycle::new("render", settings.render_timeout);
            RefCell::new(HostInner {
                engine: Engine::new(settings, channel.clone()),
                applier,
                updates,
                renders,
                channel,
                clock: Rc::clone(&clock),
                last_report: ApplyReport::default(),
            })
        });
        let root = inner.borrow().engine.root;
        Ok(Self { inner, clock, root })
    }

    fn borrow(&self) -> Result<std::cell::RefMut<'_, HostInner<B>>, HostError> {
        self.inner.try_borrow_mut().map_err(|_| HostError::Busy)
    }

    // ------------------------------------------------------------------------
    // Content and refreshes
    // ------------------------------------------------------------------------

    /// Replace the root content. Renders on the host's update schedule.
    pub fn update_root(&self, content: impl Into<RenderOutput>) -> Result<(), HostError> {
        self.update_root_with(content, Timeout::Keep)
    }

    pub fn update_root_with(&self, content: impl Into<RenderOutput>, timeout: Timeout) -> Result<(), HostError> {
        let mut inner = self.borrow()?;
        inner.engine.set_root_content(content.into().into_defs());
        inner.request(self.root, false, timeout)?;
        inner.settle();
        Ok(())
    }

    /// Re-render from the root. With `force`, every source boundary renders
    /// regardless of its update decision.
    pub fn refresh_root(&self, force: bool, timeout: Timeout) -> Result<(), HostError> {
        let mut inner = self.borrow()?;
        let HostInner { engine, updates, .. } = &mut *inner;
        engine.refresh_all(force, updates.pending_mut());
        let now = inner.clock.now_ms();
        inner.updates.arm(timeout, now);
        inner.settle();
        Ok(())
    }

    /// Merge a state patch into a boundary.
    pub fn set_state(&self, id: BoundaryId, patch: Props, timeout: Timeout) -> Result<(), HostError> {
        self.updater(id)?.set_state_with(patch, timeout);
        Ok(())
    }

    pub fn updater(&self, id: BoundaryId) -> Result<Updater, HostError> {
        let inner = self.borrow()?;
        inner
            .engine
            .boundaries
            .get(&id)
            .map(|b| b.updater.clone())
            .ok_or(HostError::UnknownBoundary(id))
    }

    /// After `source` updates, feed its settled props and state through `map`
    /// and merge the result into `target`'s state.
    pub fn wire(
        &self,
        source: BoundaryId,
        target: BoundaryId,
        map: impl Fn(&Props, &Props) -> Option<Props> + 'static,
    ) -> Result<(), HostError> {
        self.borrow()?.engine.add_wire(source, target, Rc::new(map))
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Stop touching the output. Removals are kept for [`Host::resume`].
    pub fn pause(&self) -> Result<(), HostError> {
        self.borrow()?.applier.pause();
        Ok(())
    }

    /// Apply what was held back while paused and bring the output in line
    /// with the tree.
    pub fn resume(&self, remove_unused: bool) -> Result<ApplyReport, HostError> {
        let mut inner = self.borrow()?;
        let HostInner { engine, applier, .. } = &mut *inner;
        let report = applier.resume(&mut engine.tree, remove_unused);
        debug!(?report, "resumed output");
        inner.last_report = report.clone();
        Ok(report)
    }

    /// Take over the output below `container` for the current tree.
    pub fn reassimilate(&self, container: RealNode, options: ReassimilateOptions) -> Result<ApplyReport, HostError> {
        let mut inner = self.borrow()?;
        inner.flush();
        inner.engine.forget_output();
        let report = inner.adopt(container, &options);
        inner.settle();
        Ok(report)
    }

    /// Render `content` on top of the existing output below `container`,
    /// adopting whatever matches.
    pub fn remount_with(
        &self,
        content: impl Into<RenderOutput>,
        container: RealNode,
        options: ReassimilateOptions,
    ) -> Result<ApplyReport, HostError> {
        let mut inner = self.borrow()?;
        inner.flush();
        inner.applier.pause();
        inner.engine.forget_output();
        inner.engine.set_root_content(content.into().into_defs());
        inner.request(self.root, false, Timeout::Keep)?;
        inner.run_update_phase();

        let queue = inner.renders.take_pending();
        let mut calls = Vec::new();
        {
            let HostInner { engine, applier, .. } = &mut *inner;
            for batch in queue.batches {
                applier.apply(&mut engine.tree, batch.infos);
                calls.extend(batch.calls);
            }
            applier.discard_retained(&mut engine.tree);
        }
        inner.renders.disarm();
        let report = inner.adopt(container, &options);
        for call in calls {
            inner.engine.fire(call);
        }
        inner.renders.resolve();
        inner.settle();
        Ok(report)
    }

    /// Resolves after the next update phase, or after the render phase that
    /// follows it with `render_side`. Resolves right away when idle.
    pub fn after_refresh(&self, render_side: bool) -> Result<RefreshHandle, HostError> {
        let mut inner = self.borrow()?;
        let updating = inner.updates.is_busy();
        let handle = if render_side {
            if updating || inner.renders.is_busy() {
                inner.renders.waiter()
            } else {
                RefreshHandle::ready()
            }
        } else if updating {
            inner.updates.waiter()
        } else {
            RefreshHandle::ready()
        };
        Ok(handle)
    }

    // ------------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------------

    /// Run every phase that is due. Each phase runs at most once, so work a
    /// phase defers waits for the next tick.
    pub fn tick(&self) -> Result<(), HostError> {
        let mut inner = self.borrow()?;
        inner.drain_mailbox();
        if inner.updates.is_due(inner.clock.now_ms()) {
            inner.run_update_phase();
        }
        if inner.renders.is_due(inner.clock.now_ms()) {
            inner.run_render_phase();
        }
        inner.settle();
        Ok(())
    }

    /// Clock time of the earliest armed phase.
    pub fn next_deadline(&self) -> Result<Option<u64>, HostError> {
        let inner = self.borrow()?;
        Ok([inner.updates.deadline(), inner.renders.deadline()]
            .into_iter()
            .flatten()
            .min())
    }

    /// Tick the host at every deadline until nothing is armed.
    pub async fn run_until_idle(&self) -> Result<(), HostError> {
        while let Some(deadline) = self.next_deadline()? {
            let now = self.clock.now_ms();
            if deadline > now {
                tokio::time::sleep(Duration::from_millis(deadline - now)).await;
                self.clock.skip_to(deadline);
            }
            self.tick()?;
        }
        Ok(())
    }

    /// Unmount everything and reject pending refreshes.
    pub fn destroy(&self) -> Result<(), HostError> {
        let mut inner = self.borrow()?;
        inner.updates.cancel();
        inner.renders.cancel();
        inner.channel.mailbox.borrow_mut().take();

        inner.engine.set_root_content(Vec::new());
        inner.request(self.root, true, Timeout::Keep)?;
        inner.run_update_phase();
        inner.run_render_phase();
        inner.updates.cancel();
        inner.renders.cancel();
        debug!("host destroyed");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Record every render info applied from now on (or stop recording).
    pub fn record_render_infos(&self, on: bool) -> Result<(), HostError> {
        self.borrow()?.applier.record(on);
        Ok(())
    }

    pub fn take_render_log(&self) -> Result<Vec<RenderInfo>, HostError> {
        Ok(self.borrow()?.applier.take_log())
    }

    /// Counts of the latest render phase.
    pub fn last_report(&self) -> Result<ApplyReport, HostError> {
        Ok(self.borrow()?.last_report.clone())
    }

    pub fn root_boundary(&self) -> BoundaryId {
        self.root
    }

    /// Live boundaries of a component type, in tree order.
    pub fn boundaries_of(&self, ty: &ComponentType) -> Result<Vec<BoundaryId>, HostError> {
        Ok(self.borrow()?.engine.boundaries_of(ty))
    }

    pub fn state_of(&self, id: BoundaryId) -> Result<Props, HostError> {
        let inner = self.borrow()?;
        inner
            .engine
            .boundaries
            .get(&id)
            .map(|b| b.state.clone())
            .ok_or(HostError::UnknownBoundary(id))
    }

    pub fn props_of(&self, id: BoundaryId) -> Result<Props, HostError> {
        let inner = self.borrow()?;
        inner
            .engine
            .boundaries
            .get(&id)
            .map(|b| b.props.clone())
            .ok_or(HostError::UnknownBoundary(id))
    }

    pub fn container(&self) -> Result<RealNode, HostError> {
        Ok(self.borrow()?.applier.container())
    }

    /// Run `f` against the output backend.
    pub fn backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R, HostError> {
        Ok(f(self.borrow()?.applier.backend_mut()))
    }

    /// Run `f` against the tree skeleton.
    pub fn tree<R>(&self, f: impl FnOnce(&Tree) -> R) -> Result<R, HostError> {
        Ok(f(&self.borrow()?.engine.tree))
    }
}

impl<B: OutputBackend> HostInner<B> {
    fn request(&mut self, id: BoundaryId, force: bool, timeout: Timeout) -> Result<(), HostError> {
        self.engine.mark(id, force, self.updates.pending_mut())?;
        if !self.updates.is_running() {
            self.updates.arm(timeout, self.clock.now_ms());
        }
        Ok(())
    }

    /// Fold queued updater requests into the update cycle.
    fn drain_mailbox(&mut self) {
        let envelopes = self.channel.mailbox.borrow_mut().take();
        let now = self.clock.now_ms();
        for envelope in envelopes {
            let timeout = envelope.timeout;
            // Unknown targets are logged by the engine.
            if self.engine.accept(envelope, self.updates.pending_mut()).is_ok() && !self.updates.is_running() {
                self.updates.arm(timeout, now);
            }
        }
    }

    /// Drain the mailbox and run whatever is armed as immediate.
    fn settle(&mut self) {
        loop {
            self.drain_mailbox();
            if self.updates.is_immediate() {
                self.run_update_phase();
            } else if self.renders.is_immediate() {
                self.run_render_phase();
            } else {
                break;
            }
        }
    }

    /// Run both phases now if they are armed at all.
    fn flush(&mut self) {
        self.drain_mailbox();
        if self.updates.is_armed() {
            self.run_update_phase();
        }
        if self.renders.is_armed() {
            self.run_render_phase();
        }
    }

    fn run_update_phase(&mut self) {
        let _span = trace_span!("update_phase").entered();
        self.updates.begin();
        self.engine.begin_phase();

        let mut updated = 0usize;
        loop {
            self.drain_mailbox();
            let Some((id, force)) = self.updates.pending_mut().pop() else {
                break;
            };
            self.engine.update_boundary(id, force, self.updates.pending_mut());
            updated += 1;
        }
        self.updates.finish();

        let batch = self.engine.take_changes();
        trace!(updated, infos = batch.infos.len(), calls = batch.calls.len(), "update phase drained");
        self.renders.pending_mut().push(batch);

        let now = self.clock.now_ms();
        let deferred = self.engine.take_deferred();
        if !deferred.is_empty() {
            for id in deferred {
                if let Err(err) = self.engine.mark(id, true, self.updates.pending_mut()) {
                    debug!(boundary = id.raw(), %err, "deferred boundary is gone");
                }
            }
            let delay = self.engine.settings.update_timeout.unwrap_or(0);
            self.updates.arm(Timeout::After(delay), now);
        }
        self.updates.resolve();
        self.renders.arm(Timeout::Keep, now);
    }

    fn run_render_phase(&mut self) {
        let _span = trace_span!("render_phase").entered();
        self.renders.begin();
        let queue = self.renders.take_pending();
        let before = self.engine.settings.lifecycle_timing == LifecycleTiming::BeforeRender;

        let mut calls: Vec<LifecycleCall> = Vec::new();
        let mut infos = Vec::with_capacity(queue.batches.len());
        for batch in queue.batches {
            calls.extend(batch.calls);
            infos.push(batch.infos);
        }
        if before {
            for call in calls.drain(..) {
                self.engine.fire(call);
            }
        }
        let mut report = ApplyReport::default();
        for batch in infos {
            report.merge(&self.applier.apply(&mut self.engine.tree, batch));
        }
        for call in calls {
            self.engine.fire(call);
        }
        self.renders.finish();

        trace!(?report, "render phase applied");
        self.last_report = report;
        self.renders.resolve();
    }

    fn adopt(&mut self, container: RealNode, options: &ReassimilateOptions) -> ApplyReport {
        let key_attribute = self.engine.settings.reassimilate_key_attribute.clone();
        let report = self
            .applier
            .reassimilate(&mut self.engine.tree, container, options, &key_attribute);
        self.last_report = report.clone();
        report
    }
}

#[cfg(test)]
mod tests {
    use futures_util::FutureExt;

    use super::*;
    use crate::boundary::{Component, HookCx, RenderCx};
    use crate::cycle::ManualClock;
    use crate::def::TargetDef;

    fn sync_host() -> Host {
        Host::with_clock(HostSettings::synchronous(), ManualClock::new()).unwrap()
    }

    struct Bump;

    impl Component for Bump {
        fn render(&mut self, _: &Props, state: &Props, _: &mut RenderCx<'_>) -> RenderOutput {
            state.get("n").and_then(|v| v.as_int()).unwrap_or(0).into()
        }

        fn did_mount(&mut self, cx: &mut HookCx<'_>) {
            cx.updater().set_state_with(Props::new().with("n", 1), Timeout::Immediate);
        }
    }

    #[test]
    fn synchronous_host_renders_inline() {
        let host = sync_host();
        host.update_root(TargetDef::element("p").child("hi")).unwrap();
        assert_eq!(host.markup().unwrap(), "<p>hi</p>");
        assert_eq!(host.last_report().unwrap().created, 2);
        assert_eq!(host.next_deadline().unwrap(), None);
    }

    #[test]
    fn deferred_phases_wait_for_the_deadline() {
        let clock = ManualClock::new();
        let settings = HostSettings {
            update_timeout: Some(10),
            ..HostSettings::default()
        };
        let host = Host::with_clock(settings, clock.clone()).unwrap();
        host.update_root(TargetDef::element("p")).unwrap();
        assert_eq!(host.markup().unwrap(), "");
        assert_eq!(host.next_deadline().unwrap(), Some(10));

        clock.advance(9);
        host.tick().unwrap();
        assert_eq!(host.markup().unwrap(), "");

        clock.advance(1);
        host.tick().unwrap();
        assert_eq!(host.markup().unwrap(), "<p></p>");
        assert_eq!(host.next_deadline().unwrap(), None);
    }

    #[test]
    fn calls_during_a_phase_are_busy() {
        let host = sync_host();
        let inner = host.tree(|_| host.tick()).unwrap();
        assert!(matches!(inner, Err(HostError::Busy)));
    }

    #[test]
    fn hook_requests_fold_into_the_host() {
        let host = sync_host();
        let ty = ComponentType::new("Bump", |_| Bump);
        host.update_root(TargetDef::component(&ty)).unwrap();
        assert_eq!(host.markup().unwrap(), "1");

        let id = host.boundaries_of(&ty).unwrap()[0];
        assert_eq!(host.state_of(id).unwrap().get("n").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn after_refresh_resolves_with_the_render_phase() {
        let clock = ManualClock::new();
        let settings = HostSettings {
            update_timeout: Some(5),
            ..HostSettings::default()
        };
        let host = Host::with_clock(settings, clock.clone()).unwrap();
        assert!(matches!(host.after_refresh(true).unwrap().now_or_never(), Some(Ok(()))));

        host.update_root("x").unwrap();
        let mut handle = host.after_refresh(true).unwrap();
        assert!((&mut handle).now_or_never().is_none());

        clock.advance(5);
        host.tick().unwrap();
        assert!(matches!(handle.now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn destroy_cancels_pending_refreshes() {
        let clock = ManualClock::new();
        let settings = HostSettings {
            update_timeout: Some(5),
            render_timeout: None,
            ..HostSettings::default()
        };
        let host = Host::with_clock(settings, clock).unwrap();
        host.update_root_with(TargetDef::element("p"), Timeout::Immediate).unwrap();
        assert_eq!(host.markup().unwrap(), "<p></p>");

        host.update_root("later").unwrap();
        let handle = host.after_refresh(false).unwrap();
        host.destroy().unwrap();
        assert!(matches!(handle.now_or_never(), Some(Err(HostError::Cancelled))));
        assert_eq!(host.markup().unwrap(), "");
    }

    /// Hides its child once the child asks for it.
    struct Shell {
        child: ComponentType,
        slot: Rc<RefCell<Option<Updater>>>,
    }

    impl Component for Shell {
        fn render(&mut self, _: &Props, state: &Props, _: &mut RenderCx<'_>) -> RenderOutput {
            if state.get("hide").is_some() {
                return RenderOutput::default();
            }
            TargetDef::component(&self.child).into()
        }

        fn pre_mount(&mut self, cx: &mut HookCx<'_>) {
            *self.slot.borrow_mut() = Some(cx.updater().clone());
        }
    }

    #[test]
    fn deferred_boundary_unmounted_in_the_same_phase_is_dropped() {
        let slot: Rc<RefCell<Option<Updater>>> = Rc::new(RefCell::new(None));
        let parent = slot.clone();
        let spin = ComponentType::function("Spin", move |_, _, cx| {
            cx.request_rerender();
            if let Some(updater) = parent.borrow().as_ref() {
                updater.set_state_with(Props::new().with("hide", 1), Timeout::Immediate);
            }
            RenderOutput::from("spin")
        });
        let child = spin.clone();
        let shell = ComponentType::new("Shell", move |_| Shell {
            child: child.clone(),
            slot: slot.clone(),
        });

        let host = sync_host();
        host.update_root(TargetDef::component(&shell)).unwrap();
        assert_eq!(host.markup().unwrap(), "");
        assert!(host.boundaries_of(&spin).unwrap().is_empty());

        host.tick().unwrap();
        assert_eq!(host.markup().unwrap(), "");
        assert_eq!(host.next_deadline().unwrap(), None);
    }

    #[test]
    fn unknown_boundaries_are_errors() {
        let host = sync_host();
        let missing = BoundaryId::from(404);
        assert!(matches!(host.updater(missing), Err(HostError::UnknownBoundary(_))));
        assert!(matches!(host.state_of(missing), Err(HostError::UnknownBoundary(_))));
        assert!(host.updater(host.root_boundary()).is_ok());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = HostSettings {
            reassimilate_key_attribute: String::new(),
            ..HostSettings::default()
        };
        assert!(matches!(
            Host::with_clock(settings, ManualClock::new()),
            Err(HostError::Settings(_))
        ));
    }
}
