//! Integration Tests for the Host
//!
//! These tests drive the public host API against the in-memory output tree
//! and check what ends up in it, and which render infos got it there.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use trellis_core::{
    CompareDepth, Component, ComponentType, HookCx, Host, HostSettings, LifecycleTiming, ManualClock, OutputBackend,
    Props, ReassimilateOptions, RealNode, RemoveHook, RenderCx, RenderFlags, RenderInfo, RenderOutput, TargetDef,
    Timeout, UpdateModes,
};

fn sync_host() -> Host {
    Host::with_clock(HostSettings::synchronous(), ManualClock::new()).unwrap()
}

fn list(keys: &[i64]) -> TargetDef {
    TargetDef::element("ul").children(keys.iter().map(|&k| TargetDef::element("li").key(k).prop("id", k)))
}

fn count(log: &[RenderInfo], flag: RenderFlags) -> usize {
    log.iter().filter(|info| info.is(flag)).count()
}

/// Output nodes of the list items, by their `id` prop.
fn items(host: &Host) -> Vec<(i64, RealNode)> {
    let container = host.container().unwrap();
    host.backend(|dom| {
        let Some(&ul) = dom.children(container).first() else {
            return Vec::new();
        };
        dom.children(ul)
            .into_iter()
            .map(|li| (dom.read_props(li).get("id").and_then(|v| v.as_int()).unwrap(), li))
            .collect()
    })
    .unwrap()
}

/// Small deterministic generator for shuffles.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = (self.next() % (i as u64 + 1)) as usize;
            items.swap(i, j);
        }
    }
}

// ============================================================================
// Pairing
// ============================================================================

/// Test that a keyed reorder moves only what it must and mounts new keys.
#[test]
fn keyed_reorder_moves_two_and_mounts_one() {
    let host = sync_host();
    host.update_root(list(&[1, 2, 3])).unwrap();
    let before: HashMap<_, _> = items(&host).into_iter().collect();

    host.record_render_infos(true).unwrap();
    host.update_root(list(&[3, 1, 4, 2])).unwrap();
    let log = host.take_render_log().unwrap();

    assert_eq!(count(&log, RenderFlags::MOVE), 2);
    assert_eq!(count(&log, RenderFlags::CREATE), 1);
    assert_eq!(count(&log, RenderFlags::REMOVE), 0);

    let after = items(&host);
    assert_eq!(after.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![3, 1, 4, 2]);
    for (key, node) in &after {
        if let Some(old) = before.get(key) {
            assert_eq!(old, node, "item {key} was recreated");
        }
    }
}

/// Test that surviving keys keep their output nodes across random reorders.
#[test]
fn keys_keep_their_nodes_across_reorders() {
    let host = sync_host();
    let mut rng = Lcg(7);
    let mut known: HashMap<i64, RealNode> = HashMap::new();

    for round in 0..40 {
        let mut keys: Vec<i64> = (0..8).collect();
        rng.shuffle(&mut keys);
        keys.truncate(5 + (rng.next() % 4) as usize);

        host.update_root(list(&keys)).unwrap();
        let now = items(&host);
        assert_eq!(now.iter().map(|(k, _)| *k).collect::<Vec<_>>(), keys, "round {round}");
        for (key, node) in &now {
            if let Some(old) = known.get(key) {
                assert_eq!(old, node, "round {round}: item {key} was recreated");
            }
        }
        known = now.into_iter().collect();
        assert!(host.tree(|t| t.verify_dom_cache()).unwrap().is_ok());
    }
}

/// Test that rendering the same content twice produces no render infos.
#[test]
fn repeated_render_is_a_no_op() {
    let card = ComponentType::function("Card", |props, _, _| {
        TargetDef::element("article")
            .prop("class", "card")
            .child(props.get("title").and_then(|v| v.to_text()))
            .into()
    });
    let content = || {
        vec![
            TargetDef::element("h1").child("Cards"),
            TargetDef::component(&card).prop("title", "one"),
            TargetDef::fragment().children([TargetDef::text("a"), TargetDef::markup("<hr>")]),
        ]
    };

    let host = sync_host();
    host.update_root(content()).unwrap();
    let markup = host.markup().unwrap();

    host.record_render_infos(true).unwrap();
    host.update_root(content()).unwrap();
    assert!(host.take_render_log().unwrap().is_empty());
    assert!(host.last_report().unwrap().is_empty());
    assert_eq!(host.markup().unwrap(), markup);
}

/// Test that changing a constant prop remounts the component.
#[test]
fn constant_prop_change_remounts() {
    let panel = ComponentType::function("Panel", |props, _, _| {
        TargetDef::element("div").child(props.get("mode").and_then(|v| v.to_text())).into()
    })
    .with_constant_props(&["mode"])
    .with_update_modes(UpdateModes {
        props: Some(CompareDepth::Always),
        ..UpdateModes::default()
    });

    let host = sync_host();
    host.update_root(TargetDef::component(&panel).prop("mode", "a")).unwrap();
    let first = host.boundaries_of(&panel).unwrap();

    for mode in ["b", "c"] {
        host.record_render_infos(true).unwrap();
        host.update_root(TargetDef::component(&panel).prop("mode", mode)).unwrap();
        let log = host.take_render_log().unwrap();
        assert_eq!(count(&log, RenderFlags::REMOVE), 1, "mode {mode}");
        assert_eq!(count(&log, RenderFlags::UPDATE), 0, "mode {mode}");
        assert!(count(&log, RenderFlags::CREATE) > 0, "mode {mode}");
    }
    assert_ne!(host.boundaries_of(&panel).unwrap(), first);
    assert_eq!(host.markup().unwrap(), "<div>c</div>");

    // The same value again re-renders in place.
    host.record_render_infos(true).unwrap();
    host.update_root(TargetDef::component(&panel).prop("mode", "c")).unwrap();
    assert_eq!(count(&host.take_render_log().unwrap(), RenderFlags::REMOVE), 0);
}

/// Test that forwarded content torn down with its source is removed once.
#[test]
fn forwarded_content_is_not_removed_twice() {
    let middle = ComponentType::function("Middle", |_, _, _| {
        TargetDef::element("section").child(TargetDef::content_pass()).into()
    });
    let inner = middle.clone();
    let outer = ComponentType::function("Outer", move |_, _, _| {
        TargetDef::element("div")
            .child(TargetDef::component(&inner).child(TargetDef::content_pass()))
            .into()
    });

    let host = sync_host();
    host.update_root(TargetDef::component(&outer).child(TargetDef::element("b"))).unwrap();
    assert_eq!(host.markup().unwrap(), "<div><section><b></b></section></div>");

    host.record_render_infos(true).unwrap();
    host.update_root(()).unwrap();
    let log = host.take_render_log().unwrap();

    let removed: Vec<_> = log.iter().filter(|i| i.is(RenderFlags::REMOVE)).map(|i| i.node).collect();
    assert_eq!(removed.len(), 1);
    assert_eq!(host.markup().unwrap(), "");
    assert!(host.boundaries_of(&middle).unwrap().is_empty());
}

/// Test that new content reaches a content pass two boundaries down, even
/// when the boundary in between has nothing new to render.
#[test]
fn forwarded_content_flows_through_two_hops() {
    let middle = ComponentType::function("Middle", |_, _, _| {
        TargetDef::element("section").child(TargetDef::content_pass()).into()
    });
    let outer = ComponentType::function("Outer", move |_, _, _| {
        TargetDef::element("div")
            .child(TargetDef::component(&middle).child(TargetDef::content_pass()))
            .into()
    });

    let host = sync_host();
    host.update_root(TargetDef::component(&outer).child(TargetDef::element("b").child("x")))
        .unwrap();
    assert_eq!(host.markup().unwrap(), "<div><section><b>x</b></section></div>");

    host.update_root(TargetDef::component(&outer).child(TargetDef::element("b").child("y")))
        .unwrap();
    assert_eq!(host.markup().unwrap(), "<div><section><b>y</b></section></div>");

    host.update_root(TargetDef::component(&outer).child(TargetDef::element("i")))
        .unwrap();
    assert_eq!(host.markup().unwrap(), "<div><section><i></i></section></div>");
}

/// Test that moved boundaries hear about it and unmoved ones do not.
#[test]
fn moved_boundaries_get_did_move() {
    struct Tile(Rc<RefCell<Vec<i64>>>);

    impl Component for Tile {
        fn render(&mut self, props: &Props, _: &Props, _: &mut RenderCx<'_>) -> RenderOutput {
            TargetDef::element("i").child(props.get("id").and_then(|v| v.to_text())).into()
        }

        fn did_move(&mut self, cx: &mut HookCx<'_>) {
            let id = cx.props().get("id").and_then(|v| v.as_int()).unwrap();
            self.0.borrow_mut().push(id);
        }
    }

    let moves = Rc::new(RefCell::new(Vec::new()));
    let log = moves.clone();
    let tile = ComponentType::new("Tile", move |_| Tile(log.clone()));
    let tiles = |keys: &[i64]| -> Vec<TargetDef> {
        keys.iter().map(|&k| TargetDef::component(&tile).key(k).prop("id", k)).collect()
    };

    let host = sync_host();
    host.update_root(tiles(&[1, 2, 3])).unwrap();
    assert!(moves.borrow().is_empty());

    host.update_root(tiles(&[2, 1, 3])).unwrap();
    assert_eq!(host.markup().unwrap(), "<i>2</i><i>1</i><i>3</i>");
    let mut seen = moves.borrow().clone();
    seen.sort();
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(host.last_report().unwrap().created, 0);
}

/// Test that a nested host def keeps its own key space and does not forward
/// content from outside.
#[test]
fn nested_host_isolates_keys_and_content() {
    let host = sync_host();
    host.update_root(vec![TargetDef::element("li").key(1), TargetDef::nested()]).unwrap();
    assert_eq!(host.markup().unwrap(), "<li></li>");

    host.record_render_infos(true).unwrap();
    host.update_root(TargetDef::nested().child(TargetDef::element("li").key(1))).unwrap();
    let log = host.take_render_log().unwrap();
    assert_eq!(host.markup().unwrap(), "<li></li>");
    assert_eq!(count(&log, RenderFlags::CREATE), 1);
    assert_eq!(count(&log, RenderFlags::REMOVE), 1);
    assert_eq!(count(&log, RenderFlags::MOVE), 0);

    let frame = ComponentType::function("Frame", |_, _, _| {
        TargetDef::element("section")
            .child(TargetDef::content_pass())
            .child(TargetDef::nested().child(TargetDef::element("aside").child(TargetDef::content_pass())))
            .into()
    });
    host.update_root(TargetDef::component(&frame).child(TargetDef::element("b"))).unwrap();
    assert_eq!(host.markup().unwrap(), "<section><b></b><aside></aside></section>");
}

// ============================================================================
// Refresh cycles
// ============================================================================

/// Test that a forced root refresh renders boundaries that refuse updates.
#[test]
fn forced_refresh_overrides_should_update() {
    struct Stubborn(Rc<Cell<usize>>);

    impl Component for Stubborn {
        fn render(&mut self, props: &Props, _: &Props, _: &mut RenderCx<'_>) -> RenderOutput {
            self.0.set(self.0.get() + 1);
            props.get("text").and_then(|v| v.to_text()).into()
        }

        fn should_update(&self, _: &Props, _: &Props, _: &Props, _: &Props) -> Option<bool> {
            Some(false)
        }
    }

    let renders = Rc::new(Cell::new(0));
    let seen = renders.clone();
    let stubborn = ComponentType::new("Stubborn", move |_| Stubborn(seen.clone()));

    let host = sync_host();
    host.update_root(TargetDef::component(&stubborn).prop("text", "a")).unwrap();
    host.update_root(TargetDef::component(&stubborn).prop("text", "b")).unwrap();
    assert_eq!(host.markup().unwrap(), "a");
    assert_eq!(renders.get(), 1);

    host.refresh_root(false, Timeout::Immediate).unwrap();
    assert_eq!(host.markup().unwrap(), "a");
    assert_eq!(renders.get(), 1);

    host.refresh_root(true, Timeout::Immediate).unwrap();
    assert_eq!(host.markup().unwrap(), "b");
    assert_eq!(renders.get(), 2);
}

/// Test that a render loop past the cap is deferred to the next tick.
#[test]
fn render_loop_past_the_cap_finishes_next_tick() {
    let renders = Rc::new(Cell::new(0));
    let seen = renders.clone();
    let climb = ComponentType::function("Climb", move |_, state, cx| {
        seen.set(seen.get() + 1);
        let n = state.get("n").and_then(|v| v.as_int()).unwrap_or(0);
        if n < 5 {
            cx.set_state(Props::new().with("n", n + 1));
        }
        RenderOutput::from(n)
    });

    let settings = HostSettings {
        max_re_renders: 2,
        ..HostSettings::synchronous()
    };
    let host = Host::with_clock(settings, ManualClock::new()).unwrap();
    host.update_root(TargetDef::component(&climb)).unwrap();

    // One render plus two re-renders, then the boundary waits.
    assert_eq!(renders.get(), 3);
    assert_eq!(host.markup().unwrap(), "2");
    assert_eq!(host.next_deadline().unwrap(), Some(0));

    host.tick().unwrap();
    assert_eq!(host.markup().unwrap(), "5");
    assert_eq!(renders.get(), 6);
    assert_eq!(host.next_deadline().unwrap(), None);
}

struct Eager {
    renders: Rc<Cell<usize>>,
}

impl Component for Eager {
    fn render(&mut self, _: &Props, state: &Props, _: &mut RenderCx<'_>) -> RenderOutput {
        self.renders.set(self.renders.get() + 1);
        state.get("n").and_then(|v| v.as_int()).unwrap_or(0).into()
    }

    fn pre_mount(&mut self, cx: &mut HookCx<'_>) {
        cx.updater().set_state(Props::new().with("n", 7));
    }
}

/// Test that a request made from a hook joins the running update phase.
#[test]
fn hook_requests_join_the_running_cycle() {
    let renders = Rc::new(Cell::new(0));
    let counter = renders.clone();
    let eager = ComponentType::new("Eager", move |_| Eager {
        renders: counter.clone(),
    });

    let clock = ManualClock::new();
    let host = Host::with_clock(HostSettings::default(), clock).unwrap();
    host.update_root(TargetDef::component(&eager)).unwrap();
    assert_eq!(host.markup().unwrap(), "");

    host.tick().unwrap();
    assert_eq!(host.markup().unwrap(), "7");
    assert_eq!(renders.get(), 2);
    assert_eq!(host.last_report().unwrap().created, 1);
    assert_eq!(host.next_deadline().unwrap(), None);
}

/// Test that updater requests respect their timeouts.
#[test]
fn updater_requests_follow_their_timeouts() {
    let label = ComponentType::function("Label", |_, state, _| {
        state.get("text").and_then(|v| v.to_text()).into()
    });
    let clock = ManualClock::new();
    let settings = HostSettings {
        update_timeout: Some(30),
        render_timeout: None,
        ..HostSettings::default()
    };
    let host = Host::with_clock(settings, clock.clone()).unwrap();
    host.update_root_with(TargetDef::component(&label), Timeout::Immediate).unwrap();
    let updater = host.updater(host.boundaries_of(&label).unwrap()[0]).unwrap();

    updater.set_state(Props::new().with("text", "later"));
    assert_eq!(host.markup().unwrap(), "");
    assert_eq!(host.next_deadline().unwrap(), Some(30));

    // A shorter request pulls the deadline in.
    updater.set_state_with(Props::new().with("text", "sooner"), Timeout::After(10));
    assert_eq!(host.next_deadline().unwrap(), Some(10));

    clock.advance(10);
    host.tick().unwrap();
    assert_eq!(host.markup().unwrap(), "sooner");

    updater.set_state_with(Props::new().with("text", "now"), Timeout::Immediate);
    assert_eq!(host.markup().unwrap(), "now");
}

/// Test that lifecycle calls fire after the output exists unless configured
/// to fire before it.
#[test]
fn lifecycle_timing_controls_when_hooks_see_output() {
    struct Witness(Rc<RefCell<Vec<bool>>>);

    impl Component for Witness {
        fn render(&mut self, _: &Props, _: &Props, _: &mut RenderCx<'_>) -> RenderOutput {
            TargetDef::element("span").into()
        }

        fn did_mount(&mut self, cx: &mut HookCx<'_>) {
            self.0.borrow_mut().push(cx.dom().is_some());
        }
    }

    for (timing, expected) in [(LifecycleTiming::AfterRender, true), (LifecycleTiming::BeforeRender, false)] {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let witness = ComponentType::new("Witness", move |_| Witness(log.clone()));
        let settings = HostSettings {
            lifecycle_timing: timing,
            ..HostSettings::synchronous()
        };
        let host = Host::with_clock(settings, ManualClock::new()).unwrap();
        host.update_root(TargetDef::component(&witness)).unwrap();
        assert_eq!(*seen.borrow(), vec![expected], "{timing:?}");
    }
}

/// Test that awaiting a refresh works on paused tokio time.
#[tokio::test(start_paused = true)]
async fn after_refresh_resolves_on_tokio_time() {
    let settings = HostSettings {
        update_timeout: Some(20),
        render_timeout: Some(5),
        ..HostSettings::default()
    };
    let start = tokio::time::Instant::now();
    let host = Host::new(settings).unwrap();
    host.update_root(TargetDef::element("p").child("ready")).unwrap();

    let updated = host.after_refresh(false).unwrap();
    let rendered = host.after_refresh(true).unwrap();
    host.run_until_idle().await.unwrap();

    updated.await.unwrap();
    rendered.await.unwrap();
    assert_eq!(host.markup().unwrap(), "<p>ready</p>");
    assert_eq!(start.elapsed(), Duration::from_millis(25));
}

// ============================================================================
// Output
// ============================================================================

/// Test that mounts made while paused are applied on resume.
#[test]
fn paused_mounts_apply_on_resume() {
    let host = sync_host();
    host.update_root(list(&[1])).unwrap();
    host.pause().unwrap();

    for keys in [&[1, 2][..], &[1, 2, 3], &[1, 2, 3, 4]] {
        host.update_root(list(keys)).unwrap();
    }
    assert_eq!(host.markup().unwrap(), r#"<ul><li id="1"></li></ul>"#);

    let report = host.resume(false).unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.removed, 0);
    assert_eq!(items(&host).iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
}

/// Test that an external node swapped in while paused shows up on resume.
#[test]
fn paused_swap_applies_on_resume() {
    let host = sync_host();
    let (a, b) = host
        .backend(|dom| (dom.create_element("a"), dom.create_element("b")))
        .unwrap();

    host.update_root(TargetDef::external(a).child("x")).unwrap();
    assert_eq!(host.markup().unwrap(), "<a>x</a>");

    host.pause().unwrap();
    host.update_root(TargetDef::external(b).child("x")).unwrap();
    assert_eq!(host.markup().unwrap(), "<a>x</a>");

    host.resume(false).unwrap();
    assert_eq!(host.markup().unwrap(), "<b>x</b>");

    host.update_root(TargetDef::external(b).child("y")).unwrap();
    assert_eq!(host.markup().unwrap(), "<b>y</b>");
}

/// Test that existing output is adopted instead of recreated.
#[test]
fn reassimilation_adopts_existing_output() {
    let host = sync_host();
    host.update_root(list(&[1, 2, 3])).unwrap();
    let old = host.container().unwrap();

    let copy = host
        .backend(|dom| {
            let container = dom.create_element("root");
            let ul = dom.children(old)[0];
            let clone = dom.clone_node(ul, true);
            dom.insert(container, clone, None);
            container
        })
        .unwrap();

    let report = host.reassimilate(copy, ReassimilateOptions::default()).unwrap();
    assert_eq!(report.adopted, 4);
    assert_eq!(report.created, 0);
    assert_eq!(host.container().unwrap(), copy);

    // Later renders work on the adopted nodes.
    let adopted: HashMap<_, _> = items(&host).into_iter().collect();
    host.update_root(list(&[3, 2, 1])).unwrap();
    for (key, node) in items(&host) {
        assert_eq!(adopted[&key], node);
    }
}

/// Test that remounting renders new content over existing markup.
#[test]
fn remount_renders_over_existing_markup() {
    let host = sync_host();
    let server = host
        .backend(|dom| {
            let container = dom.create_element("body");
            let ul = dom.create_element("ul");
            dom.insert(container, ul, None);
            for key in [2, 1] {
                let li = dom.create_element("li");
                let props = Props::new().with("data-key", key);
                dom.apply_props(li, &Props::new().diff(&props, CompareDepth::Deep));
                dom.insert(ul, li, None);
            }
            container
        })
        .unwrap();
    let existing = host.backend(|dom| dom.children(dom.children(server)[0])).unwrap();

    let options = ReassimilateOptions {
        read_props: true,
        ..ReassimilateOptions::default()
    };
    let report = host.remount_with(list(&[1, 2, 3]), server, options).unwrap();
    assert_eq!(report.adopted, 3);
    assert_eq!(report.created, 1);

    let now = items(&host);
    assert_eq!(now.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(now[0].1, existing[1]);
    assert_eq!(now[1].1, existing[0]);

    // Live props were reconciled with the targets.
    assert_eq!(host.markup().unwrap(), r#"<ul><li id="1"></li><li id="2"></li><li id="3"></li></ul>"#);
}

/// Test that portal content renders into its own container.
#[test]
fn portal_renders_elsewhere() {
    let host = sync_host();
    let overlay = host.backend(|dom| dom.create_element("overlay")).unwrap();

    host.update_root(vec![
        TargetDef::element("main"),
        TargetDef::portal(overlay).child(TargetDef::element("dialog").child("hi")),
    ])
    .unwrap();
    assert_eq!(host.markup().unwrap(), "<main></main>");
    assert_eq!(host.backend(|dom| dom.inner_markup(overlay)).unwrap(), "<dialog>hi</dialog>");

    host.update_root(TargetDef::element("main")).unwrap();
    assert_eq!(host.backend(|dom| dom.inner_markup(overlay)).unwrap(), "");
}

/// Test that removing an element also clears portals rendered below it.
#[test]
fn removed_element_takes_nested_portals_along() {
    let host = sync_host();
    let overlay = host.backend(|dom| dom.create_element("overlay")).unwrap();
    let removed = Rc::new(Cell::new(0));
    let hook = {
        let removed = removed.clone();
        RemoveHook::new(move |_| {
            removed.set(removed.get() + 1);
            false
        })
    };

    host.update_root(
        TargetDef::element("div").child(
            TargetDef::element("span")
                .child(TargetDef::portal(overlay).child(TargetDef::element("dialog").on_remove(hook))),
        ),
    )
    .unwrap();
    assert_eq!(host.markup().unwrap(), "<div><span></span></div>");
    assert_eq!(host.backend(|dom| dom.inner_markup(overlay)).unwrap(), "<dialog></dialog>");

    host.update_root(()).unwrap();
    assert_eq!(host.markup().unwrap(), "");
    assert_eq!(host.backend(|dom| dom.inner_markup(overlay)).unwrap(), "");
    assert_eq!(removed.get(), 1);
}

/// Test that a wired boundary follows its source.
#[test]
fn wired_boundary_follows_its_source() {
    let counter = ComponentType::function("Counter", |_, state, _| {
        TargetDef::element("i")
            .child(state.get("n").and_then(|v| v.as_int()).unwrap_or(0))
            .into()
    });
    let mirror = ComponentType::function("Mirror", |_, state, _| {
        TargetDef::element("b").child(state.get("seen").and_then(|v| v.to_text())).into()
    });

    let host = sync_host();
    host.update_root(vec![TargetDef::component(&counter), TargetDef::component(&mirror)])
        .unwrap();
    assert_eq!(host.markup().unwrap(), "<i>0</i><b></b>");

    let source = host.boundaries_of(&counter).unwrap()[0];
    let target = host.boundaries_of(&mirror).unwrap()[0];
    host.wire(source, target, |_: &Props, state: &Props| {
        let n = state.get("n")?.as_int()?;
        Some(Props::new().with("seen", n * 10))
    })
    .unwrap();

    host.set_state(source, Props::new().with("n", 2), Timeout::Immediate).unwrap();
    assert_eq!(host.markup().unwrap(), "<i>2</i><b>20</b>");
    assert_eq!(host.state_of(target).unwrap().get("seen").and_then(|v| v.as_int()), Some(20));
}

/// Test that settings loaded from JSON drive the host.
#[test]
fn settings_from_json_drive_the_host() {
    let settings = HostSettings::from_json(
        r#"{ "updateTimeout": null, "renderTimeout": null, "duplicateNodes": "skip" }"#,
    )
    .unwrap();
    let host = Host::with_clock(settings, ManualClock::new()).unwrap();
    let shared = host.backend(|dom| dom.create_element("img")).unwrap();

    host.update_root(vec![TargetDef::external(shared), TargetDef::external(shared)])
        .unwrap();
    assert_eq!(host.markup().unwrap(), "<img></img>");
}

/// Test that destroying a host empties its output.
#[test]
fn destroy_empties_the_output() {
    let host = sync_host();
    host.update_root(list(&[1, 2])).unwrap();
    let root = host.root_boundary();

    host.destroy().unwrap();
    assert_eq!(host.markup().unwrap(), "");
    assert!(host.tree(|t| t.children(t.root()).is_empty()).unwrap());
    assert!(host.updater(root).is_ok());
}
