// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end reconciliation scenarios against the in-memory host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use stratum_core::config::ReconcilerConfig;
use stratum_core::element::{Component, Context, Element, Node, NodeRef, Value};
use stratum_core::error::{ComponentError, ReconcileError};
use stratum_core::hooks::{Destroy, StateHandle, Transition};
use stratum_core::lane::Lanes;
use stratum_core::root::RootId;
use stratum_core::scheduler::{PriorityLevel, TaskStatus};
use stratum_core::suspense::Awaitable;

use super::*;

fn setup() -> (NoopReconciler, RootId) {
    setup_with(ReconcilerConfig::DEFAULT)
}

fn setup_with(config: ReconcilerConfig) -> (NoopReconciler, RootId) {
    let mut r = NoopReconciler::with_config(NoopHost::new(), ManualScheduler::new(), config);
    let root = r.create_root_container(NoopHost::CONTAINER);
    (r, root)
}

fn render(r: &NoopReconciler) -> String {
    r.host().render(NoopHost::CONTAINER)
}

fn mount(r: &mut NoopReconciler, root: RootId, node: impl Into<Node>) {
    r.schedule_update(root, node.into()).unwrap();
    flush_all(r).unwrap();
}

fn li(key: &str) -> Node {
    Element::host("li").with_key(key).with_children(key).into()
}

/// A counter component exposing its state handle.
fn counter(slot: &Rc<RefCell<Option<StateHandle<i32>>>>) -> Component {
    let slot = slot.clone();
    Component::new("Counter", move |scope, _| {
        let (n, handle) = scope.use_state(|| 0);
        *slot.borrow_mut() = Some(handle);
        Ok(Element::host("span").with_children(Node::text(n.to_string())).into())
    })
}

fn handle_of(slot: &Rc<RefCell<Option<StateHandle<i32>>>>) -> StateHandle<i32> {
    slot.borrow().clone().unwrap()
}

#[test]
fn mount_builds_the_host_tree() {
    let (mut r, root) = setup();
    mount(
        &mut r,
        root,
        Element::host("div").with_attr("id", "app").with_children(Node::list([
            Element::host("h1").with_children("title").into(),
            Node::text("body"),
        ])),
    );
    assert_eq!(render(&r), "<div id=\"app\"><h1>title</h1>body</div>");
    // Only the outermost node touches the container.
    let attached: Vec<_> = r
        .host()
        .ops()
        .iter()
        .filter(|op| matches!(op, HostOp::Append { parent, .. } if *parent == NoopHost::CONTAINER))
        .collect();
    assert_eq!(attached.len(), 1);
}

#[test]
fn identical_rerender_touches_nothing() {
    let (mut r, root) = setup();
    let tree = || -> Node {
        Element::host("ul")
            .with_attr("class", "list")
            .with_children(Node::list([li("a"), li("b")]))
            .into()
    };
    mount(&mut r, root, tree());
    r.host_mut().take_ops();

    mount(&mut r, root, tree());
    assert_eq!(r.host().ops(), []);
    assert_eq!(render(&r), "<ul class=\"list\"><li>a</li><li>b</li></ul>");
}

#[test]
fn text_change_is_a_single_host_call() {
    let (mut r, root) = setup();
    mount(&mut r, root, Element::host("p").with_children("a"));
    let p = r.host().children(NoopHost::CONTAINER)[0];
    let text = r.host().children(p)[0];
    r.host_mut().take_ops();

    mount(&mut r, root, Element::host("p").with_children("b"));
    assert_eq!(
        r.host().ops(),
        [HostOp::SetText {
            node: text,
            text: "b".into()
        }]
    );
    assert_eq!(render(&r), "<p>b</p>");
}

#[test]
fn attribute_change_applies_props() {
    let (mut r, root) = setup();
    mount(&mut r, root, Element::host("a").with_attr("href", "/x"));
    let a = r.host().children(NoopHost::CONTAINER)[0];
    r.host_mut().take_ops();

    mount(&mut r, root, Element::host("a").with_attr("href", "/y"));
    assert_eq!(r.host().ops(), [HostOp::ApplyProps { node: a }]);
    assert_eq!(r.host().attr(a, "href"), Some("/y"));
}

#[test]
fn keyed_reorder_moves_without_recreating() {
    let (mut r, root) = setup();
    mount(&mut r, root, Node::list([li("a"), li("b"), li("c")]));
    let before = r.host().children(NoopHost::CONTAINER).to_vec();
    let [a, b, c] = before[..] else {
        panic!("expected three items, got {before:?}");
    };
    r.host_mut().take_ops();

    // c keeps its place and raises the watermark, so a and b move after it.
    mount(&mut r, root, Node::list([li("c"), li("a"), li("b")]));
    let parent = NoopHost::CONTAINER;
    assert_eq!(
        r.host().ops(),
        [
            HostOp::Append { parent, child: a },
            HostOp::Append { parent, child: b },
        ]
    );
    assert_eq!(r.host().children(parent), [c, a, b]);
}

#[test]
fn keyed_rotation_moves_one_item() {
    let (mut r, root) = setup();
    mount(&mut r, root, Node::list([li("a"), li("b"), li("c")]));
    let a = r.host().children(NoopHost::CONTAINER)[0];
    r.host_mut().take_ops();

    mount(&mut r, root, Node::list([li("b"), li("c"), li("a")]));
    assert_eq!(
        r.host().ops(),
        [HostOp::Append {
            parent: NoopHost::CONTAINER,
            child: a
        }]
    );
    assert_eq!(render(&r), "<li>b</li><li>c</li><li>a</li>");
}

#[test]
fn keyed_insert_and_remove() {
    let (mut r, root) = setup();
    mount(&mut r, root, Node::list([li("a"), li("b"), li("c")]));
    let b = r.host().children(NoopHost::CONTAINER)[1];
    r.host_mut().take_ops();

    mount(&mut r, root, Node::list([li("a"), li("x"), li("c")]));
    let ops = r.host_mut().take_ops();
    assert!(ops.contains(&HostOp::Remove {
        parent: NoopHost::CONTAINER,
        child: b
    }));
    assert!(
        ops.iter()
            .any(|op| matches!(op, HostOp::Insert { parent, .. } if *parent == NoopHost::CONTAINER)),
        "new item is inserted before c: {ops:?}"
    );
    assert_eq!(render(&r), "<li>a</li><li>x</li><li>c</li>");
}

#[test]
fn state_updates_fold_in_order() {
    let (mut r, root) = setup();
    let slot = Rc::default();
    mount(&mut r, root, Element::component(&counter(&slot)));
    let handle = handle_of(&slot);

    r.update_state(&handle, |n| n + 1);
    r.update_state(&handle, |n| n * 10);
    r.set_state(&handle, 7);
    r.update_state(&handle, |n| n + 1);
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "<span>8</span>");
}

#[test]
fn unchanged_child_is_not_called() {
    let (mut r, root) = setup();
    let child_calls = Rc::new(Cell::new(0));
    let calls = child_calls.clone();
    let child = Component::new("Child", move |_, _| {
        calls.set(calls.get() + 1);
        Ok(Node::text("static"))
    });
    let child_element = Element::component(&child);

    let slot: Rc<RefCell<Option<StateHandle<i32>>>> = Rc::default();
    let parent_slot = slot.clone();
    let parent = Component::new("Parent", move |scope, _| {
        let (n, handle) = scope.use_state(|| 0);
        *parent_slot.borrow_mut() = Some(handle);
        Ok(Node::list([
            Element::host("b").with_children(Node::text(n.to_string())).into(),
            child_element.clone().into(),
        ]))
    });
    mount(&mut r, root, Element::component(&parent));
    assert_eq!(child_calls.get(), 1);

    r.set_state(&handle_of(&slot), 1);
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "<b>1</b>static");
    assert_eq!(child_calls.get(), 1);
}

#[test]
fn setting_the_same_state_skips_the_commit() {
    let (mut r, root) = setup();
    let slot = Rc::default();
    mount(&mut r, root, Element::component(&counter(&slot)));
    r.host_mut().take_ops();

    r.set_state(&handle_of(&slot), 0);
    flush_all(&mut r).unwrap();
    assert_eq!(r.host().ops(), []);
}

#[test]
fn sync_update_overtakes_pending_default_update() {
    let (mut r, root) = setup();
    assert_eq!(r.schedule_update(root, Node::text("default")).unwrap(), Lanes::DEFAULT);
    assert_eq!(r.update_container(root, Node::text("sync")).unwrap(), Lanes::SYNC);

    // The microtask boundary only covers the sync lane.
    flush_microtasks(&mut r).unwrap();
    assert_eq!(render(&r), "sync");
    assert_eq!(r.root(root).unwrap().pending_lanes(), Lanes::DEFAULT);

    // Replaying the default lane keeps the later sync update on top.
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "sync");
    assert_eq!(r.root(root).unwrap().pending_lanes(), Lanes::NONE);
}

#[test]
fn transition_updates_use_the_transition_lane() {
    let (mut r, root) = setup();
    let lane = r.start_transition(|r| r.schedule_update(root, Node::text("later")));
    assert_eq!(lane.unwrap(), Lanes::TRANSITION);
    assert_eq!(r.request_update_lane(), Lanes::DEFAULT);
    assert!(render(&r).is_empty());

    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "later");
}

#[test]
fn context_reaches_consumers_below_bailouts() {
    let (mut r, root) = setup();
    let theme = Context::new("theme", Rc::new(String::from("none")) as Value);

    let consumer_theme = theme.clone();
    let consumer = Component::new("Consumer", move |scope, _| {
        let value = scope.use_context(&consumer_theme);
        let name = value.downcast_ref::<String>().cloned().unwrap_or_default();
        Ok(Node::text(name))
    });
    let consumer_element = Element::component(&consumer);

    let middle_calls = Rc::new(Cell::new(0));
    let calls = middle_calls.clone();
    let middle = Component::new("Middle", move |_, _| {
        calls.set(calls.get() + 1);
        Ok(Element::host("div").with_children(consumer_element.clone()).into())
    });
    let middle_element = Element::component(&middle);

    let provide = |value: &str| -> Node {
        Element::provider(&theme, Rc::new(String::from(value)))
            .with_children(middle_element.clone())
            .into()
    };

    mount(&mut r, root, provide("light"));
    assert_eq!(render(&r), "<div>light</div>");

    mount(&mut r, root, provide("dark"));
    assert_eq!(render(&r), "<div>dark</div>");
    assert_eq!(middle_calls.get(), 1);
}

#[test]
fn context_falls_back_to_default() {
    let (mut r, root) = setup();
    let theme = Context::new("theme", Rc::new(String::from("none")) as Value);
    let consumer = Component::new("Consumer", move |scope, _| {
        let value = scope.use_context(&theme);
        Ok(Node::text(value.downcast_ref::<String>().cloned().unwrap_or_default()))
    });
    mount(&mut r, root, Element::component(&consumer));
    assert_eq!(render(&r), "none");
}

#[test]
fn render_yields_between_slices() {
    let (mut r, root) = setup();
    r.slicer_mut().set_yield_budget(Some(2));
    r.schedule_update(
        root,
        Element::host("ul")
            .with_children(Node::list([li("a"), li("b"), li("c")]))
            .into(),
    )
    .unwrap();

    assert_eq!(run_next_task(&mut r, false).unwrap(), Some(TaskStatus::Continue));
    assert!(r.host().children(NoopHost::CONTAINER).is_empty());
    assert_eq!(r.slicer().pending(), 1);

    let mut slices = 1;
    while run_next_task(&mut r, false).unwrap() == Some(TaskStatus::Continue) {
        slices += 1;
        assert!(slices < 32, "render never finished");
    }
    assert!(slices > 2);
    assert_eq!(render(&r), "<ul><li>a</li><li>b</li><li>c</li></ul>");
}

#[test]
fn timed_out_task_renders_without_yielding() {
    let (mut r, root) = setup();
    r.slicer_mut().set_yield_budget(Some(0));
    r.schedule_update(root, Node::list([li("a"), li("b")])).unwrap();
    assert_eq!(run_next_task(&mut r, true).unwrap(), Some(TaskStatus::Done));
    assert_eq!(render(&r), "<li>a</li><li>b</li>");
}

#[test]
fn blocking_config_never_yields() {
    let (mut r, root) = setup_with(ReconcilerConfig::blocking());
    r.slicer_mut().set_yield_budget(Some(0));
    r.schedule_update(root, Node::text("done")).unwrap();
    assert_eq!(run_next_task(&mut r, false).unwrap(), Some(TaskStatus::Done));
    assert_eq!(render(&r), "done");
}

#[test]
fn suspense_shows_fallback_until_resolved() {
    let (mut r, root) = setup();
    let data = Awaitable::new();
    let reader_data = data.clone();
    let reader = Component::new("Reader", move |scope, _| {
        let value = scope.use_awaitable(&reader_data)?;
        Ok(Node::text(value.downcast_ref::<String>().cloned().unwrap_or_default()))
    });

    mount(
        &mut r,
        root,
        Element::suspense("loading").with_children(Element::component(&reader)),
    );
    assert_eq!(render(&r), "loading");

    data.resolve(Rc::new(String::from("ready")));
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "ready");
    assert_eq!(r.host().text_content(NoopHost::CONTAINER), "ready");
}

#[test]
fn suspended_update_hides_and_keeps_the_primary_tree() {
    let (mut r, root) = setup();
    let gate = Awaitable::new();
    let gate_reader = gate.clone();
    let span = NodeRef::new();
    let span_ref = span.clone();
    let slot: Rc<RefCell<Option<StateHandle<i32>>>> = Rc::default();
    let counter_slot = slot.clone();
    let gated = Component::new("Gated", move |scope, _| {
        let (n, handle) = scope.use_state(|| 0);
        *counter_slot.borrow_mut() = Some(handle);
        if n >= 2 {
            scope.use_awaitable(&gate_reader)?;
        }
        Ok(Element::host("span")
            .with_ref(&span_ref)
            .with_children(Node::text(n.to_string()))
            .into())
    });

    mount(
        &mut r,
        root,
        Element::suspense("loading").with_children(Element::component(&gated)),
    );
    r.set_state(&handle_of(&slot), 1);
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "<span>1</span>");
    let node = span.get::<NodeId>().unwrap();

    r.set_state(&handle_of(&slot), 2);
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "loading");
    assert!(r.host().is_hidden(node));

    r.host_mut().take_ops();
    gate.resolve(Rc::new(()));
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "<span>2</span>");
    assert!(!r.host().is_hidden(node));
    assert_eq!(span.get::<NodeId>(), Some(node));
    assert!(
        !r.host().ops().iter().any(HostOp::is_creation),
        "primary tree was rebuilt: {:?}",
        r.host().ops()
    );
}

#[test]
fn suspension_without_boundary_keeps_the_old_tree() {
    let (mut r, root) = setup();
    mount(&mut r, root, Node::text("old"));

    let data = Awaitable::new();
    let reader_data = data.clone();
    let reader = Component::new("Reader", move |scope, _| {
        scope.use_awaitable(&reader_data)?;
        Ok(Node::text("new"))
    });
    mount(&mut r, root, Element::component(&reader));
    assert_eq!(render(&r), "old");
    assert_eq!(r.root(root).unwrap().suspended_lanes(), Lanes::DEFAULT);

    data.resolve(Rc::new(()));
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "new");
}

#[test]
fn failing_render_gives_up_after_retries() {
    let (mut r, root) = setup_with(ReconcilerConfig::DEFAULT.with_max_render_retries(2));
    mount(&mut r, root, Node::text("before"));

    let broken = Component::new("Broken", |_, _| Err(ComponentError::new("boom").into()));
    r.schedule_update(root, Element::component(&broken).into()).unwrap();
    let err = flush_all(&mut r).unwrap_err();
    assert!(
        matches!(err, ReconcileError::RenderFailed { attempts: 3, .. }),
        "got {err:?}"
    );
    assert_eq!(render(&r), "before");

    // A fresh update recovers the root.
    mount(&mut r, root, Node::text("after"));
    assert_eq!(render(&r), "after");
}

#[test]
fn refs_follow_the_host_node() {
    let (mut r, root) = setup();
    let input = NodeRef::new();
    mount(&mut r, root, Element::host("input").with_ref(&input));
    let node = r.host().children(NoopHost::CONTAINER)[0];
    assert_eq!(input.get::<NodeId>(), Some(node));

    mount(&mut r, root, Node::Empty);
    assert!(!input.is_attached());
    assert!(r.host().children(NoopHost::CONTAINER).is_empty());
}

#[test]
fn effects_run_unmounts_then_destroys_then_creates() {
    let (mut r, root) = setup();
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let effect_log = log.clone();
    let tracked = Component::new("Tracked", move |scope, props| {
        let name = props.attr("name").unwrap_or_default().to_owned();
        let version = props.attr("v").unwrap_or_default().to_owned();
        let log = effect_log.clone();
        scope.use_effect(Some(version.clone()), move || {
            log.borrow_mut().push(format!("create {name}{version}"));
            let log = log.clone();
            let label = format!("{name}{version}");
            Some(Box::new(move || log.borrow_mut().push(format!("destroy {label}"))) as Destroy)
        });
        Ok(Node::Empty)
    });
    let item = |name: &str, v: &str| -> Node {
        Element::component(&tracked)
            .with_key(name)
            .with_attr("name", name)
            .with_attr("v", v)
            .into()
    };

    mount(&mut r, root, Node::list([item("a", "1"), item("b", "1")]));
    assert_eq!(log.take(), ["create a1", "create b1"]);

    // Same deps: nothing runs.
    mount(&mut r, root, Node::list([item("a", "1"), item("b", "1")]));
    assert!(log.borrow().is_empty());

    mount(&mut r, root, Node::list([item("b", "2")]));
    assert_eq!(log.take(), ["destroy a1", "destroy b1", "create b2"]);

    mount(&mut r, root, Node::Empty);
    assert_eq!(log.take(), ["destroy b2"]);
}

#[test]
fn effects_wait_for_the_passive_flush() {
    let (mut r, root) = setup();
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    let component = Component::new("Effect", move |scope, _| {
        let flag = flag.clone();
        scope.use_effect(None::<()>, move || {
            flag.set(true);
            None
        });
        Ok(Node::Empty)
    });

    r.update_container(root, Element::component(&component).into())
        .unwrap();
    flush_microtasks(&mut r).unwrap();
    assert!(!ran.get());
    assert!(r.root(root).unwrap().has_pending_passive_effects());

    assert!(r.flush_passive_effects(root).unwrap());
    assert!(ran.get());
    assert!(!r.flush_passive_effects(root).unwrap());
}

#[test]
fn unmounted_state_handle_is_inert() {
    let (mut r, root) = setup();
    let slot = Rc::default();
    mount(&mut r, root, Element::component(&counter(&slot)));
    let handle = handle_of(&slot);
    mount(&mut r, root, Node::Empty);

    assert_eq!(r.set_state(&handle, 3), Lanes::NONE);
    assert!(r.slicer().is_idle());
    assert_eq!(r.host().pending_microtasks(), 0);
}

#[test]
fn state_handle_survives_a_discarded_render() {
    let (mut r, root) = setup();
    let (slot_a, slot_b) = (Rc::default(), Rc::default());
    let (a, b) = (counter(&slot_a), counter(&slot_b));
    let tree = || -> Node {
        Element::host("div")
            .with_children(Node::list([
                Element::component(&a).with_key("a").into(),
                Element::component(&b).with_key("b").into(),
            ]))
            .into()
    };
    mount(&mut r, root, tree());
    let mounted_a = handle_of(&slot_a);

    // The root, the div, and A render before the slice runs out.
    r.slicer_mut().set_yield_budget(Some(3));
    r.schedule_update(root, tree()).unwrap();
    assert_eq!(run_next_task(&mut r, false).unwrap(), Some(TaskStatus::Continue));
    let rendered_a = handle_of(&slot_a);

    // A sync update restarts from the root and throws that render away.
    let lane = r.run_at_priority(PriorityLevel::Immediate, |r| {
        r.set_state(&handle_of(&slot_b), 5)
    });
    assert_eq!(lane, Lanes::SYNC);
    flush_microtasks(&mut r).unwrap();
    assert_eq!(render(&r), "<div><span>0</span><span>5</span></div>");

    assert_eq!(r.set_state(&rendered_a, 9), Lanes::DEFAULT);
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "<div><span>9</span><span>5</span></div>");

    assert_eq!(r.set_state(&mounted_a, 1), Lanes::DEFAULT);
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "<div><span>1</span><span>5</span></div>");
}

#[test]
fn state_handle_from_a_suspended_render_still_updates() {
    let (mut r, root) = setup();
    let gate = Awaitable::new();
    let gate_reader = gate.clone();
    let slot: Rc<RefCell<Option<StateHandle<i32>>>> = Rc::default();
    let gated_slot = slot.clone();
    let gated = Component::new("Gated", move |scope, _| {
        let (n, handle) = scope.use_state(|| 0);
        *gated_slot.borrow_mut() = Some(handle);
        if n >= 1 {
            scope.use_awaitable(&gate_reader)?;
        }
        Ok(Node::text(n.to_string()))
    });
    mount(&mut r, root, Element::component(&gated));
    assert_eq!(render(&r), "0");

    // No boundary: the render is aborted and the old tree stays.
    r.set_state(&handle_of(&slot), 1);
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "0");
    assert_eq!(r.root(root).unwrap().suspended_lanes(), Lanes::DEFAULT);
    let suspended = handle_of(&slot);

    // A sync render of the same component discards the aborted work.
    r.update_container(root, Element::component(&gated).into()).unwrap();
    flush_microtasks(&mut r).unwrap();
    assert_eq!(render(&r), "0");

    assert_eq!(r.set_state(&suspended, 2), Lanes::DEFAULT);
    gate.resolve(Rc::new(()));
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "2");
    assert_eq!(r.root(root).unwrap().pending_lanes(), Lanes::NONE);
}

#[test]
fn restarted_render_drops_provided_values() {
    let (mut r, root) = setup();
    let theme = Context::new("theme", Rc::new(String::from("none")) as Value);
    let consumer_theme = theme.clone();
    let consumer = Component::new("Consumer", move |scope, _| {
        let value = scope.use_context(&consumer_theme);
        Ok(Node::text(value.downcast_ref::<String>().cloned().unwrap_or_default()))
    });

    // Yield while the provider's value is on the stack.
    r.slicer_mut().set_yield_budget(Some(2));
    r.schedule_update(
        root,
        Element::provider(&theme, Rc::new(String::from("dark")))
            .with_children(Element::host("div").with_children(Element::component(&consumer)))
            .into(),
    )
    .unwrap();
    assert_eq!(run_next_task(&mut r, false).unwrap(), Some(TaskStatus::Continue));

    r.update_container(root, Element::component(&consumer).into()).unwrap();
    flush_microtasks(&mut r).unwrap();
    assert_eq!(render(&r), "none");
}

#[test]
fn hook_order_change_is_an_error() {
    let (mut r, root) = setup();
    let slot: Rc<RefCell<Option<StateHandle<bool>>>> = Rc::default();
    let shifty_slot = slot.clone();
    let calls = Rc::new(Cell::new(0));
    let counted = calls.clone();
    let shifty = Component::new("Shifty", move |scope, _| {
        counted.set(counted.get() + 1);
        let (flipped, handle) = scope.use_state(|| false);
        *shifty_slot.borrow_mut() = Some(handle);
        if flipped {
            scope.use_effect::<()>(None, || None);
        }
        let _ = scope.use_ref(|| 0_u8);
        Ok(Node::text("ok"))
    });
    mount(&mut r, root, Element::component(&shifty));
    assert_eq!(render(&r), "ok");

    let handle = slot.borrow().clone().unwrap();
    r.set_state(&handle, true);
    let err = flush_all(&mut r).unwrap_err();
    assert_eq!(
        err,
        ReconcileError::HookOrder {
            component: "Shifty".into(),
            index: 1
        }
    );
    assert_eq!(calls.get(), 2, "hook order errors are not retried");
    assert_eq!(render(&r), "ok");
    assert!(r.slicer().is_idle());
}

#[test]
fn ref_cell_survives_rerenders() {
    let (mut r, root) = setup();
    let slot: Rc<RefCell<Option<StateHandle<i32>>>> = Rc::default();
    let state_slot = slot.clone();
    let renders = Component::new("Renders", move |scope, _| {
        let (_, handle) = scope.use_state(|| 0_i32);
        *state_slot.borrow_mut() = Some(handle);
        let count = scope.use_ref(|| 0_u32);
        *count.borrow_mut() += 1;
        let seen = *count.borrow();
        Ok(Node::text(seen.to_string()))
    });
    mount(&mut r, root, Element::component(&renders));
    assert_eq!(render(&r), "1");

    r.set_state(&handle_of(&slot), 1);
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "2");
}

#[test]
fn transition_is_pending_until_it_renders() {
    let (mut r, root) = setup();
    let slots: Rc<RefCell<Option<(Transition, StateHandle<i32>)>>> = Rc::default();
    let component_slots = slots.clone();
    let search = Component::new("Search", move |scope, _| {
        let (pending, transition) = scope.use_transition();
        let (n, handle) = scope.use_state(|| 0);
        *component_slots.borrow_mut() = Some((transition, handle));
        let label = if pending { "pending" } else { "idle" };
        Ok(Node::text(format!("{label} {n}")))
    });
    mount(&mut r, root, Element::component(&search));
    assert_eq!(render(&r), "idle 0");

    let (transition, count) = slots.borrow().clone().unwrap();
    let lane = transition.start(&mut r, |r| r.set_state(&count, 1));
    assert_eq!(lane, Lanes::TRANSITION);

    // The pending flag renders at the default lane first.
    assert_eq!(run_next_task(&mut r, false).unwrap(), Some(TaskStatus::Done));
    assert_eq!(render(&r), "pending 0");

    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "idle 1");
}

#[test]
fn roots_render_independently() {
    let (mut r, first) = setup();
    let other = r.host_mut().create_container();
    let second = r.create_root_container(other);
    r.schedule_update(first, Node::text("one")).unwrap();
    r.schedule_update(second, Node::text("two")).unwrap();
    flush_all(&mut r).unwrap();
    assert_eq!(render(&r), "one");
    assert_eq!(r.host().render(other), "two");
}
