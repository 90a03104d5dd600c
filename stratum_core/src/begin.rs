// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The begin phase of a unit of work.
//!
//! [`begin_work`] renders one fiber (or decides it can skip rendering) and
//! returns its first work-in-progress child, or [`INVALID`] when the walk
//! should move on to completion.
//!
//! A fiber bails out when its inputs are identical to the committed ones and
//! it has no work at the render lane. A bailed out fiber still hands its
//! children to the walk if work is pending somewhere below it.

use alloc::rc::Rc;

use crate::child::reconcile_children;
use crate::context::propagate_context_change;
use crate::element::{Context, Node, Props, Value};
use crate::fiber::{
    Fiber, FiberKind, FiberState, FiberStore, INVALID, OffscreenMode, PendingProps,
    create_alternate,
};
use crate::flags::Flags;
use crate::hooks::Scope;
use crate::lane::Lanes;
use crate::update_queue::process;
use crate::work_loop::{Interrupt, WorkSession};

/// Begins work on `wip` at the session's lane.
pub(crate) fn begin_work<I: Clone>(
    fibers: &mut FiberStore<I>,
    session: &mut WorkSession,
    wip: u32,
) -> Result<u32, Interrupt> {
    let lane = session.lane;
    let current = fibers[wip].alternate;
    if let Some(cur) = fibers.get(current) {
        let fiber = &fibers[wip];
        let props_changed = fiber
            .memoized_props
            .as_ref()
            .is_none_or(|old| !old.identical(&fiber.pending_props));
        let retrying_boundary = matches!(fiber.kind, FiberKind::Suspense)
            && cur.state.showing_fallback()
            && cur.child_lanes.includes_any(lane);
        if props_changed {
            session.did_receive_update = true;
        } else if !cur.lanes.includes_any(lane)
            && !fiber.flags.contains(Flags::DID_CAPTURE)
            && !retrying_boundary
        {
            session.did_receive_update = false;
            return Ok(attempt_early_bailout(fibers, session, wip));
        } else {
            session.did_receive_update = false;
        }
    } else {
        session.did_receive_update = false;
    }

    fibers[wip].lanes = Lanes::NONE;
    match fibers[wip].kind {
        FiberKind::Root(_) => Ok(update_root(fibers, lane, wip)),
        FiberKind::Function(_) => update_function(fibers, session, wip),
        FiberKind::HostElement(_) => {
            mark_ref(fibers, wip);
            Ok(update_children(fibers, wip))
        }
        FiberKind::HostText => Ok(INVALID),
        FiberKind::Fragment | FiberKind::Offscreen => Ok(update_children(fibers, wip)),
        FiberKind::Provider(_) => Ok(update_provider(fibers, session, wip)),
        FiberKind::Suspense => Ok(update_suspense(fibers, session, wip)),
    }
}

/// Pushes the stack entries a skipped fiber would have pushed, then bails
/// out.
fn attempt_early_bailout<I: Clone>(
    fibers: &mut FiberStore<I>,
    session: &mut WorkSession,
    wip: u32,
) -> u32 {
    let fiber = &fibers[wip];
    match &fiber.kind {
        FiberKind::Provider(context) => {
            let value = provided_value(&fiber.pending_props, context);
            session.contexts.push(context, value);
        }
        FiberKind::Suspense => {
            let handler = if fiber.state.showing_fallback() {
                INVALID
            } else {
                wip
            };
            session.suspense_handlers.push(handler);
        }
        _ => {}
    }
    bailout_on_already_finished_work(fibers, session.lane, wip)
}

/// Skips `wip`'s subtree unless work at `lane` is pending below it, in which
/// case the committed children are cloned and returned for rendering.
fn bailout_on_already_finished_work<I: Clone>(
    fibers: &mut FiberStore<I>,
    lane: Lanes,
    wip: u32,
) -> u32 {
    if !fibers[wip].child_lanes.includes_any(lane) {
        return INVALID;
    }
    clone_child_fibers(fibers, wip);
    fibers[wip].child
}

fn clone_child_fibers<I: Clone>(fibers: &mut FiberStore<I>, wip: u32) {
    let mut current_child = fibers[wip].child;
    let mut first = INVALID;
    let mut previous = INVALID;
    while current_child != INVALID {
        let source = &fibers[current_child];
        let props = source.pending_props.clone();
        let next = source.sibling;
        let clone = create_alternate(fibers, current_child, props);
        fibers[clone].parent = wip;
        if previous == INVALID {
            first = clone;
        } else {
            fibers[previous].sibling = clone;
        }
        previous = clone;
        current_child = next;
    }
    fibers[wip].child = first;
}

fn update_children<I: Clone>(fibers: &mut FiberStore<I>, wip: u32) -> u32 {
    let children = fibers[wip].pending_props.children();
    reconcile_children(fibers, wip, &children);
    fibers[wip].child
}

fn update_root<I: Clone>(fibers: &mut FiberStore<I>, lane: Lanes, wip: u32) -> u32 {
    let current = fibers[wip].alternate;
    let FiberState::Root { queue, .. } = &fibers[wip].state else {
        panic!("root fiber {wip} has no update queue");
    };
    let pending = queue.take();
    // Both buffers keep the updates so a discarded render cannot lose them.
    for idx in [wip, current] {
        if let Some(Fiber {
            state: FiberState::Root { state, .. },
            ..
        }) = fibers.get_mut(idx)
        {
            state.merge_pending(&pending);
        }
    }

    let fiber = &mut fibers[wip];
    let FiberState::Root { state, .. } = &mut fiber.state else {
        unreachable!("checked above");
    };
    let previous = state.memoized.clone();
    let processed = process(&state.base_state, &state.base_queue, lane);
    let skipped = processed.skipped_lanes;
    let next = processed.memoized.clone();
    state.apply(processed);
    fiber.lanes = skipped;

    if next.same(&previous) {
        return bailout_on_already_finished_work(fibers, lane, wip);
    }
    reconcile_children(fibers, wip, &next);
    fibers[wip].child
}

fn element_props<I>(fiber: &Fiber<I>) -> Rc<Props> {
    match &fiber.pending_props {
        PendingProps::Element(props) => props.clone(),
        other => panic!("{:?} fiber has {other:?} inputs", fiber.kind.tag()),
    }
}

fn update_function<I: Clone>(
    fibers: &mut FiberStore<I>,
    session: &mut WorkSession,
    wip: u32,
) -> Result<u32, Interrupt> {
    let lane = session.lane;
    let fiber = &fibers[wip];
    let FiberKind::Function(component) = &fiber.kind else {
        unreachable!("dispatched on kind");
    };
    let component = component.clone();
    let props = element_props(fiber);
    let current = fiber.alternate;
    if fiber.dependency_lanes.includes_any(lane) {
        session.did_receive_update = true;
    }

    // Hooks come from the committed fiber so that every attempt at this
    // render, including retries, sees the same merged update queues.
    let prev = fibers
        .get(current)
        .and_then(|f| f.state.hooks())
        .map(<[_]>::to_vec);
    // State handles name the committed fiber: the wip slot is freed if this
    // render is thrown away.
    let mut scope = Scope::new(lane, fibers.stable_id(wip), &session.contexts, prev);
    let result = component.render(&mut scope, &props);
    let prev = scope.prev.take();
    let next = core::mem::take(&mut scope.next);
    let dependencies = core::mem::take(&mut scope.dependencies);
    let received_update = scope.did_receive_update;
    let skipped = scope.skipped_lanes;
    let has_passive_effect = scope.has_passive_effect;
    let mut misplaced = scope.misplaced;

    if let Some(prev) = prev {
        // A completed render must call every hook the committed one did.
        if misplaced.is_none() && result.is_ok() && next.len() < prev.len() {
            misplaced = Some(next.len());
        }
        if let Some(cur) = fibers.get_mut(current) {
            cur.state = FiberState::Hooks(prev);
        }
    }
    if let Some(index) = misplaced {
        return Err(Interrupt::HookOrder {
            component: component.name().into(),
            index,
        });
    }
    let children = result.map_err(Interrupt::Throw)?;
    if received_update {
        session.did_receive_update = true;
    }

    let fiber = &mut fibers[wip];
    fiber.state = FiberState::Hooks(next);
    fiber.dependencies = dependencies;
    fiber.dependency_lanes = Lanes::NONE;
    fiber.lanes |= skipped;
    if has_passive_effect {
        fiber.flags.insert(Flags::PASSIVE);
    }

    if current != INVALID && !session.did_receive_update {
        fiber.flags.remove(Flags::PASSIVE);
        let cur = &mut fibers[current];
        cur.lanes = cur.lanes.remove(lane);
        return Ok(bailout_on_already_finished_work(fibers, lane, wip));
    }
    reconcile_children(fibers, wip, &children);
    Ok(fibers[wip].child)
}

/// Flags `REF` when the ref must be attached or swapped at commit.
fn mark_ref<I>(fibers: &mut FiberStore<I>, wip: u32) {
    let current = fibers[wip].alternate;
    let fiber = &fibers[wip];
    let changed = match (fibers.get(current), &fiber.node_ref) {
        (None, next) => next.is_some(),
        (Some(cur), next) => match (&cur.node_ref, next) {
            (Some(old), Some(new)) => !old.same(new),
            (None, None) => false,
            _ => true,
        },
    };
    if changed {
        fibers[wip].flags.insert(Flags::REF);
    }
}

/// The value a provider publishes: its `value` prop, else the context
/// default.
pub(crate) fn provided_value(props: &PendingProps, context: &Context) -> Value {
    match props {
        PendingProps::Element(props) => props
            .value
            .clone()
            .unwrap_or_else(|| context.default_value()),
        _ => context.default_value(),
    }
}

fn update_provider<I: Clone>(fibers: &mut FiberStore<I>, session: &mut WorkSession, wip: u32) -> u32 {
    let lane = session.lane;
    let fiber = &fibers[wip];
    let FiberKind::Provider(context) = &fiber.kind else {
        unreachable!("dispatched on kind");
    };
    let context = context.clone();
    let value = provided_value(&fiber.pending_props, &context);
    session.contexts.push(&context, value.clone());

    let next_children = fiber.pending_props.children();
    let previous = fibers
        .get(fiber.alternate)
        .and_then(|cur| cur.memoized_props.as_ref())
        .map(|old| (provided_value(old, &context), old.children()));
    if let Some((old_value, old_children)) = previous {
        if Rc::ptr_eq(&old_value, &value) {
            if old_children.same(&next_children) {
                return bailout_on_already_finished_work(fibers, lane, wip);
            }
        } else {
            propagate_context_change(fibers, wip, &context, lane);
        }
    }
    reconcile_children(fibers, wip, &next_children);
    fibers[wip].child
}

fn suspense_branches<I>(fiber: &Fiber<I>) -> (Node, Node) {
    match &fiber.pending_props {
        PendingProps::Element(props) => (props.children.clone(), props.fallback.clone()),
        _ => (Node::Empty, Node::Empty),
    }
}

/// Allocates a fiber owned by the render in progress under `parent`.
fn insert_child<I>(
    fibers: &mut FiberStore<I>,
    parent: u32,
    kind: FiberKind,
    props: PendingProps,
    index: usize,
) -> u32 {
    let mut fiber = Fiber::new(kind, None, props);
    fiber.parent = parent;
    fiber.index = index;
    fibers.insert_tracked(fiber)
}

/// Renders a suspense boundary.
///
/// The boundary always owns an offscreen wrapper around its primary
/// children. While it shows its fallback the wrapper is kept (hidden, not
/// rendered) and a fragment holding the fallback follows it.
fn update_suspense<I: Clone>(
    fibers: &mut FiberStore<I>,
    session: &mut WorkSession,
    wip: u32,
) -> u32 {
    let fiber = &mut fibers[wip];
    let show_fallback = fiber.flags.contains(Flags::DID_CAPTURE);
    fiber.flags.remove(Flags::DID_CAPTURE);
    fiber.state = FiberState::Suspense {
        showing_fallback: show_fallback,
    };
    session
        .suspense_handlers
        .push(if show_fallback { INVALID } else { wip });

    let (children, fallback) = suspense_branches(&fibers[wip]);
    let current = fibers[wip].alternate;
    let current_primary = fibers.get(current).map_or(INVALID, |f| f.child);
    let current_fallback = fibers.get(current_primary).map_or(INVALID, |f| f.sibling);

    let primary_props = |mode| PendingProps::Offscreen {
        mode,
        children: children.clone(),
    };
    let mode = if show_fallback {
        OffscreenMode::Hidden
    } else {
        OffscreenMode::Visible
    };
    let primary = if current_primary == INVALID {
        insert_child(fibers, wip, FiberKind::Offscreen, primary_props(mode), 0)
    } else {
        let primary = create_alternate(fibers, current_primary, primary_props(mode));
        let f = &mut fibers[primary];
        f.parent = wip;
        f.index = 0;
        f.sibling = INVALID;
        primary
    };
    fibers[wip].child = primary;

    if !show_fallback {
        if current_fallback != INVALID {
            let f = &mut fibers[wip];
            f.deletions.push(current_fallback);
            f.flags.insert(Flags::CHILD_DELETION);
        }
        return primary;
    }

    // The hidden primary is not rendered. Remembering its hidden inputs makes
    // the retry render it again, and the work it still holds at this lane is
    // left to the ping.
    let f = &mut fibers[primary];
    f.memoized_props = Some(f.pending_props.clone());
    f.child_lanes = f.child_lanes.remove(session.lane);
    let fallback_props = PendingProps::Fragment(fallback);
    let fallback = if current_fallback == INVALID {
        let fallback = insert_child(fibers, wip, FiberKind::Fragment, fallback_props, 1);
        if current != INVALID {
            fibers[fallback].flags.insert(Flags::PLACEMENT);
        }
        fallback
    } else {
        let fallback = create_alternate(fibers, current_fallback, fallback_props);
        let f = &mut fibers[fallback];
        f.parent = wip;
        f.index = 1;
        f.sibling = INVALID;
        fallback
    };
    fibers[primary].sibling = fallback;
    fallback
}
