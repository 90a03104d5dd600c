// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The complete phase of a unit of work.
//!
//! Completion runs once all of a fiber's children are complete. It builds
//! detached host nodes for newly mounted host fibers (appending the nearest
//! host descendants to them), flags host updates, pops the stack entries
//! pushed by begin, and bubbles child effects and lanes into the fiber.

use crate::element::Props;
use crate::error::HostError;
use crate::fiber::{FiberKind, FiberStore, INVALID, PendingProps};
use crate::flags::Flags;
use crate::host::HostConfig;
use crate::lane::Lanes;
use crate::work_loop::WorkSession;

/// Completes `wip`.
pub(crate) fn complete_work<H: HostConfig>(
    fibers: &mut FiberStore<H::Instance>,
    host: &mut H,
    session: &mut WorkSession,
    wip: u32,
) -> Result<(), HostError> {
    let current = fibers[wip].alternate;
    match fibers[wip].kind.clone() {
        FiberKind::HostElement(tag) => {
            let PendingProps::Element(props) = fibers[wip].pending_props.clone() else {
                panic!("host element {wip} without element props");
            };
            if fibers.get(current).is_some() && fibers[wip].instance.is_some() {
                if let Some(PendingProps::Element(old)) = &fibers[current].memoized_props
                    && props_differ(old, &props)
                {
                    fibers[wip].flags.insert(Flags::UPDATE);
                }
            } else {
                let instance = host.create_node(&tag, &props);
                append_all_children(fibers, host, &instance, wip)?;
                fibers[wip].instance = Some(instance);
            }
        }
        FiberKind::HostText => {
            let PendingProps::Text(content) = fibers[wip].pending_props.clone() else {
                panic!("host text {wip} without text");
            };
            if fibers.get(current).is_some() && fibers[wip].instance.is_some() {
                if let Some(PendingProps::Text(old)) = &fibers[current].memoized_props
                    && **old != *content
                {
                    fibers[wip].flags.insert(Flags::UPDATE);
                }
            } else {
                let instance = host.create_text_node(&content);
                fibers[wip].instance = Some(instance);
            }
        }
        FiberKind::Provider(_) => session.contexts.pop(),
        FiberKind::Suspense => {
            session.suspense_handlers.pop();
            let showing = fibers[wip].state.showing_fallback();
            let was_showing = fibers
                .get(current)
                .is_some_and(|f| f.state.showing_fallback());
            let primary = fibers[wip].child;
            if showing != was_showing
                && let Some(primary) = fibers.get_mut(primary)
            {
                primary.flags.insert(Flags::VISIBILITY);
            }
        }
        FiberKind::Root(_) | FiberKind::Function(_) | FiberKind::Fragment | FiberKind::Offscreen => {}
    }
    bubble_properties(fibers, wip);
    Ok(())
}

fn props_differ(old: &Props, new: &Props) -> bool {
    !core::ptr::eq(old, new) && old.attrs != new.attrs
}

/// Appends the top-level host nodes of `wip`'s subtree to `parent`.
///
/// Descends through non-host fibers and stops at host fibers, whose own
/// descendants were appended when they completed.
fn append_all_children<H: HostConfig>(
    fibers: &FiberStore<H::Instance>,
    host: &mut H,
    parent: &H::Instance,
    wip: u32,
) -> Result<(), HostError> {
    let mut node = fibers[wip].child;
    while node != INVALID {
        let fiber = &fibers[node];
        if fiber.kind.is_host() {
            if let Some(instance) = &fiber.instance {
                host.append_child(parent, instance)?;
            }
        } else if fiber.child != INVALID {
            node = fiber.child;
            continue;
        }
        loop {
            if node == wip {
                return Ok(());
            }
            let fiber = &fibers[node];
            if fiber.sibling != INVALID {
                node = fiber.sibling;
                break;
            }
            node = fiber.parent;
            if node == INVALID {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Folds the children's flags and lanes into `wip` and points every child
/// back at it.
pub(crate) fn bubble_properties<I>(fibers: &mut FiberStore<I>, wip: u32) {
    let mut subtree_flags = Flags::NONE;
    let mut child_lanes = Lanes::NONE;
    let mut child = fibers[wip].child;
    while let Some(c) = fibers.get_mut(child) {
        subtree_flags |= c.flags | c.subtree_flags;
        child_lanes |= c.lanes | c.child_lanes;
        c.parent = wip;
        child = c.sibling;
    }
    let fiber = &mut fibers[wip];
    fiber.subtree_flags = subtree_flags;
    fiber.child_lanes = child_lanes;
}
