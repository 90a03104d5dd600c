// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Context value stack and consumer invalidation.

use alloc::vec;
use alloc::vec::Vec;

use crate::element::{Context, Value};
use crate::fiber::{FiberKind, FiberStore, INVALID};
use crate::lane::Lanes;

/// Values pushed by the providers on the path from the root to the fiber
/// being rendered.
///
/// Providers push in begin and pop in complete (or in unwind), so the stack
/// always mirrors the ancestors of the current unit of work.
#[derive(Default)]
pub(crate) struct ContextStack {
    entries: Vec<(Context, Value)>,
}

impl ContextStack {
    pub(crate) fn push(&mut self, context: &Context, value: Value) {
        self.entries.push((context.clone(), value));
    }

    pub(crate) fn pop(&mut self) {
        assert!(self.entries.pop().is_some(), "context stack underflow");
    }

    /// The innermost provided value, or the context default.
    pub(crate) fn read(&self, context: &Context) -> Value {
        self.entries
            .iter()
            .rev()
            .find(|(c, _)| c.same(context))
            .map_or_else(|| context.default_value(), |(_, v)| v.clone())
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Schedules `lane` on every fiber below `provider` that read `context`.
///
/// Consumers get the lane on themselves and their alternate, and every
/// ancestor up to the provider gets it in its child lanes, so the render
/// reaches them through bailouts. Descent stops at nested providers of the
/// same context, which shadow the changed value.
pub(crate) fn propagate_context_change<I>(
    fibers: &mut FiberStore<I>,
    provider: u32,
    context: &Context,
    lane: Lanes,
) -> usize {
    let provider_alternate = fibers[provider].alternate;
    let mut marked = 0;
    let mut stack = vec![fibers[provider].child];
    while let Some(idx) = stack.pop() {
        let Some(fiber) = fibers.get(idx) else {
            continue;
        };
        stack.push(fiber.sibling);
        if matches!(&fiber.kind, FiberKind::Provider(c) if c.same(context)) {
            continue;
        }
        stack.push(fiber.child);
        if !fiber.dependencies.iter().any(|c| c.same(context)) {
            continue;
        }

        let parent = fiber.parent;
        let alternate = fiber.alternate;
        for target in [idx, alternate] {
            if let Some(f) = fibers.get_mut(target) {
                f.lanes |= lane;
                f.dependency_lanes |= lane;
            }
        }
        mark_child_lanes(fibers, parent, lane, [provider, provider_alternate]);
        marked += 1;
    }
    marked
}

fn mark_child_lanes<I>(fibers: &mut FiberStore<I>, mut cursor: u32, lane: Lanes, stop: [u32; 2]) {
    while cursor != INVALID {
        let Some(fiber) = fibers.get_mut(cursor) else {
            return;
        };
        fiber.child_lanes |= lane;
        let parent = fiber.parent;
        let alternate = fiber.alternate;
        if let Some(alt) = fibers.get_mut(alternate) {
            alt.child_lanes |= lane;
        }
        if stop.contains(&cursor) {
            return;
        }
        cursor = parent;
    }
}
