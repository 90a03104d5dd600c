// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-root lane bookkeeping.
//!
//! A [`FiberRoot`] owns the only cross-call shared mutable state of a tree:
//! the pending, suspended, and pinged lane sets, the scheduled callback and
//! its lane, the ping cache, and the passive effects waiting for their flush.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::fiber::{FiberId, INVALID};
use crate::hooks::EffectHook;
use crate::lane::Lanes;
use crate::scheduler::TaskHandle;
use crate::suspense::AwaitableId;

/// A handle to a root created by
/// [`Reconciler::create_root_container`](crate::reconciler::Reconciler::create_root_container).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(pub u32);

impl fmt::Debug for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootId({})", self.0)
    }
}

/// Lanes waiting on one awaitable, plus the fibers to retry when it settles.
#[derive(Debug, Default)]
pub(crate) struct PingEntry {
    pub(crate) lanes: Lanes,
    pub(crate) retry: Vec<FiberId>,
}

/// Effect lists collected by commit and run by the passive flush.
#[derive(Default)]
pub(crate) struct PendingPassive {
    /// Effects of deleted function components; only their destroy runs.
    pub(crate) unmount: Vec<Vec<EffectHook>>,
    /// Effects of committed function components carrying `PASSIVE`.
    pub(crate) update: Vec<Vec<EffectHook>>,
}

impl PendingPassive {
    pub(crate) fn is_empty(&self) -> bool {
        self.unmount.is_empty() && self.update.is_empty()
    }
}

/// The root of one reconciled tree.
pub struct FiberRoot<I> {
    pub(crate) container: I,
    pub(crate) current: u32,
    pub(crate) finished_work: u32,
    pub(crate) finished_lane: Lanes,
    pub(crate) pending_lanes: Lanes,
    pub(crate) suspended_lanes: Lanes,
    pub(crate) pinged_lanes: Lanes,
    pub(crate) callback_node: Option<TaskHandle>,
    pub(crate) callback_priority: Lanes,
    pub(crate) ping_cache: BTreeMap<AwaitableId, PingEntry>,
    pub(crate) pending_passive: PendingPassive,
    pub(crate) passive_scheduled: bool,
}

impl<I> FiberRoot<I> {
    pub(crate) fn new(container: I, current: u32) -> Self {
        Self {
            container,
            current,
            finished_work: INVALID,
            finished_lane: Lanes::NONE,
            pending_lanes: Lanes::NONE,
            suspended_lanes: Lanes::NONE,
            pinged_lanes: Lanes::NONE,
            callback_node: None,
            callback_priority: Lanes::NONE,
            ping_cache: BTreeMap::new(),
            pending_passive: PendingPassive::default(),
            passive_scheduled: false,
        }
    }

    /// The host container the tree is mounted into.
    #[must_use]
    pub fn container(&self) -> &I {
        &self.container
    }

    /// Lanes with unfinished updates.
    #[must_use]
    pub fn pending_lanes(&self) -> Lanes {
        self.pending_lanes
    }

    /// Pending lanes whose last render suspended without a boundary.
    #[must_use]
    pub fn suspended_lanes(&self) -> Lanes {
        self.suspended_lanes
    }

    /// Suspended lanes whose awaitable has since settled.
    #[must_use]
    pub fn pinged_lanes(&self) -> Lanes {
        self.pinged_lanes
    }

    /// The lane of the currently scheduled callback, or [`Lanes::NONE`].
    #[must_use]
    pub fn callback_priority(&self) -> Lanes {
        self.callback_priority
    }

    /// Returns `true` while a passive effect flush is scheduled.
    #[must_use]
    pub fn has_pending_passive_effects(&self) -> bool {
        self.passive_scheduled
    }

    /// Records a new update at `lane`.
    ///
    /// Any non-idle update may unblock a suspended render, so suspended and
    /// pinged lanes are forgotten and retried.
    pub(crate) fn mark_updated(&mut self, lane: Lanes) {
        self.pending_lanes |= lane;
        if lane != Lanes::IDLE {
            self.suspended_lanes = Lanes::NONE;
            self.pinged_lanes = Lanes::NONE;
        }
    }

    pub(crate) fn mark_suspended(&mut self, lane: Lanes) {
        self.suspended_lanes |= lane;
        self.pinged_lanes = self.pinged_lanes.remove(lane);
    }

    pub(crate) fn mark_pinged(&mut self, lane: Lanes) {
        self.pinged_lanes |= self.suspended_lanes & lane;
        self.pending_lanes |= lane;
    }

    pub(crate) fn mark_finished(&mut self, lane: Lanes) {
        self.pending_lanes = self.pending_lanes.remove(lane);
        self.suspended_lanes = self.suspended_lanes.remove(lane);
        self.pinged_lanes = self.pinged_lanes.remove(lane);
    }

    /// The lane the next render should work on.
    ///
    /// Prefers pending lanes that are not suspended; falls back to suspended
    /// lanes that have been pinged.
    #[must_use]
    pub fn next_lane(&self) -> Lanes {
        let unblocked = self.pending_lanes.remove(self.suspended_lanes);
        if !unblocked.is_empty() {
            return unblocked.highest_priority();
        }
        (self.pending_lanes & self.pinged_lanes).highest_priority()
    }
}

impl<I: fmt::Debug> fmt::Debug for FiberRoot<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberRoot")
            .field("container", &self.container)
            .field("current", &self.current)
            .field("pending_lanes", &self.pending_lanes)
            .field("suspended_lanes", &self.suspended_lanes)
            .field("pinged_lanes", &self.pinged_lanes)
            .field("callback_node", &self.callback_node)
            .field("callback_priority", &self.callback_priority)
            .finish_non_exhaustive()
    }
}
