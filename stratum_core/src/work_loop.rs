// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render driver and root scheduling.
//!
//! A render works on one root at one lane. Its progress lives in a
//! [`WorkSession`] owned by the reconciler: the unit of work to perform
//! next, the context and suspense-handler stacks, and retry bookkeeping. A
//! render that yields keeps its session and resumes on the next call at the
//! same root and lane; a call for any other root or lane throws the
//! in-progress work away and starts over from the root.
//!
//! ```text
//!   in progress ──yield──► interrupted ──resume──► in progress
//!        │
//!        ├── root completed ──────────► completed ──► commit
//!        ├── suspended, no boundary ──► aborted (lane parked until pinged)
//!        └── retries exhausted ───────► failed (RenderFailed returned)
//! ```

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::begin::begin_work;
use crate::complete::complete_work;
use crate::context::ContextStack;
use crate::error::{ComponentError, HostError, ReconcileError};
use crate::fiber::{FiberKind, INVALID, PendingProps, create_alternate};
use crate::flags::Flags;
use crate::host::HostConfig;
use crate::lane::Lanes;
use crate::reconciler::Reconciler;
use crate::root::RootId;
use crate::scheduler::{Microtask, Task, TaskKind, TaskStatus, TimeSlicer};
use crate::suspense::{Awaitable, Throw, attach_ping_listener, nearest_boundary, unwind_work};
use crate::trace::{RenderBeginEvent, RenderEndEvent, RenderErrorEvent, ScheduleEvent, ScheduleKind, SuspendEvent};

#[cfg(feature = "trace-rich")]
use crate::trace::{UnitEvent, UnitStep};

/// Where a render pass stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderStatus {
    /// Units of work remain and the pass has not stopped.
    InProgress,
    /// The pass yielded to the time slicer; it resumes at the same lane.
    Interrupted,
    /// The whole tree was rendered and is ready to commit.
    Completed,
    /// A suspension found no boundary; nothing is committed.
    Aborted,
    /// A component kept failing past the retry budget.
    Failed,
}

/// Why a unit of work stopped early.
pub(crate) enum Interrupt {
    Throw(Throw),
    Host(HostError),
    /// A component called its hooks differently than on its committed
    /// render.
    HookOrder { component: String, index: usize },
}

/// State of the render in progress.
pub(crate) struct WorkSession {
    pub(crate) root: Option<RootId>,
    /// The work-in-progress root fiber.
    pub(crate) root_fiber: u32,
    /// The next unit of work, or [`INVALID`] when the pass is over.
    pub(crate) wip: u32,
    pub(crate) lane: Lanes,
    pub(crate) status: RenderStatus,
    pub(crate) contexts: ContextStack,
    /// Boundaries able to capture, innermost last; [`INVALID`] marks a
    /// boundary already showing its fallback.
    pub(crate) suspense_handlers: Vec<u32>,
    pub(crate) did_receive_update: bool,
    pub(crate) retries: u32,
    pub(crate) units: u32,
}

impl WorkSession {
    pub(crate) fn new(lane: Lanes) -> Self {
        Self {
            root: None,
            root_fiber: INVALID,
            wip: INVALID,
            lane,
            status: RenderStatus::InProgress,
            contexts: ContextStack::default(),
            suspense_handlers: Vec::new(),
            did_receive_update: false,
            retries: 0,
            units: 0,
        }
    }

    /// Starts over at `root_fiber`, keeping the stacks' allocations.
    fn reset(&mut self, root: RootId, root_fiber: u32, lane: Lanes) {
        let mut contexts = core::mem::take(&mut self.contexts);
        let mut suspense_handlers = core::mem::take(&mut self.suspense_handlers);
        contexts.clear();
        suspense_handlers.clear();
        *self = Self {
            root: Some(root),
            root_fiber,
            wip: root_fiber,
            contexts,
            suspense_handlers,
            ..Self::new(lane)
        };
    }
}

/// Roots with sync-lane work, flushed at the microtask boundary.
#[derive(Debug, Default)]
pub(crate) struct SyncQueue {
    pub(crate) roots: Vec<RootId>,
    pub(crate) flushing: bool,
    pub(crate) microtask_scheduled: bool,
}

impl<H: HostConfig, S: TimeSlicer> Reconciler<H, S> {
    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Records `lane` on `fiber`, its alternate, and the child lanes of every
    /// ancestor, returning the root it belongs to.
    pub(crate) fn mark_update_lane_from_fiber_to_root(
        &mut self,
        fiber: u32,
        lane: Lanes,
    ) -> Option<RootId> {
        let f = self.fibers.get_mut(fiber)?;
        f.lanes |= lane;
        let alternate = f.alternate;
        if let Some(alt) = self.fibers.get_mut(alternate) {
            alt.lanes |= lane;
        }

        let mut node = fiber;
        for _ in 0..=self.fibers.len() {
            let f = self.fibers.get(node)?;
            if let FiberKind::Root(id) = f.kind {
                return Some(id);
            }
            let parent = f.parent;
            let p = self.fibers.get_mut(parent)?;
            p.child_lanes |= lane;
            let alternate = p.alternate;
            if let Some(alt) = self.fibers.get_mut(alternate) {
                alt.child_lanes |= lane;
            }
            node = parent;
        }
        None
    }

    pub(crate) fn schedule_update_on_fiber(&mut self, fiber: u32, lane: Lanes) -> Option<RootId> {
        let id = self.mark_update_lane_from_fiber_to_root(fiber, lane)?;
        self.roots[id.0 as usize].mark_updated(lane);
        self.ensure_root_is_scheduled(id);
        Some(id)
    }

    /// Makes sure the root has exactly one callback registered, for its
    /// next lane.
    pub(crate) fn ensure_root_is_scheduled(&mut self, id: RootId) {
        let root = &mut self.roots[id.0 as usize];
        let next = root.next_lane();
        let existing = root.callback_priority;
        if next.is_empty() {
            if let Some(handle) = root.callback_node.take() {
                self.slicer.cancel(handle);
            }
            root.callback_priority = Lanes::NONE;
            if !existing.is_empty() {
                self.trace(move |t, seq| {
                    t.schedule(&ScheduleEvent {
                        seq,
                        root: id,
                        lane: existing,
                        kind: ScheduleKind::Cancel,
                    });
                });
            }
            return;
        }
        if next == existing {
            return;
        }
        if let Some(handle) = root.callback_node.take() {
            self.slicer.cancel(handle);
        }
        root.callback_priority = next;

        let kind = if next == Lanes::SYNC {
            if !self.sync_queue.roots.contains(&id) {
                self.sync_queue.roots.push(id);
            }
            if !self.sync_queue.microtask_scheduled {
                self.sync_queue.microtask_scheduled = true;
                self.host.schedule_microtask(Microtask::FlushSyncWork);
            }
            ScheduleKind::Sync
        } else {
            let level = next.to_priority();
            let handle = self.slicer.schedule(
                level,
                Task {
                    root: id,
                    kind: TaskKind::Render,
                },
            );
            self.roots[id.0 as usize].callback_node = Some(handle);
            ScheduleKind::Task(level)
        };
        self.trace(move |t, seq| {
            t.schedule(&ScheduleEvent {
                seq,
                root: id,
                lane: next,
                kind,
            });
        });
    }

    /// Drains the sync queue.
    ///
    /// Roots queued while draining are processed in the same call. A nested
    /// call (from inside a flush) returns immediately.
    pub(crate) fn flush_sync_callbacks(&mut self) -> Result<(), ReconcileError> {
        self.sync_queue.microtask_scheduled = false;
        if self.sync_queue.flushing {
            return Ok(());
        }
        self.sync_queue.flushing = true;
        let mut result = Ok(());
        while !self.sync_queue.roots.is_empty() {
            let queued = core::mem::take(&mut self.sync_queue.roots);
            for id in queued {
                if let Err(err) = self.perform_sync_work_on_root(id)
                    && result.is_ok()
                {
                    result = Err(err);
                }
            }
        }
        self.sync_queue.flushing = false;
        result
    }

    pub(crate) fn perform_sync_work_on_root(&mut self, id: RootId) -> Result<(), ReconcileError> {
        self.flush_passive_effects_on_root(id);
        let lane = self.roots[id.0 as usize].next_lane();
        if lane != Lanes::SYNC {
            self.ensure_root_is_scheduled(id);
            return Ok(());
        }
        let status = self.render_and_finish(id, lane, false)?;
        debug_assert_ne!(status, RenderStatus::Interrupted, "sync renders never yield");
        self.ensure_root_is_scheduled(id);
        Ok(())
    }

    pub(crate) fn perform_concurrent_work_on_root(
        &mut self,
        id: RootId,
        did_timeout: bool,
    ) -> Result<TaskStatus, ReconcileError> {
        let original = self.roots[id.0 as usize].callback_node;
        if self.flush_passive_effects_on_root(id)
            && self.roots[id.0 as usize].callback_node != original
        {
            return Ok(TaskStatus::Done);
        }
        let lane = self.roots[id.0 as usize].next_lane();
        if lane.is_empty() {
            return Ok(TaskStatus::Done);
        }
        let sliced = self.config.time_slicing && !did_timeout && lane != Lanes::SYNC;
        self.render_and_finish(id, lane, sliced)?;
        self.ensure_root_is_scheduled(id);
        let root = &self.roots[id.0 as usize];
        if original.is_some() && root.callback_node == original {
            return Ok(TaskStatus::Continue);
        }
        Ok(TaskStatus::Done)
    }

    /// Renders and acts on the outcome: commits a completed tree, parks an
    /// aborted lane until it is pinged, and parks a failed lane until the
    /// next update.
    ///
    /// A failure in either phase also drops the root's callback, so the
    /// next update at the same lane is scheduled afresh.
    fn render_and_finish(
        &mut self,
        id: RootId,
        lane: Lanes,
        sliced: bool,
    ) -> Result<RenderStatus, ReconcileError> {
        let outcome = self.render_root(id, lane, sliced).and_then(|status| {
            match status {
                RenderStatus::Completed => {
                    let root = &mut self.roots[id.0 as usize];
                    root.finished_work = self.session.root_fiber;
                    root.finished_lane = lane;
                    self.commit_root(id)?;
                }
                RenderStatus::Aborted => self.roots[id.0 as usize].mark_suspended(lane),
                RenderStatus::InProgress | RenderStatus::Interrupted | RenderStatus::Failed => {}
            }
            Ok(status)
        });
        if outcome.is_err() {
            self.roots[id.0 as usize].mark_suspended(lane);
            self.ensure_root_is_scheduled(id);
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Render
    // -----------------------------------------------------------------------

    fn prepare_fresh_stack(&mut self, id: RootId, lane: Lanes) {
        self.fibers.discard_pending();
        let root = &mut self.roots[id.0 as usize];
        root.finished_work = INVALID;
        root.finished_lane = Lanes::NONE;
        let current = root.current;
        let wip = create_alternate(&mut self.fibers, current, PendingProps::Root);
        self.session.reset(id, wip, lane);
    }

    fn abandon_render(&mut self) {
        self.session.wip = INVALID;
        self.session.status = RenderStatus::Failed;
        self.fibers.discard_pending();
    }

    /// Runs a render pass for `id` at `lane`.
    pub(crate) fn render_root(
        &mut self,
        id: RootId,
        lane: Lanes,
        sliced: bool,
    ) -> Result<RenderStatus, ReconcileError> {
        let fresh = self.session.root != Some(id)
            || self.session.lane != lane
            || self.session.wip == INVALID;
        if fresh {
            self.prepare_fresh_stack(id, lane);
        }
        self.trace(move |t, seq| {
            t.render_begin(&RenderBeginEvent {
                seq,
                root: id,
                lane,
                fresh,
            });
        });

        loop {
            let pass = if sliced {
                self.work_loop_concurrent()
            } else {
                self.work_loop_sync()
            };
            match pass {
                Ok(()) => break,
                Err(Interrupt::Throw(Throw::Suspended(awaitable))) => {
                    self.throw_and_unwind(id, lane, &awaitable);
                }
                Err(Interrupt::Throw(Throw::Failed(reason))) => {
                    self.session.retries += 1;
                    let attempt = self.session.retries;
                    self.trace(move |t, seq| {
                        t.render_error(&RenderErrorEvent {
                            seq,
                            root: id,
                            lane,
                            attempt,
                        });
                    });
                    if attempt > self.config.max_render_retries {
                        return Err(self.fail_render(id, lane, reason));
                    }
                }
                Err(Interrupt::Host(err)) => {
                    self.abandon_render();
                    self.trace_render_end(id, lane);
                    return Err(err.into());
                }
                Err(Interrupt::HookOrder { component, index }) => {
                    self.abandon_render();
                    self.trace_render_end(id, lane);
                    return Err(ReconcileError::HookOrder { component, index });
                }
            }
        }

        let status = match self.session.status {
            RenderStatus::Aborted => RenderStatus::Aborted,
            RenderStatus::Completed => RenderStatus::Completed,
            _ if self.session.wip != INVALID => RenderStatus::Interrupted,
            other => other,
        };
        self.session.status = status;
        self.trace_render_end(id, lane);
        Ok(status)
    }

    fn fail_render(&mut self, id: RootId, lane: Lanes, reason: ComponentError) -> ReconcileError {
        let attempts = self.session.retries;
        self.abandon_render();
        self.trace_render_end(id, lane);
        ReconcileError::RenderFailed {
            lane,
            attempts,
            reason,
        }
    }

    fn trace_render_end(&mut self, id: RootId, lane: Lanes) {
        let status = self.session.status;
        let units = self.session.units;
        self.trace(move |t, seq| {
            t.render_end(&RenderEndEvent {
                seq,
                root: id,
                lane,
                status,
                units,
            });
        });
    }

    fn work_loop_sync(&mut self) -> Result<(), Interrupt> {
        while self.session.wip != INVALID {
            self.perform_unit_of_work()?;
        }
        Ok(())
    }

    fn work_loop_concurrent(&mut self) -> Result<(), Interrupt> {
        while self.session.wip != INVALID && !self.slicer.should_yield() {
            self.perform_unit_of_work()?;
        }
        Ok(())
    }

    fn perform_unit_of_work(&mut self) -> Result<(), Interrupt> {
        let unit = self.session.wip;
        #[cfg(feature = "trace-rich")]
        self.trace_unit(unit, UnitStep::Begin);

        let next = begin_work(&mut self.fibers, &mut self.session, unit)?;
        let fiber = &mut self.fibers[unit];
        fiber.memoized_props = Some(fiber.pending_props.clone());
        self.session.units += 1;
        if next == INVALID {
            self.complete_unit_of_work(unit)?;
        } else {
            self.session.wip = next;
        }
        Ok(())
    }

    fn complete_unit_of_work(&mut self, unit: u32) -> Result<(), Interrupt> {
        let mut node = unit;
        loop {
            complete_work(&mut self.fibers, &mut self.host, &mut self.session, node)
                .map_err(Interrupt::Host)?;
            #[cfg(feature = "trace-rich")]
            self.trace_unit(node, UnitStep::Complete);

            if node == self.session.root_fiber {
                debug_assert_eq!(self.session.contexts.len(), 0, "unbalanced provider pushes");
                self.session.wip = INVALID;
                self.session.status = RenderStatus::Completed;
                return Ok(());
            }
            let fiber = &self.fibers[node];
            if fiber.sibling != INVALID {
                self.session.wip = fiber.sibling;
                return Ok(());
            }
            node = fiber.parent;
            self.session.wip = node;
        }
    }

    #[cfg(feature = "trace-rich")]
    fn trace_unit(&mut self, fiber: u32, step: UnitStep) {
        let tag = self.fibers[fiber].kind.tag();
        self.trace(move |t, seq| {
            t.unit(&UnitEvent {
                seq,
                fiber_index: fiber,
                tag,
                step,
            });
        });
    }

    // -----------------------------------------------------------------------
    // Suspension
    // -----------------------------------------------------------------------

    /// Handles a suspension raised by the current unit: registers the ping,
    /// marks the nearest boundary, and unwinds to it (or to the root).
    fn throw_and_unwind(&mut self, id: RootId, lane: Lanes, awaitable: &Awaitable) {
        let unit = self.session.wip;
        let boundary = nearest_boundary(&self.session.suspense_handlers);
        let mut retry = vec![self.fibers.stable_id(unit)];
        if let Some(boundary) = boundary {
            retry.push(self.fibers.stable_id(boundary));
            self.fibers[boundary].flags.insert(Flags::SHOULD_CAPTURE);
        }
        attach_ping_listener(
            &mut self.roots[id.0 as usize],
            id,
            &self.pings,
            awaitable,
            lane,
            &retry,
        );
        let awaitable = awaitable.id();
        let captured = boundary.is_some();
        self.trace(move |t, seq| {
            t.suspend(&SuspendEvent {
                seq,
                root: id,
                lane,
                awaitable,
                captured,
            });
        });
        self.unwind_unit_of_work(unit);
    }

    /// Walks from `unit` towards the root, undoing stack pushes and dropping
    /// deletions recorded by the abandoned subtree, until a boundary captures.
    fn unwind_unit_of_work(&mut self, unit: u32) {
        let mut node = unit;
        loop {
            #[cfg(feature = "trace-rich")]
            self.trace_unit(node, UnitStep::Unwind);
            let session = &mut self.session;
            if let Some(boundary) = unwind_work(
                &mut self.fibers,
                node,
                &mut session.suspense_handlers,
                &mut session.contexts,
            ) {
                self.session.wip = boundary;
                return;
            }
            let parent = self.fibers[node].parent;
            if node == self.session.root_fiber || parent == INVALID {
                self.session.wip = INVALID;
                self.session.status = RenderStatus::Aborted;
                return;
            }
            let p = &mut self.fibers[parent];
            p.deletions.clear();
            p.flags.remove(Flags::CHILD_DELETION);
            p.subtree_flags = Flags::NONE;
            node = parent;
        }
    }
}
