// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the work loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! reconciler calls as it schedules, renders, commits, and flushes effects.
//! All method bodies default to no-ops, so implementing only the events you
//! care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! The core has no clock. Every event instead carries a `seq` number that the
//! reconciler increments per event, so sinks can order and space events.
//!
//! # Crate features
//!
//! - `trace` enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) gates per-unit [`UnitEvent`]s plus the
//!   corresponding `TraceSink` method.

use alloc::rc::Rc;
use core::cell::RefCell;

use crate::lane::Lanes;
use crate::root::RootId;
use crate::scheduler::PriorityLevel;
use crate::suspense::AwaitableId;
use crate::work_loop::RenderStatus;

#[cfg(feature = "trace-rich")]
use crate::fiber::WorkTag;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a root was scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    /// Queued on the sync queue, flushed at the microtask boundary.
    Sync,
    /// Registered with the time slicer at the given priority.
    Task(PriorityLevel),
    /// Registered a passive effect flush.
    Passive,
    /// Cancelled the outstanding callback; nothing left to do.
    Cancel,
}

/// Which side of a commit an event marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommitPhase {
    /// Before the first host mutation.
    Begin,
    /// After the tree flip and layout effects.
    End,
}

/// Which step of a unit of work an event marks.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitStep {
    /// The unit's begin phase ran.
    Begin,
    /// The unit's complete phase ran.
    Complete,
    /// The unit was unwound after a suspension.
    Unwind,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Host mutations performed by one commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Insertions and moves.
    pub placements: u32,
    /// Prop and text updates.
    pub updates: u32,
    /// Removed host subtrees.
    pub deletions: u32,
    /// Hide/show toggles.
    pub visibility: u32,
}

impl CommitStats {
    /// Total number of host mutations.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.placements + self.updates + self.deletions + self.visibility
    }
}

/// Emitted when a render pass starts or resumes.
#[derive(Clone, Copy, Debug)]
pub struct RenderBeginEvent {
    /// Event sequence number.
    pub seq: u64,
    /// The root being rendered.
    pub root: RootId,
    /// The render lane.
    pub lane: Lanes,
    /// Whether the pass restarted from the root instead of resuming.
    pub fresh: bool,
}

/// Emitted when a render pass stops.
#[derive(Clone, Copy, Debug)]
pub struct RenderEndEvent {
    /// Event sequence number.
    pub seq: u64,
    /// The root being rendered.
    pub root: RootId,
    /// The render lane.
    pub lane: Lanes,
    /// Why the pass stopped.
    pub status: RenderStatus,
    /// Units of work performed in this pass.
    pub units: u32,
}

/// Emitted when a unit of work suspends.
#[derive(Clone, Copy, Debug)]
pub struct SuspendEvent {
    /// Event sequence number.
    pub seq: u64,
    /// The root being rendered.
    pub root: RootId,
    /// The render lane.
    pub lane: Lanes,
    /// The awaitable the unit waits on.
    pub awaitable: AwaitableId,
    /// Whether a suspense boundary captured the suspension.
    pub captured: bool,
}

/// Emitted when a settled awaitable pings its root.
#[derive(Clone, Copy, Debug)]
pub struct PingEvent {
    /// Event sequence number.
    pub seq: u64,
    /// The pinged root.
    pub root: RootId,
    /// The lane that becomes renderable again.
    pub lane: Lanes,
    /// The awaitable that settled.
    pub awaitable: AwaitableId,
}

/// Marks the beginning or end of a commit.
#[derive(Clone, Copy, Debug)]
pub struct CommitEvent {
    /// Event sequence number.
    pub seq: u64,
    /// The committed root.
    pub root: RootId,
    /// The committed lane.
    pub lane: Lanes,
    /// Begin or end.
    pub phase: CommitPhase,
    /// Mutations performed; zero on [`CommitPhase::Begin`].
    pub stats: CommitStats,
}

/// Emitted after a passive effect flush.
#[derive(Clone, Copy, Debug)]
pub struct PassiveFlushEvent {
    /// Event sequence number.
    pub seq: u64,
    /// The flushed root.
    pub root: RootId,
    /// Destroy callbacks run for unmounted components.
    pub unmounts: u32,
    /// Destroy callbacks run for updated effects.
    pub destroys: u32,
    /// Create callbacks run.
    pub creates: u32,
}

/// Emitted whenever the root's scheduled callback changes.
#[derive(Clone, Copy, Debug)]
pub struct ScheduleEvent {
    /// Event sequence number.
    pub seq: u64,
    /// The scheduled root.
    pub root: RootId,
    /// The lane the callback renders.
    pub lane: Lanes,
    /// What was scheduled.
    pub kind: ScheduleKind,
}

/// Emitted each time a render raises a component error.
#[derive(Clone, Copy, Debug)]
pub struct RenderErrorEvent {
    /// Event sequence number.
    pub seq: u64,
    /// The root being rendered.
    pub root: RootId,
    /// The render lane.
    pub lane: Lanes,
    /// Attempt number, starting at 1.
    pub attempt: u32,
}

/// A per-unit record.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct UnitEvent {
    /// Event sequence number.
    pub seq: u64,
    /// Slot index of the fiber.
    pub fiber_index: u32,
    /// Kind of the fiber.
    pub tag: WorkTag,
    /// What happened to it.
    pub step: UnitStep,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the reconciler.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a render pass starts or resumes.
    fn on_render_begin(&mut self, e: &RenderBeginEvent) {
        _ = e;
    }

    /// Called when a render pass stops.
    fn on_render_end(&mut self, e: &RenderEndEvent) {
        _ = e;
    }

    /// Called when a unit suspends.
    fn on_suspend(&mut self, e: &SuspendEvent) {
        _ = e;
    }

    /// Called when an awaitable pings a root.
    fn on_ping(&mut self, e: &PingEvent) {
        _ = e;
    }

    /// Called at the beginning and end of a commit.
    fn on_commit(&mut self, e: &CommitEvent) {
        _ = e;
    }

    /// Called after a passive effect flush.
    fn on_passive_flush(&mut self, e: &PassiveFlushEvent) {
        _ = e;
    }

    /// Called when a root's callback is scheduled or cancelled.
    fn on_schedule(&mut self, e: &ScheduleEvent) {
        _ = e;
    }

    /// Called when a render attempt fails.
    fn on_render_error(&mut self, e: &RenderErrorEvent) {
        _ = e;
    }

    /// Called per unit of work (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_unit(&mut self, e: &UnitEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

/// Shares a sink with the reconciler so its contents stay reachable from the
/// embedder.
impl<T: TraceSink + ?Sized> TraceSink for Rc<RefCell<T>> {
    fn on_render_begin(&mut self, e: &RenderBeginEvent) {
        self.borrow_mut().on_render_begin(e);
    }

    fn on_render_end(&mut self, e: &RenderEndEvent) {
        self.borrow_mut().on_render_end(e);
    }

    fn on_suspend(&mut self, e: &SuspendEvent) {
        self.borrow_mut().on_suspend(e);
    }

    fn on_ping(&mut self, e: &PingEvent) {
        self.borrow_mut().on_ping(e);
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.borrow_mut().on_commit(e);
    }

    fn on_passive_flush(&mut self, e: &PassiveFlushEvent) {
        self.borrow_mut().on_passive_flush(e);
    }

    fn on_schedule(&mut self, e: &ScheduleEvent) {
        self.borrow_mut().on_schedule(e);
    }

    fn on_render_error(&mut self, e: &RenderErrorEvent) {
        self.borrow_mut().on_render_error(e);
    }

    #[cfg(feature = "trace-rich")]
    fn on_unit(&mut self, e: &UnitEvent) {
        self.borrow_mut().on_unit(e);
    }
}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`RenderBeginEvent`].
    #[inline]
    pub fn render_begin(&mut self, e: &RenderBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_render_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RenderEndEvent`].
    #[inline]
    pub fn render_end(&mut self, e: &RenderEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_render_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SuspendEvent`].
    #[inline]
    pub fn suspend(&mut self, e: &SuspendEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_suspend(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PingEvent`].
    #[inline]
    pub fn ping(&mut self, e: &PingEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_ping(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CommitEvent`].
    #[inline]
    pub fn commit(&mut self, e: &CommitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_commit(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PassiveFlushEvent`].
    #[inline]
    pub fn passive_flush(&mut self, e: &PassiveFlushEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_passive_flush(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ScheduleEvent`].
    #[inline]
    pub fn schedule(&mut self, e: &ScheduleEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_schedule(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RenderErrorEvent`].
    #[inline]
    pub fn render_error(&mut self, e: &RenderErrorEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_render_error(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`UnitEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn unit(&mut self, e: &UnitEvent) {
        if let Some(s) = &mut self.sink {
            s.on_unit(e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_begin() -> RenderBeginEvent {
        RenderBeginEvent {
            seq: 1,
            root: RootId(0),
            lane: Lanes::DEFAULT,
            fresh: true,
        }
    }

    #[test]
    fn commit_stats_total() {
        let stats = CommitStats {
            placements: 2,
            updates: 1,
            deletions: 1,
            visibility: 0,
        };
        assert_eq!(stats.total(), 4);
        assert_eq!(CommitStats::default().total(), 0);
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_render_begin(&sample_begin());
        sink.on_schedule(&ScheduleEvent {
            seq: 2,
            root: RootId(0),
            lane: Lanes::SYNC,
            kind: ScheduleKind::Sync,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.render_begin(&sample_begin());
        tracer.ping(&PingEvent {
            seq: 3,
            root: RootId(0),
            lane: Lanes::DEFAULT,
            awaitable: AwaitableId(1),
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            lanes: Vec<Lanes>,
        }
        impl TraceSink for RecordingSink {
            fn on_render_begin(&mut self, e: &RenderBeginEvent) {
                self.lanes.push(e.lane);
            }
        }

        let mut sink = RecordingSink { lanes: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.render_begin(&sample_begin());
        drop(tracer);
        assert_eq!(sink.lanes, &[Lanes::DEFAULT]);

        let shared = Rc::new(RefCell::new(sink));
        let mut handle = shared.clone();
        Tracer::new(&mut handle).render_begin(&sample_begin());
        assert_eq!(shared.borrow().lanes.len(), 2);
    }
}
