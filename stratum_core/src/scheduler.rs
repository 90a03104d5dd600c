// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The time-slicing primitive the work loop runs on.
//!
//! The reconciler never owns an event loop. It asks a [`TimeSlicer`] to run a
//! [`Task`] later at some [`PriorityLevel`], and the embedder hands that task
//! back through [`Reconciler::run_task`](crate::reconciler::Reconciler::run_task)
//! when its turn comes. Sync-lane work is flushed at the microtask boundary
//! through [`HostConfig::schedule_microtask`](crate::host::HostConfig::schedule_microtask)
//! instead.
//!
//! ```text
//!   schedule_update ──► ensure_root_is_scheduled
//!                          │
//!            ┌─────────────┴──────────────┐
//!            ▼ SYNC                       ▼ other lanes
//!   SyncQueue + Microtask          TimeSlicer::schedule(level, Task)
//!            │                            │
//!            ▼                            ▼
//!   Reconciler::run_microtask      Reconciler::run_task ──► TaskStatus
//! ```

use core::fmt;

use crate::root::RootId;

/// Priority levels understood by the time-slicing primitive.
///
/// Lower discriminants run first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriorityLevel {
    /// Must run before anything else.
    Immediate = 1,
    /// Blocks user interaction while pending.
    UserBlocking = 2,
    /// Ordinary work.
    Normal = 3,
    /// Can be deferred behind normal work.
    Low = 4,
    /// Runs only when idle.
    Idle = 5,
}

/// An opaque, cancellable handle to a scheduled [`Task`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub u64);

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskHandle({})", self.0)
    }
}

/// What a scheduled callback should do when it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Render (and possibly commit) the root's next lane, yielding when asked.
    Render,
    /// Flush the root's deferred passive effects.
    PassiveEffects,
}

/// A callback registered with a [`TimeSlicer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Task {
    /// The root the task belongs to.
    pub root: RootId,
    /// The work to perform.
    pub kind: TaskKind,
}

/// Returned by [`Reconciler::run_task`](crate::reconciler::Reconciler::run_task).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The render yielded; run the same task again under the same handle.
    Continue,
    /// The task is finished.
    Done,
}

/// Work queued for the microtask boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Microtask {
    /// Drain the sync queue, rendering and committing every queued root.
    FlushSyncWork,
}

/// Cooperative time slicing consumed by the work loop.
///
/// Implementations decide deadline policy; the reconciler only asks whether
/// it should yield between units of work.
pub trait TimeSlicer {
    /// Registers `task` to run later at `priority`.
    fn schedule(&mut self, priority: PriorityLevel, task: Task) -> TaskHandle;

    /// Cancels a task. Cancelling an unknown or already-run handle is a no-op.
    fn cancel(&mut self, handle: TaskHandle);

    /// Returns `true` when the current slice is used up.
    fn should_yield(&mut self) -> bool;

    /// The priority of the code that is currently running.
    fn current_priority(&self) -> PriorityLevel;

    /// Replaces the current priority and returns the previous one.
    ///
    /// [`Reconciler::run_at_priority`](crate::reconciler::Reconciler::run_at_priority)
    /// uses this to scope a closure to a priority.
    fn set_current_priority(&mut self, level: PriorityLevel) -> PriorityLevel;
}
