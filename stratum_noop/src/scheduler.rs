// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`TimeSlicer`] that only runs tasks when told to.

use std::collections::BTreeMap;

use stratum_core::scheduler::{PriorityLevel, Task, TaskHandle, TimeSlicer};

/// A manually driven task queue.
///
/// Tasks run in priority order, and in scheduling order within a priority.
/// Nothing runs on its own: the [`run_next_task`](crate::run_next_task) and
/// [`flush_all`](crate::flush_all) drivers pop tasks and hand them to the
/// reconciler.
///
/// With a yield budget set, [`should_yield`](TimeSlicer::should_yield)
/// answers `false` that many times per slice and `true` after that.
#[derive(Debug)]
pub struct ManualScheduler {
    queue: BTreeMap<(PriorityLevel, u64), Task>,
    next_handle: u64,
    current: PriorityLevel,
    budget: Option<u32>,
    remaining: Option<u32>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    /// Creates an empty queue running at [`PriorityLevel::Normal`] with no
    /// yield budget.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            next_handle: 0,
            current: PriorityLevel::Normal,
            budget: None,
            remaining: None,
        }
    }

    /// Sets how many units of work each slice may run, and returns the
    /// previous budget. `None` never yields.
    ///
    /// The new budget also applies to the slice in progress.
    pub fn set_yield_budget(&mut self, budget: Option<u32>) -> Option<u32> {
        self.remaining = budget;
        core::mem::replace(&mut self.budget, budget)
    }

    /// Starts a new slice with a full budget.
    pub fn begin_slice(&mut self) {
        self.remaining = self.budget;
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// The queued tasks in the order they would run.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskHandle, PriorityLevel, Task)> + '_ {
        self.queue
            .iter()
            .map(|(&(level, handle), &task)| (TaskHandle(handle), level, task))
    }

    /// Removes the most urgent task.
    pub fn pop_task(&mut self) -> Option<(TaskHandle, PriorityLevel, Task)> {
        let ((level, handle), task) = self.queue.pop_first()?;
        Some((TaskHandle(handle), level, task))
    }

    /// Puts a task that asked to continue back at the head of its priority.
    pub fn requeue(&mut self, handle: TaskHandle, level: PriorityLevel, task: Task) {
        self.queue.insert((level, handle.0), task);
    }
}

impl TimeSlicer for ManualScheduler {
    fn schedule(&mut self, priority: PriorityLevel, task: Task) -> TaskHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.queue.insert((priority, handle), task);
        TaskHandle(handle)
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.queue.retain(|&(_, h), _| h != handle.0);
    }

    fn should_yield(&mut self) -> bool {
        match &mut self.remaining {
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        }
    }

    fn current_priority(&self) -> PriorityLevel {
        self.current
    }

    fn set_current_priority(&mut self, level: PriorityLevel) -> PriorityLevel {
        core::mem::replace(&mut self.current, level)
    }
}

#[cfg(test)]
mod tests {
    use stratum_core::root::RootId;
    use stratum_core::scheduler::TaskKind;

    use super::*;

    fn task(root: u32) -> Task {
        Task {
            root: RootId(root),
            kind: TaskKind::Render,
        }
    }

    #[test]
    fn runs_by_priority_then_arrival() {
        let mut s = ManualScheduler::new();
        let idle = s.schedule(PriorityLevel::Idle, task(0));
        let normal_a = s.schedule(PriorityLevel::Normal, task(1));
        let normal_b = s.schedule(PriorityLevel::Normal, task(2));
        let immediate = s.schedule(PriorityLevel::Immediate, task(3));

        let order: Vec<_> = std::iter::from_fn(|| s.pop_task().map(|(h, ..)| h)).collect();
        assert_eq!(order, [immediate, normal_a, normal_b, idle]);
    }

    #[test]
    fn cancel_ignores_unknown_handles() {
        let mut s = ManualScheduler::new();
        let h = s.schedule(PriorityLevel::Normal, task(0));
        s.cancel(TaskHandle(99));
        assert_eq!(s.pending(), 1);
        s.cancel(h);
        s.cancel(h);
        assert!(s.is_idle());
    }

    #[test]
    fn requeued_tasks_keep_their_place() {
        let mut s = ManualScheduler::new();
        let first = s.schedule(PriorityLevel::Normal, task(0));
        let second = s.schedule(PriorityLevel::Normal, task(1));
        let (h, level, t) = s.pop_task().unwrap();
        assert_eq!(h, first);
        s.requeue(h, level, t);
        assert_eq!(s.tasks().map(|(h, ..)| h).collect::<Vec<_>>(), [first, second]);
    }

    #[test]
    fn budget_is_per_slice() {
        let mut s = ManualScheduler::new();
        assert!(!s.should_yield());
        s.set_yield_budget(Some(2));
        assert!(!s.should_yield());
        assert!(!s.should_yield());
        assert!(s.should_yield());
        s.begin_slice();
        assert!(!s.should_yield());
        assert_eq!(s.set_yield_budget(None), Some(2));
        assert!(!s.should_yield());
    }
}
