// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory host and manual scheduler for driving a
//! [`Reconciler`](stratum_core::reconciler::Reconciler) deterministically.
//!
//! [`NoopHost`] keeps a plain node tree, logs every host call as a
//! [`HostOp`], and rejects structural misuse. [`ManualScheduler`] queues
//! tasks by priority and only runs them when a driver asks:
//!
//! - [`flush_microtasks`] drains the host's microtask queue (sync-lane work).
//! - [`run_next_task`] runs the most urgent scheduled task for one slice.
//! - [`flush_all`] alternates pings, microtasks, and tasks until idle.
//!
//! ```
//! use stratum_core::element::Element;
//! use stratum_noop::{ManualScheduler, NoopHost, NoopReconciler, flush_all};
//!
//! let mut r = NoopReconciler::new(NoopHost::new(), ManualScheduler::new());
//! let root = r.create_root_container(NoopHost::CONTAINER);
//! r.schedule_update(root, Element::host("p").with_children("hi").into())
//!     .unwrap();
//! flush_all(&mut r).unwrap();
//! assert_eq!(r.host().render(NoopHost::CONTAINER), "<p>hi</p>");
//! ```

mod host;
mod scheduler;

#[cfg(test)]
mod scenarios;

pub use host::{HostOp, NodeId, NoopHost};
pub use scheduler::ManualScheduler;

use stratum_core::error::ReconcileError;
use stratum_core::reconciler::Reconciler;
use stratum_core::scheduler::{TaskStatus, TimeSlicer};

/// A reconciler over the in-memory host and the manual scheduler.
pub type NoopReconciler = Reconciler<NoopHost, ManualScheduler>;

/// Runs every queued microtask, including ones queued while flushing.
///
/// Returns how many ran.
pub fn flush_microtasks(r: &mut NoopReconciler) -> Result<usize, ReconcileError> {
    let mut count = 0;
    while let Some(task) = r.host_mut().take_microtask() {
        r.run_microtask(task)?;
        count += 1;
    }
    Ok(count)
}

/// Runs the most urgent queued task for one slice.
///
/// The task runs at its own priority with a fresh yield budget. A render that
/// yields is put back in the queue under the same handle. Returns `None` if
/// nothing was queued.
pub fn run_next_task(
    r: &mut NoopReconciler,
    did_timeout: bool,
) -> Result<Option<TaskStatus>, ReconcileError> {
    let Some((handle, level, task)) = r.slicer_mut().pop_task() else {
        return Ok(None);
    };
    r.slicer_mut().begin_slice();
    let prev = r.slicer_mut().set_current_priority(level);
    let status = r.run_task(handle, task, did_timeout);
    r.slicer_mut().set_current_priority(prev);
    let status = status?;
    if status == TaskStatus::Continue {
        r.slicer_mut().requeue(handle, level, task);
    }
    Ok(Some(status))
}

/// Processes pings, microtasks, and tasks until nothing is left.
///
/// The yield budget is lifted for the duration, so renders run to completion.
/// Stops at the first error.
pub fn flush_all(r: &mut NoopReconciler) -> Result<(), ReconcileError> {
    let budget = r.slicer_mut().set_yield_budget(None);
    let result = drain(r);
    r.slicer_mut().set_yield_budget(budget);
    result
}

fn drain(r: &mut NoopReconciler) -> Result<(), ReconcileError> {
    loop {
        let pings = r.process_pings();
        let microtasks = flush_microtasks(r)?;
        if run_next_task(r, false)?.is_some() {
            continue;
        }
        if pings == 0 && microtasks == 0 {
            return Ok(());
        }
    }
}
