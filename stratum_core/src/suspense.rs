// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Suspension on external data.
//!
//! A component that needs a value that is not there yet returns
//! [`Throw::Suspended`] carrying the [`Awaitable`] it waits on. The work loop
//! catches it, registers a ping on the awaitable (once per awaitable and
//! lane), and unwinds to the nearest suspense boundary, which renders its
//! fallback. When the awaitable settles, the ping lands in the reconciler's
//! inbox and [`Reconciler::process_pings`](crate::reconciler::Reconciler::process_pings)
//! re-schedules the lane.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::element::Value;
use crate::error::ComponentError;
use crate::fiber::{FiberId, FiberKind, FiberStore, INVALID};
use crate::flags::Flags;
use crate::lane::Lanes;
use crate::root::{FiberRoot, RootId};

static NEXT_AWAITABLE: AtomicU64 = AtomicU64::new(0);

/// Identifies an [`Awaitable`] in ping caches and trace events.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AwaitableId(pub u64);

impl fmt::Debug for AwaitableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AwaitableId({})", self.0)
    }
}

/// A wake-up for a root whose render suspended on an awaitable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ping {
    /// The root to re-schedule.
    pub root: RootId,
    /// The lane that suspended.
    pub lane: Lanes,
    /// The awaitable that settled.
    pub awaitable: AwaitableId,
}

pub(crate) type Inbox = RefCell<Vec<Ping>>;

enum Status {
    Pending,
    Fulfilled(Value),
    Rejected(ComponentError),
}

struct AwaitableInner {
    id: AwaitableId,
    status: RefCell<Status>,
    waiters: RefCell<Vec<(Weak<Inbox>, Ping)>>,
}

/// A value that will be available later.
///
/// The embedder creates an awaitable, hands it to components, and settles it
/// with [`resolve`](Self::resolve) or [`reject`](Self::reject) once the data
/// arrives. Settling is one-shot; later calls are ignored.
#[derive(Clone)]
pub struct Awaitable(Rc<AwaitableInner>);

impl Default for Awaitable {
    fn default() -> Self {
        Self::new()
    }
}

impl Awaitable {
    /// Creates a pending awaitable.
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(AwaitableInner {
            id: AwaitableId(NEXT_AWAITABLE.fetch_add(1, Ordering::Relaxed)),
            status: RefCell::new(Status::Pending),
            waiters: RefCell::new(Vec::new()),
        }))
    }

    /// Creates an already fulfilled awaitable.
    #[must_use]
    pub fn fulfilled(value: Value) -> Self {
        let awaitable = Self::new();
        awaitable.resolve(value);
        awaitable
    }

    /// The identity of this awaitable.
    #[must_use]
    pub fn id(&self) -> AwaitableId {
        self.0.id
    }

    /// Returns `true` until the awaitable is settled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(*self.0.status.borrow(), Status::Pending)
    }

    /// Fulfills the awaitable and pings every waiting root.
    pub fn resolve(&self, value: Value) {
        self.settle(Status::Fulfilled(value));
    }

    /// Rejects the awaitable and pings every waiting root.
    ///
    /// The retry render sees the error as a component failure.
    pub fn reject(&self, error: ComponentError) {
        self.settle(Status::Rejected(error));
    }

    fn settle(&self, status: Status) {
        if !self.is_pending() {
            return;
        }
        *self.0.status.borrow_mut() = status;
        let waiters = core::mem::take(&mut *self.0.waiters.borrow_mut());
        for (inbox, ping) in waiters {
            if let Some(inbox) = inbox.upgrade() {
                inbox.borrow_mut().push(ping);
            }
        }
    }

    /// Delivers `ping` to `inbox` once the awaitable settles, or right away
    /// if it already has.
    pub(crate) fn subscribe(&self, inbox: &Rc<Inbox>, ping: Ping) {
        if self.is_pending() {
            self.0
                .waiters
                .borrow_mut()
                .push((Rc::downgrade(inbox), ping));
        } else {
            inbox.borrow_mut().push(ping);
        }
    }
}

impl fmt::Debug for Awaitable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match *self.0.status.borrow() {
            Status::Pending => "pending",
            Status::Fulfilled(_) => "fulfilled",
            Status::Rejected(_) => "rejected",
        };
        write!(f, "Awaitable({}, {status})", self.0.id.0)
    }
}

/// Why a component did not produce children.
#[derive(Clone, Debug)]
pub enum Throw {
    /// Waiting on an awaitable.
    Suspended(Awaitable),
    /// A failure; the render is retried and eventually surfaced.
    Failed(ComponentError),
}

impl From<ComponentError> for Throw {
    fn from(error: ComponentError) -> Self {
        Self::Failed(error)
    }
}

/// Registers a ping for `lane` on `awaitable` unless one is already
/// registered, and records the fibers the ping should schedule.
///
/// Returns `true` if a new listener was attached.
pub(crate) fn attach_ping_listener<I>(
    root: &mut FiberRoot<I>,
    root_id: RootId,
    inbox: &Rc<Inbox>,
    awaitable: &Awaitable,
    lane: Lanes,
    retry: &[FiberId],
) -> bool {
    let entry = root.ping_cache.entry(awaitable.id()).or_default();
    for id in retry {
        if !entry.retry.contains(id) {
            entry.retry.push(*id);
        }
    }
    if entry.lanes.includes_any(lane) {
        return false;
    }
    entry.lanes |= lane;
    awaitable.subscribe(
        inbox,
        Ping {
            root: root_id,
            lane,
            awaitable: awaitable.id(),
        },
    );
    true
}

/// Reads an awaitable's status synchronously.
pub(crate) fn track_awaitable(awaitable: &Awaitable) -> Result<Value, Throw> {
    match &*awaitable.0.status.borrow() {
        Status::Fulfilled(value) => Ok(value.clone()),
        Status::Rejected(error) => Err(Throw::Failed(error.clone())),
        Status::Pending => Err(Throw::Suspended(awaitable.clone())),
    }
}

/// The innermost boundary able to capture, skipping boundaries that are
/// already showing their fallback (recorded as [`INVALID`]).
pub(crate) fn nearest_boundary(handlers: &[u32]) -> Option<u32> {
    handlers.iter().rev().copied().find(|&h| h != INVALID)
}

/// Undoes the begin-phase stack pushes of an incomplete fiber.
///
/// Returns the fiber if it is the boundary chosen to capture the
/// suspension; it becomes the next unit of work and renders its fallback.
pub(crate) fn unwind_work<I>(
    fibers: &mut FiberStore<I>,
    idx: u32,
    handlers: &mut Vec<u32>,
    contexts: &mut crate::context::ContextStack,
) -> Option<u32> {
    let fiber = &mut fibers[idx];
    match fiber.kind {
        FiberKind::Suspense => {
            handlers.pop();
            if fiber.flags.contains(Flags::SHOULD_CAPTURE) && !fiber.flags.contains(Flags::DID_CAPTURE) {
                fiber.flags.remove(Flags::SHOULD_CAPTURE);
                fiber.flags.insert(Flags::DID_CAPTURE);
                return Some(idx);
            }
            None
        }
        FiberKind::Provider(_) => {
            contexts.pop();
            None
        }
        _ => None,
    }
}
