// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lane-filtered update queues.
//!
//! Updates are appended to a [`SharedQueue`] shared by a fiber and its
//! alternate. When a fiber renders, the pending updates move onto the
//! fiber's base queue and [`process`] folds the ones covered by the render
//! lane over the base state. Skipped updates stay on the base queue, in
//! order, together with every update applied after the first skip, so a
//! later render covering more lanes replays them consistently.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::fiber::FiberStore;
use crate::lane::Lanes;

/// What an update does to the previous state.
pub enum Action<T> {
    /// Replaces the state.
    Replace(T),
    /// Computes the next state from the previous one.
    Reduce(Rc<dyn Fn(&T) -> T>),
}

impl<T: Clone> Action<T> {
    /// Applies the action to `prev`.
    #[must_use]
    pub fn apply(&self, prev: &T) -> T {
        match self {
            Self::Replace(next) => next.clone(),
            Self::Reduce(reduce) => reduce(prev),
        }
    }
}

impl<T: Clone> Clone for Action<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Replace(next) => Self::Replace(next.clone()),
            Self::Reduce(reduce) => Self::Reduce(reduce.clone()),
        }
    }
}

/// An action tagged with the lane it was issued at.
pub struct Update<T> {
    /// The action.
    pub action: Action<T>,
    /// The lane; [`Lanes::NONE`] means "covered by every render".
    pub lane: Lanes,
}

impl<T: Clone> Clone for Update<T> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            lane: self.lane,
        }
    }
}

/// The pending list shared between a fiber and its alternate.
pub struct SharedQueue<T>(Rc<RefCell<Vec<Update<T>>>>);

impl<T> SharedQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }

    /// Appends an update.
    pub fn push(&self, update: Update<T>) {
        self.0.borrow_mut().push(update);
    }

    /// Removes and returns every pending update.
    pub fn take(&self) -> Vec<Update<T>> {
        core::mem::take(&mut *self.0.borrow_mut())
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Processed state of a queue as stored on a fiber.
#[derive(Clone)]
pub struct QueueState<T> {
    /// The state produced by the last render.
    pub memoized: T,
    /// The state before the first skipped update.
    pub base_state: T,
    /// Updates still to replay on top of `base_state`.
    pub base_queue: Vec<Update<T>>,
}

impl<T: Clone> QueueState<T> {
    /// A queue state with nothing skipped.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            memoized: initial.clone(),
            base_state: initial,
            base_queue: Vec::new(),
        }
    }

    /// Moves pending updates onto the base queue.
    pub fn merge_pending(&mut self, pending: &[Update<T>]) {
        self.base_queue.extend(pending.iter().cloned());
    }

    /// Replaces this state with the result of a render.
    pub fn apply(&mut self, processed: Processed<T>) {
        self.memoized = processed.memoized;
        self.base_state = processed.base_state;
        self.base_queue = processed.base_queue;
    }
}

/// The outcome of [`process`].
pub struct Processed<T> {
    /// State after every covered update.
    pub memoized: T,
    /// State before the first skipped update, or `memoized` if none was skipped.
    pub base_state: T,
    /// Updates a later render must replay.
    pub base_queue: Vec<Update<T>>,
    /// Lanes of the skipped updates.
    pub skipped_lanes: Lanes,
}

/// Folds the updates covered by `render_lanes` over `base_state`.
///
/// Updates whose lane is not covered are skipped. From the first skip on,
/// every update is kept on the returned base queue; those that were applied
/// are re-tagged with [`Lanes::NONE`] so that any later render applies them
/// again in their original position.
#[must_use]
pub fn process<T: Clone>(base_state: &T, updates: &[Update<T>], render_lanes: Lanes) -> Processed<T> {
    let mut state = base_state.clone();
    let mut new_base = None;
    let mut base_queue = Vec::new();
    let mut skipped_lanes = Lanes::NONE;

    for update in updates {
        if render_lanes.is_subset(update.lane) {
            if !base_queue.is_empty() {
                base_queue.push(Update {
                    action: update.action.clone(),
                    lane: Lanes::NONE,
                });
            }
            state = update.action.apply(&state);
        } else {
            if new_base.is_none() {
                new_base = Some(state.clone());
            }
            base_queue.push(update.clone());
            skipped_lanes |= update.lane;
        }
    }

    Processed {
        base_state: new_base.unwrap_or_else(|| state.clone()),
        memoized: state,
        base_queue,
        skipped_lanes,
    }
}

/// Appends `update` to `queue` and records its lane on `fiber` and its
/// alternate.
pub(crate) fn enqueue_update<T, I>(
    fibers: &mut FiberStore<I>,
    fiber: u32,
    queue: &SharedQueue<T>,
    update: Update<T>,
) {
    let lane = update.lane;
    queue.push(update);
    let fiber = &mut fibers[fiber];
    fiber.lanes |= lane;
    let alternate = fiber.alternate;
    if let Some(alternate) = fibers.get_mut(alternate) {
        alternate.lanes |= lane;
    }
}
