// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-component hook lists.
//!
//! A function component receives a [`Scope`] and calls hooks on it in a
//! fixed order. On mount each call appends a new [`Hook`]; on update each
//! call pairs with the hook at the same position in the committed list.
//! Calling hooks in a different order between renders is a bug in the
//! component: the render is abandoned and reported as
//! [`ReconcileError::HookOrder`](crate::error::ReconcileError::HookOrder).

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::marker::PhantomData;

use crate::context::ContextStack;
use crate::element::{Context, Value};
use crate::fiber::FiberId;
use crate::flags::EffectTag;
use crate::host::HostConfig;
use crate::lane::Lanes;
use crate::reconciler::Reconciler;
use crate::scheduler::TimeSlicer;
use crate::suspense::{Awaitable, Throw, track_awaitable};
use crate::update_queue::{Action, QueueState, SharedQueue, process};

/// Cleanup returned by an effect.
pub type Destroy = Box<dyn FnOnce()>;

pub(crate) type Create = Rc<dyn Fn() -> Option<Destroy>>;

/// Mutable part of an effect that survives across renders.
#[derive(Default)]
pub(crate) struct EffectInstance {
    pub(crate) destroy: Option<Destroy>,
}

#[derive(Clone)]
pub(crate) struct EffectHook {
    pub(crate) tag: EffectTag,
    pub(crate) create: Create,
    pub(crate) deps: Option<Value>,
    pub(crate) deps_eq: fn(&Value, &Value) -> bool,
    pub(crate) inst: Rc<RefCell<EffectInstance>>,
}

#[derive(Clone)]
pub(crate) struct StateHook {
    pub(crate) queue: SharedQueue<Value>,
    pub(crate) state: QueueState<Value>,
}

#[derive(Clone)]
pub(crate) enum Hook {
    State(StateHook),
    Effect(EffectHook),
    /// A `RefCell<T>` shared by every render.
    Ref(Value),
}

/// Compares two type-erased values as `T`, falling back to identity.
fn value_eq<T: PartialEq + 'static>(a: &Value, b: &Value) -> bool {
    match ((**a).downcast_ref::<T>(), (**b).downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => Rc::ptr_eq(a, b),
    }
}

/// A handle that enqueues updates on one state hook.
///
/// Pass it to [`Reconciler::set_state`](crate::reconciler::Reconciler::set_state)
/// or [`Reconciler::update_state`](crate::reconciler::Reconciler::update_state).
/// A handle whose component has been unmounted is inert.
pub struct StateHandle<T> {
    pub(crate) fiber: FiberId,
    pub(crate) queue: SharedQueue<Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StateHandle<T> {
    fn clone(&self) -> Self {
        Self {
            fiber: self.fiber,
            queue: self.queue.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> core::fmt::Debug for StateHandle<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("StateHandle").field(&self.fiber).finish()
    }
}

impl<T: 'static> StateHandle<T> {
    pub(crate) fn replace(value: T) -> Action<Value> {
        Action::Replace(Rc::new(value))
    }

    pub(crate) fn reduce(f: impl Fn(&T) -> T + 'static) -> Action<Value> {
        Action::Reduce(Rc::new(move |prev: &Value| -> Value {
            match (**prev).downcast_ref::<T>() {
                Some(prev) => Rc::new(f(prev)),
                None => prev.clone(),
            }
        }))
    }
}

/// Starts transitions on behalf of one component.
///
/// Returned by [`Scope::use_transition`].
#[derive(Clone, Debug)]
pub struct Transition {
    pending: StateHandle<bool>,
}

impl Transition {
    /// Runs `f` as a transition.
    ///
    /// The component's pending flag is set at the current update lane, and
    /// cleared again on the transition lane together with every update `f`
    /// issues. Until the transition renders, the component sees
    /// `is_pending == true`.
    pub fn start<H: HostConfig, S: TimeSlicer, R>(
        &self,
        reconciler: &mut Reconciler<H, S>,
        f: impl FnOnce(&mut Reconciler<H, S>) -> R,
    ) -> R {
        reconciler.set_state(&self.pending, true);
        reconciler.start_transition(|r| {
            r.set_state(&self.pending, false);
            f(r)
        })
    }
}

/// The hook context handed to a function component while it renders.
pub struct Scope<'a> {
    lane: Lanes,
    fiber: FiberId,
    contexts: &'a ContextStack,
    /// The committed hook list, with pending updates merged into state
    /// hook base queues as they are read.
    pub(crate) prev: Option<Vec<Hook>>,
    pub(crate) next: Vec<Hook>,
    cursor: usize,
    pub(crate) dependencies: Vec<Context>,
    pub(crate) did_receive_update: bool,
    pub(crate) skipped_lanes: Lanes,
    pub(crate) has_passive_effect: bool,
    /// First hook whose kind or type differs from the committed one.
    pub(crate) misplaced: Option<usize>,
}

impl core::fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scope")
            .field("lane", &self.lane)
            .field("fiber", &self.fiber)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        lane: Lanes,
        fiber: FiberId,
        contexts: &'a ContextStack,
        prev: Option<Vec<Hook>>,
    ) -> Self {
        Self {
            lane,
            fiber,
            contexts,
            prev,
            next: Vec::new(),
            cursor: 0,
            dependencies: Vec::new(),
            did_receive_update: false,
            skipped_lanes: Lanes::NONE,
            has_passive_effect: false,
            misplaced: None,
        }
    }

    /// The lane being rendered.
    #[must_use]
    pub fn lane(&self) -> Lanes {
        self.lane
    }

    /// The fiber this component's hooks belong to.
    ///
    /// It stays valid across renders, including ones that are thrown away,
    /// until the component unmounts.
    #[must_use]
    pub fn fiber(&self) -> FiberId {
        self.fiber
    }

    fn next_index(&mut self) -> usize {
        let idx = self.cursor;
        self.cursor += 1;
        idx
    }

    fn mark_misplaced(&mut self, idx: usize) {
        self.misplaced.get_or_insert(idx);
    }

    /// The committed state hook at `idx` with its pending updates merged,
    /// if the previous render declared state of type `T` there.
    fn committed_state<T: 'static>(&mut self, idx: usize) -> Option<StateHook> {
        let Some(Hook::State(committed)) = self.prev.as_mut()?.get_mut(idx) else {
            return None;
        };
        if !(*committed.state.memoized).is::<T>() {
            return None;
        }
        let pending = committed.queue.take();
        committed.state.merge_pending(&pending);
        Some(committed.clone())
    }

    /// Declares a piece of state.
    ///
    /// `init` runs on mount only. On update the hook replays the updates
    /// covered by the render lane.
    ///
    /// If the previous render had no state of type `T` at this position,
    /// the hook starts over from `init` and the render is reported as a
    /// hook order error.
    pub fn use_state<T: Clone + PartialEq + 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> (T, StateHandle<T>) {
        let idx = self.next_index();
        let updated = self.committed_state::<T>(idx).and_then(|mut hook| {
            let processed = process(&hook.state.base_state, &hook.state.base_queue, self.lane);
            let value = (*processed.memoized).downcast_ref::<T>().cloned()?;
            if !value_eq::<T>(&processed.memoized, &hook.state.memoized) {
                self.did_receive_update = true;
            }
            self.skipped_lanes |= processed.skipped_lanes;
            hook.state.apply(processed);
            Some((value, hook))
        });
        let (value, hook) = match updated {
            Some(updated) => updated,
            None => {
                if self.prev.is_some() {
                    self.mark_misplaced(idx);
                }
                let value = init();
                let initial: Value = Rc::new(value.clone());
                let hook = StateHook {
                    queue: SharedQueue::new(),
                    state: QueueState::new(initial),
                };
                (value, hook)
            }
        };

        let handle = StateHandle {
            fiber: self.fiber,
            queue: hook.queue.clone(),
            _marker: PhantomData,
        };
        self.next.push(Hook::State(hook));
        (value, handle)
    }

    /// Declares a passive effect.
    ///
    /// `create` runs after commit when `deps` differ from the previous
    /// render's (or always, when `deps` is `None`). The destroy it returns
    /// runs before the next create and on unmount.
    pub fn use_effect<D: PartialEq + 'static>(
        &mut self,
        deps: Option<D>,
        create: impl Fn() -> Option<Destroy> + 'static,
    ) {
        let idx = self.next_index();
        let deps: Option<Value> = deps.map(|d| Rc::new(d) as Value);
        let committed = self.prev.as_ref().map(|prev| match prev.get(idx) {
            Some(Hook::Effect(committed)) => {
                let same = match (&deps, &committed.deps) {
                    (Some(next), Some(prev)) => (committed.deps_eq)(next, prev),
                    _ => false,
                };
                Some((committed.inst.clone(), !same))
            }
            _ => None,
        });
        let (inst, changed) = match committed {
            Some(Some(found)) => found,
            mounting => {
                if mounting.is_some() {
                    self.mark_misplaced(idx);
                }
                (Rc::new(RefCell::new(EffectInstance::default())), true)
            }
        };
        let tag = if changed {
            self.has_passive_effect = true;
            EffectTag::PASSIVE | EffectTag::HAS_EFFECT
        } else {
            EffectTag::PASSIVE
        };
        self.next.push(Hook::Effect(EffectHook {
            tag,
            create: Rc::new(create),
            deps,
            deps_eq: value_eq::<D>,
            inst,
        }));
    }

    /// Declares a mutable cell that lives as long as the component.
    ///
    /// `init` runs on mount only; every later render gets the same cell.
    /// Writing to it does not schedule a render.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        let idx = self.next_index();
        let committed = self.prev.as_ref().map(|prev| match prev.get(idx) {
            Some(Hook::Ref(cell)) => cell.clone().downcast::<RefCell<T>>().ok(),
            _ => None,
        });
        let cell = match committed {
            Some(Some(cell)) => cell,
            mounting => {
                if mounting.is_some() {
                    self.mark_misplaced(idx);
                }
                Rc::new(RefCell::new(init()))
            }
        };
        self.next.push(Hook::Ref(cell.clone()));
        cell
    }

    /// Declares a transition.
    ///
    /// Returns whether a transition started through the returned
    /// [`Transition`] is still waiting to render.
    pub fn use_transition(&mut self) -> (bool, Transition) {
        let (pending, handle) = self.use_state(|| false);
        (pending, Transition { pending: handle })
    }

    /// Reads the nearest provided value of `context`, or its default.
    ///
    /// The component is re-rendered when that provider's value changes.
    pub fn use_context(&mut self, context: &Context) -> Value {
        if !self.dependencies.iter().any(|c| c.same(context)) {
            self.dependencies.push(context.clone());
        }
        self.contexts.read(context)
    }

    /// Reads an awaitable.
    ///
    /// Returns the value if it is fulfilled. Otherwise returns a [`Throw`]
    /// the component should propagate with `?`: the render then suspends to
    /// the nearest suspense boundary, or fails if the awaitable was rejected.
    pub fn use_awaitable(&mut self, awaitable: &Awaitable) -> Result<Value, Throw> {
        track_awaitable(awaitable)
    }
}
