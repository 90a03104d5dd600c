// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reconciler: roots, update entry points, and the callbacks the
//! embedder hands back.
//!
//! A [`Reconciler`] owns the fiber arena for every root it manages, a
//! [`HostConfig`] it mutates during commit, and a [`TimeSlicer`] it schedules
//! render and passive-effect tasks on. It is single-threaded and never
//! re-entered: all work happens inside its `&mut self` methods.
//!
//! The embedder drives it with three kinds of callbacks:
//!
//! - [`run_task`](Reconciler::run_task) for tasks the reconciler scheduled
//!   on the time slicer,
//! - [`run_microtask`](Reconciler::run_microtask) for the sync-queue flush
//!   requested through [`HostConfig::schedule_microtask`],
//! - [`process_pings`](Reconciler::process_pings) after awaitables settle.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::config::ReconcilerConfig;
use crate::element::{Node, Value};
use crate::error::ReconcileError;
use crate::fiber::{Fiber, FiberKind, FiberState, FiberStore, PendingProps};
use crate::hooks::StateHandle;
use crate::host::HostConfig;
use crate::lane::Lanes;
use crate::root::{FiberRoot, RootId};
use crate::scheduler::{Microtask, PriorityLevel, Task, TaskHandle, TaskKind, TaskStatus, TimeSlicer};
use crate::suspense::Inbox;
use crate::trace::{PingEvent, TraceSink, Tracer};
use crate::update_queue::{Action, QueueState, SharedQueue, Update, enqueue_update};
use crate::work_loop::{RenderStatus, SyncQueue, WorkSession};

/// Reconciles element trees into a host tree, one or more roots at a time.
pub struct Reconciler<H: HostConfig, S: TimeSlicer> {
    pub(crate) host: H,
    pub(crate) slicer: S,
    pub(crate) config: ReconcilerConfig,
    pub(crate) fibers: FiberStore<H::Instance>,
    pub(crate) roots: Vec<FiberRoot<H::Instance>>,
    pub(crate) session: WorkSession,
    pub(crate) sync_queue: SyncQueue,
    pub(crate) pings: Rc<Inbox>,
    pub(crate) in_transition: bool,
    sink: Option<Box<dyn TraceSink>>,
    seq: u64,
}

impl<H: HostConfig, S: TimeSlicer> fmt::Debug for Reconciler<H, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("roots", &self.roots.len())
            .field("fibers", &self.fibers.len())
            .field("render_lane", &self.session.lane)
            .field("render_status", &self.session.status)
            .field("in_transition", &self.in_transition)
            .finish_non_exhaustive()
    }
}

impl<H: HostConfig, S: TimeSlicer> Reconciler<H, S> {
    /// Creates a reconciler with the default configuration.
    #[must_use]
    pub fn new(host: H, slicer: S) -> Self {
        Self::with_config(host, slicer, ReconcilerConfig::DEFAULT)
    }

    /// Creates a reconciler with an explicit configuration.
    #[must_use]
    pub fn with_config(host: H, slicer: S, config: ReconcilerConfig) -> Self {
        Self {
            host,
            slicer,
            config,
            fibers: FiberStore::new(),
            roots: Vec::new(),
            session: WorkSession::new(Lanes::NONE),
            sync_queue: SyncQueue::default(),
            pings: Rc::new(RefCell::new(Vec::new())),
            in_transition: false,
            sink: None,
            seq: 0,
        }
    }

    /// Installs a trace sink, returning the previous one.
    ///
    /// Events are only delivered when the `trace` feature is enabled.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) -> Option<Box<dyn TraceSink>> {
        self.sink.replace(sink)
    }

    /// Removes the trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        self.sink.take()
    }

    /// Hands the next sequence number and a tracer to `emit`, if a sink is
    /// installed.
    pub(crate) fn trace(&mut self, emit: impl FnOnce(&mut Tracer<'_>, u64)) {
        #[cfg(feature = "trace")]
        if let Some(sink) = self.sink.as_deref_mut() {
            let seq = self.seq;
            self.seq += 1;
            emit(&mut Tracer::new(sink), seq);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = emit;
            _ = self.seq;
        }
    }

    // -----------------------------------------------------------------------
    // Roots and updates
    // -----------------------------------------------------------------------

    /// Creates an empty root that renders into `container`.
    pub fn create_root_container(&mut self, container: H::Instance) -> RootId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "root count stays far below u32::MAX"
        )]
        let id = RootId(self.roots.len() as u32);
        let mut fiber = Fiber::new(FiberKind::Root(id), None, PendingProps::Root);
        fiber.state = FiberState::Root {
            queue: SharedQueue::new(),
            state: QueueState::new(Node::Empty),
        };
        fiber.instance = Some(container.clone());
        let current = self.fibers.insert(fiber);
        self.roots.push(FiberRoot::new(container, current));
        id
    }

    /// Schedules `children` to replace the root's content, at the lane
    /// chosen by [`request_update_lane`](Self::request_update_lane).
    pub fn schedule_update(&mut self, root: RootId, children: Node) -> Result<Lanes, ReconcileError> {
        let current = self.root(root).ok_or(ReconcileError::UnknownRoot(root))?.current;
        let FiberState::Root { queue, .. } = &self.fibers[current].state else {
            unreachable!("root fiber without an update queue");
        };
        let queue = queue.clone();
        let lane = self.request_update_lane();
        enqueue_update(
            &mut self.fibers,
            current,
            &queue,
            Update {
                action: Action::Replace(children),
                lane,
            },
        );
        self.schedule_update_on_fiber(current, lane);
        Ok(lane)
    }

    /// Replaces the root's content synchronously.
    ///
    /// The render runs at the next microtask boundary.
    pub fn update_container(&mut self, root: RootId, children: Node) -> Result<Lanes, ReconcileError> {
        self.run_at_priority(PriorityLevel::Immediate, |r| r.schedule_update(root, children))
    }

    /// The lane an update issued right now would get.
    #[must_use]
    pub fn request_update_lane(&self) -> Lanes {
        if self.in_transition {
            Lanes::TRANSITION
        } else {
            Lanes::from_priority(self.slicer.current_priority())
        }
    }

    /// Runs `f` with the slicer's current priority set to `level`.
    pub fn run_at_priority<R>(&mut self, level: PriorityLevel, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.slicer.set_current_priority(level);
        let result = f(self);
        self.slicer.set_current_priority(previous);
        result
    }

    /// Runs `f` with every update it issues assigned the transition lane.
    pub fn start_transition<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = core::mem::replace(&mut self.in_transition, true);
        let result = f(self);
        self.in_transition = previous;
        result
    }

    /// Replaces the state behind `handle`.
    ///
    /// Returns the lane the update was scheduled at, or [`Lanes::NONE`] if
    /// the component has been unmounted.
    pub fn set_state<T: 'static>(&mut self, handle: &StateHandle<T>, value: T) -> Lanes {
        self.dispatch_action(handle, StateHandle::<T>::replace(value))
    }

    /// Computes the state behind `handle` from its previous value.
    pub fn update_state<T: 'static>(
        &mut self,
        handle: &StateHandle<T>,
        f: impl Fn(&T) -> T + 'static,
    ) -> Lanes {
        self.dispatch_action(handle, StateHandle::<T>::reduce(f))
    }

    fn dispatch_action<T>(&mut self, handle: &StateHandle<T>, action: Action<Value>) -> Lanes {
        let Some(fiber) = self.fibers.resolve(handle.fiber) else {
            return Lanes::NONE;
        };
        let lane = self.request_update_lane();
        enqueue_update(&mut self.fibers, fiber, &handle.queue, Update { action, lane });
        self.schedule_update_on_fiber(fiber, lane);
        lane
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    /// Runs a task previously registered with the time slicer.
    ///
    /// `did_timeout` tells the reconciler the task has waited past its
    /// deadline, in which case the render runs without yielding. A render
    /// task whose handle is no longer the root's callback is stale and does
    /// nothing.
    pub fn run_task(
        &mut self,
        handle: TaskHandle,
        task: Task,
        did_timeout: bool,
    ) -> Result<TaskStatus, ReconcileError> {
        let root = self.root(task.root).ok_or(ReconcileError::UnknownRoot(task.root))?;
        match task.kind {
            TaskKind::Render => {
                if root.callback_node != Some(handle) {
                    return Ok(TaskStatus::Done);
                }
                self.perform_concurrent_work_on_root(task.root, did_timeout)
            }
            TaskKind::PassiveEffects => {
                self.flush_passive_effects_on_root(task.root);
                Ok(TaskStatus::Done)
            }
        }
    }

    /// Runs work queued for the microtask boundary.
    pub fn run_microtask(&mut self, task: Microtask) -> Result<(), ReconcileError> {
        match task {
            Microtask::FlushSyncWork => self.flush_sync_callbacks(),
        }
    }

    /// Re-schedules the lanes of every settled awaitable and returns the
    /// number of pings handled.
    pub fn process_pings(&mut self) -> usize {
        let pings = core::mem::take(&mut *self.pings.borrow_mut());
        let count = pings.len();
        for ping in pings {
            let Some(root) = self.roots.get_mut(ping.root.0 as usize) else {
                continue;
            };
            let mut retry = Vec::new();
            if let Some(entry) = root.ping_cache.get_mut(&ping.awaitable) {
                entry.lanes = entry.lanes.remove(ping.lane);
                retry.clone_from(&entry.retry);
                if entry.lanes.is_empty() {
                    root.ping_cache.remove(&ping.awaitable);
                }
            }
            for id in retry {
                if let Some(fiber) = self.fibers.resolve(id) {
                    self.mark_update_lane_from_fiber_to_root(fiber, ping.lane);
                }
            }
            self.roots[ping.root.0 as usize].mark_pinged(ping.lane);
            self.ensure_root_is_scheduled(ping.root);
            self.trace(move |t, seq| {
                t.ping(&PingEvent {
                    seq,
                    root: ping.root,
                    lane: ping.lane,
                    awaitable: ping.awaitable,
                });
            });
        }
        count
    }

    /// Runs the root's pending passive effects now.
    ///
    /// Returns `true` if any were pending.
    pub fn flush_passive_effects(&mut self, root: RootId) -> Result<bool, ReconcileError> {
        self.root(root).ok_or(ReconcileError::UnknownRoot(root))?;
        Ok(self.flush_passive_effects_on_root(root))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The host adapter.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host adapter, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The time slicer.
    #[must_use]
    pub fn slicer(&self) -> &S {
        &self.slicer
    }

    /// The time slicer, mutably.
    pub fn slicer_mut(&mut self) -> &mut S {
        &mut self.slicer
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// The fiber arena shared by every root.
    #[must_use]
    pub fn fibers(&self) -> &FiberStore<H::Instance> {
        &self.fibers
    }

    /// A root's lane bookkeeping.
    #[must_use]
    pub fn root(&self, id: RootId) -> Option<&FiberRoot<H::Instance>> {
        self.roots.get(id.0 as usize)
    }

    /// The committed root fiber of `id`.
    #[must_use]
    pub fn current_fiber(&self, id: RootId) -> Option<u32> {
        self.root(id).map(|r| r.current)
    }

    /// The status of the last render pass.
    #[must_use]
    pub fn render_status(&self) -> RenderStatus {
        self.session.status
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::cell::Cell;

    use super::*;
    use crate::element::{Component, Element, Props};
    use crate::error::HostError;

    /// Logs host calls; node 0 is the container.
    #[derive(Default)]
    struct Log {
        ops: Vec<String>,
        nodes: usize,
        microtasks: Vec<Microtask>,
        reject_appends: bool,
    }

    impl Log {
        fn new_node(&mut self) -> usize {
            self.nodes += 1;
            self.nodes
        }
    }

    impl HostConfig for Log {
        type Instance = usize;

        fn create_node(&mut self, tag: &str, _: &Props) -> usize {
            let id = self.new_node();
            self.ops.push(alloc::format!("create {tag}#{id}"));
            id
        }

        fn create_text_node(&mut self, content: &str) -> usize {
            let id = self.new_node();
            self.ops.push(alloc::format!("text {content:?}#{id}"));
            id
        }

        fn append_child(&mut self, parent: &usize, child: &usize) -> Result<(), HostError> {
            if self.reject_appends {
                return Err(HostError::UnknownNode {
                    node: alloc::format!("#{parent}"),
                });
            }
            self.ops.push(alloc::format!("append {child} to {parent}"));
            Ok(())
        }

        fn insert_before(&mut self, parent: &usize, child: &usize, reference: &usize) -> Result<(), HostError> {
            self.ops.push(alloc::format!("insert {child} in {parent} before {reference}"));
            Ok(())
        }

        fn remove_child(&mut self, parent: &usize, child: &usize) -> Result<(), HostError> {
            self.ops.push(alloc::format!("remove {child} from {parent}"));
            Ok(())
        }

        fn set_text_content(&mut self, node: &usize, content: &str) {
            self.ops.push(alloc::format!("set {node} to {content:?}"));
        }

        fn set_visibility(&mut self, node: &usize, hidden: bool) {
            self.ops.push(alloc::format!("hide {node} {hidden}"));
        }

        fn apply_props(&mut self, node: &usize, _: &Props) {
            self.ops.push(alloc::format!("props {node}"));
        }

        fn schedule_microtask(&mut self, task: Microtask) {
            self.microtasks.push(task);
        }
    }

    /// Queues tasks in arrival order and yields after `budget` checks.
    struct Slicer {
        tasks: Vec<(TaskHandle, Task)>,
        next: u64,
        priority: PriorityLevel,
        budget: Option<u32>,
    }

    impl Default for Slicer {
        fn default() -> Self {
            Self {
                tasks: Vec::new(),
                next: 0,
                priority: PriorityLevel::Normal,
                budget: None,
            }
        }
    }

    impl TimeSlicer for Slicer {
        fn schedule(&mut self, _: PriorityLevel, task: Task) -> TaskHandle {
            let handle = TaskHandle(self.next);
            self.next += 1;
            self.tasks.push((handle, task));
            handle
        }

        fn cancel(&mut self, handle: TaskHandle) {
            self.tasks.retain(|(h, _)| *h != handle);
        }

        fn should_yield(&mut self) -> bool {
            match &mut self.budget {
                Some(0) => true,
                Some(n) => {
                    *n -= 1;
                    false
                }
                None => false,
            }
        }

        fn current_priority(&self) -> PriorityLevel {
            self.priority
        }

        fn set_current_priority(&mut self, level: PriorityLevel) -> PriorityLevel {
            core::mem::replace(&mut self.priority, level)
        }
    }

    type Fixture = Reconciler<Log, Slicer>;

    fn fixture() -> (Fixture, RootId) {
        let mut r = Reconciler::new(Log::default(), Slicer::default());
        let root = r.create_root_container(0);
        (r, root)
    }

    fn flush_microtasks(r: &mut Fixture) {
        while let Some(task) = r.host_mut().microtasks.pop() {
            r.run_microtask(task).ok();
        }
    }

    fn run_tasks(r: &mut Fixture) {
        while !r.slicer().tasks.is_empty() {
            let (handle, task) = r.slicer_mut().tasks.remove(0);
            if let Ok(TaskStatus::Continue) = r.run_task(handle, task, false) {
                r.slicer_mut().tasks.insert(0, (handle, task));
                r.slicer_mut().budget = None;
            }
        }
    }

    #[test]
    fn sync_update_renders_at_the_microtask_boundary() {
        let (mut r, root) = fixture();
        let lane = r.update_container(root, Element::host("div").with_children("hi").into());
        assert_eq!(lane, Ok(Lanes::SYNC));
        assert!(r.host().ops.is_empty());
        assert_eq!(r.root(root).map(FiberRoot::callback_priority), Some(Lanes::SYNC));

        flush_microtasks(&mut r);
        assert_eq!(
            r.host().ops,
            ["text \"hi\"#1", "create div#2", "append 1 to 2", "append 2 to 0"]
        );
        assert_eq!(r.root(root).map(FiberRoot::pending_lanes), Some(Lanes::NONE));
        assert_eq!(r.render_status(), RenderStatus::Completed);
    }

    #[test]
    fn default_priority_update_runs_as_a_task() {
        let (mut r, root) = fixture();
        let lane = r.schedule_update(root, Node::text("a"));
        assert_eq!(lane, Ok(Lanes::DEFAULT));
        assert_eq!(r.slicer().tasks.len(), 1);
        run_tasks(&mut r);
        assert_eq!(r.host().ops, ["text \"a\"#1", "append 1 to 0"]);
    }

    #[test]
    fn transition_lane_inside_start_transition() {
        let (mut r, root) = fixture();
        let lane = r.start_transition(|r| r.schedule_update(root, Node::Empty));
        assert_eq!(lane, Ok(Lanes::TRANSITION));
        assert_eq!(r.request_update_lane(), Lanes::DEFAULT);
    }

    #[test]
    fn yielding_render_resumes_under_the_same_handle() {
        let (mut r, root) = fixture();
        let list = Node::list((0..4).map(|i| Element::host("li").with_key(alloc::format!("{i}")).into()));
        r.schedule_update(root, Element::host("ul").with_children(list).into()).ok();
        r.slicer_mut().budget = Some(2);

        let (handle, task) = r.slicer_mut().tasks.remove(0);
        assert_eq!(r.run_task(handle, task, false), Ok(TaskStatus::Continue));
        assert_eq!(r.render_status(), RenderStatus::Interrupted);
        assert!(r.host().ops.is_empty(), "nothing completes in two units");

        r.slicer_mut().budget = None;
        assert_eq!(r.run_task(handle, task, false), Ok(TaskStatus::Done));
        assert_eq!(r.render_status(), RenderStatus::Completed);
        assert_eq!(r.host().ops.last().map(String::as_str), Some("append 5 to 0"));
    }

    #[test]
    fn stale_render_task_is_ignored() {
        let (mut r, root) = fixture();
        r.schedule_update(root, Node::text("a")).ok();
        let (handle, task) = r.slicer().tasks[0];
        r.update_container(root, Node::text("b")).ok();
        assert!(r.slicer().tasks.is_empty(), "sync work cancels the task");

        assert_eq!(r.run_task(handle, task, false), Ok(TaskStatus::Done));
        assert!(r.host().ops.is_empty());
    }

    #[test]
    fn unknown_root_is_reported() {
        let (mut r, _) = fixture();
        let bogus = RootId(9);
        assert_eq!(
            r.schedule_update(bogus, Node::Empty),
            Err(ReconcileError::UnknownRoot(bogus))
        );
    }

    #[test]
    fn state_updates_rerender_the_component() {
        let handle = Rc::new(RefCell::new(None));
        let slot = handle.clone();
        let counter = Component::new("Counter", move |scope, _| {
            let (n, set) = scope.use_state(|| 0_u32);
            *slot.borrow_mut() = Some(set);
            Ok(Node::text(alloc::format!("{n}")))
        });
        let (mut r, root) = fixture();
        r.update_container(root, Element::component(&counter).into()).ok();
        flush_microtasks(&mut r);

        let Some(set) = handle.borrow().clone() else {
            panic!("component did not render");
        };
        let lane = r.run_at_priority(PriorityLevel::Immediate, |r| r.set_state(&set, 5));
        assert_eq!(lane, Lanes::SYNC);
        flush_microtasks(&mut r);
        assert_eq!(r.host().ops.last().map(String::as_str), Some("set 1 to \"5\""));

        r.update_container(root, Node::Empty).ok();
        flush_microtasks(&mut r);
        assert_eq!(r.set_state(&set, 6), Lanes::NONE, "unmounted handles are inert");
    }

    #[test]
    fn effects_run_in_the_passive_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let component = Component::new("Effect", move |scope, _| {
            let sink = sink.clone();
            scope.use_effect(Some(()), move || {
                sink.borrow_mut().push("create");
                let sink = sink.clone();
                Some(Box::new(move || sink.borrow_mut().push("destroy")) as crate::hooks::Destroy)
            });
            Ok(Node::Empty)
        });
        let (mut r, root) = fixture();
        r.update_container(root, Element::component(&component).into()).ok();
        flush_microtasks(&mut r);
        assert!(log.borrow().is_empty());
        assert_eq!(r.root(root).map(FiberRoot::has_pending_passive_effects), Some(true));

        run_tasks(&mut r);
        assert_eq!(*log.borrow(), ["create"]);

        r.update_container(root, Node::Empty).ok();
        flush_microtasks(&mut r);
        assert_eq!(r.flush_passive_effects(root), Ok(true));
        assert_eq!(*log.borrow(), ["create", "destroy"]);
    }

    #[test]
    fn failing_component_exhausts_retries() {
        let calls = Rc::new(Cell::new(0_u32));
        let counted = calls.clone();
        let broken = Component::new("Broken", move |_, _| {
            counted.set(counted.get() + 1);
            Err(crate::error::ComponentError::new("boom").into())
        });
        let mut r = Reconciler::with_config(
            Log::default(),
            Slicer::default(),
            ReconcilerConfig::DEFAULT.with_max_render_retries(2),
        );
        let root = r.create_root_container(0);
        r.update_container(root, Element::component(&broken).into()).ok();
        let task = r.host_mut().microtasks.pop();
        let result = task.map(|t| r.run_microtask(t));
        let Some(Err(ReconcileError::RenderFailed { attempts, lane, .. })) = &result else {
            panic!("expected a render failure, got {result:?}");
        };
        assert_eq!((*attempts, *lane), (3, Lanes::SYNC));
        assert_eq!(calls.get(), 3);
        assert_eq!(r.root(root).map(FiberRoot::next_lane), Some(Lanes::NONE));
        assert!(r.host().ops.is_empty());
    }

    #[test]
    fn failed_commit_leaves_the_root_schedulable() {
        let (mut r, root) = fixture();
        r.host_mut().reject_appends = true;
        r.update_container(root, Element::host("div").into()).ok();
        let task = r.host_mut().microtasks.pop();
        let result = task.map(|t| r.run_microtask(t));
        assert!(
            matches!(result, Some(Err(ReconcileError::Host(_)))),
            "got {result:?}"
        );
        assert_eq!(r.root(root).map(FiberRoot::callback_priority), Some(Lanes::NONE));

        r.host_mut().reject_appends = false;
        assert_eq!(r.update_container(root, Element::host("p").into()), Ok(Lanes::SYNC));
        assert_eq!(r.root(root).map(FiberRoot::callback_priority), Some(Lanes::SYNC));
        flush_microtasks(&mut r);
        assert_eq!(r.host().ops.last().map(String::as_str), Some("append 2 to 0"));
        assert_eq!(r.root(root).map(FiberRoot::pending_lanes), Some(Lanes::NONE));
    }
}
