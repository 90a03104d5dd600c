// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fiber storage and double buffering.
//!
//! Every fiber lives in a slot of a [`FiberStore`] and links to its parent,
//! first child, next sibling, and alternate by slot index, with [`INVALID`]
//! standing for "none". The current tree and the work-in-progress tree share
//! the arena: [`create_alternate`] pairs a committed fiber with a reusable
//! second slot instead of allocating a fresh node per render.
//!
//! Slots are recycled through a free list. Each slot carries a generation
//! counter so that a [`FiberId`] held outside the render (for example by a
//! state handle) can be detected as stale once its fiber is released.

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::ops::{Index, IndexMut};

use crate::element::{Component, Context, ElementType, Key, Node, NodeRef, Props};
use crate::flags::Flags;
use crate::hooks::Hook;
use crate::lane::Lanes;
use crate::root::RootId;
use crate::update_queue::{QueueState, SharedQueue};

/// Sentinel value indicating "no fiber" in link fields.
pub const INVALID: u32 = u32::MAX;

/// A generational handle to a fiber slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl FiberId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiberId({}@gen{})", self.idx, self.generation)
    }
}

/// A payload-free tag naming a fiber kind, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkTag {
    /// Tree root.
    Root,
    /// Host element.
    HostElement,
    /// Host text.
    HostText,
    /// Function component.
    Function,
    /// Fragment.
    Fragment,
    /// Context provider.
    Provider,
    /// Suspense boundary.
    Suspense,
    /// Offscreen wrapper below a suspense boundary.
    Offscreen,
}

/// What a fiber is.
#[derive(Clone, Debug)]
pub enum FiberKind {
    /// The root of a tree.
    Root(RootId),
    /// A host element with the given tag.
    HostElement(Rc<str>),
    /// A host text node.
    HostText,
    /// A function component.
    Function(Component),
    /// A grouping wrapper.
    Fragment,
    /// A context provider.
    Provider(Context),
    /// A suspense boundary.
    Suspense,
    /// The hidden/visible wrapper a suspense boundary puts around its
    /// primary children.
    Offscreen,
}

impl FiberKind {
    /// The tag of this kind.
    #[must_use]
    pub fn tag(&self) -> WorkTag {
        match self {
            Self::Root(_) => WorkTag::Root,
            Self::HostElement(_) => WorkTag::HostElement,
            Self::HostText => WorkTag::HostText,
            Self::Function(_) => WorkTag::Function,
            Self::Fragment => WorkTag::Fragment,
            Self::Provider(_) => WorkTag::Provider,
            Self::Suspense => WorkTag::Suspense,
            Self::Offscreen => WorkTag::Offscreen,
        }
    }

    pub(crate) fn from_element(ty: &ElementType) -> Self {
        match ty {
            ElementType::Host(tag) => Self::HostElement(tag.clone()),
            ElementType::Function(component) => Self::Function(component.clone()),
            ElementType::Fragment => Self::Fragment,
            ElementType::Provider(context) => Self::Provider(context.clone()),
            ElementType::Suspense => Self::Suspense,
        }
    }

    /// Returns `true` if a fiber of this kind can be reused for `ty`.
    pub(crate) fn matches(&self, ty: &ElementType) -> bool {
        match (self, ty) {
            (Self::HostElement(a), ElementType::Host(b)) => a == b,
            (Self::Function(a), ElementType::Function(b)) => a.same(b),
            (Self::Fragment, ElementType::Fragment) | (Self::Suspense, ElementType::Suspense) => {
                true
            }
            (Self::Provider(a), ElementType::Provider(b)) => a.same(b),
            _ => false,
        }
    }

    /// Returns `true` for fibers that own a host instance.
    pub(crate) fn is_host(&self) -> bool {
        matches!(self, Self::HostElement(_) | Self::HostText)
    }
}

/// Whether an offscreen subtree is shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OffscreenMode {
    /// Shown.
    Visible,
    /// Kept mounted but hidden.
    Hidden,
}

/// Inputs a fiber is (or was last) rendered with.
#[derive(Clone, Debug)]
pub(crate) enum PendingProps {
    /// A root reads its children from its update queue.
    Root,
    /// Element props, compared by allocation.
    Element(Rc<Props>),
    /// Text content, compared by allocation.
    Text(Rc<str>),
    /// Children of an unkeyed nested list.
    Fragment(Node),
    /// Inputs of an offscreen wrapper.
    Offscreen { mode: OffscreenMode, children: Node },
}

impl PendingProps {
    /// Identity comparison used by the bailout check.
    pub(crate) fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Root, Self::Root) => true,
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b),
            (Self::Text(a), Self::Text(b)) => Rc::ptr_eq(a, b),
            (Self::Fragment(a), Self::Fragment(b)) => a.same(b),
            (
                Self::Offscreen {
                    mode: a,
                    children: ac,
                },
                Self::Offscreen {
                    mode: b,
                    children: bc,
                },
            ) => a == b && ac.same(bc),
            _ => false,
        }
    }

    /// The children description these props carry.
    pub(crate) fn children(&self) -> Node {
        match self {
            Self::Element(props) => props.children.clone(),
            Self::Fragment(children) | Self::Offscreen { children, .. } => children.clone(),
            Self::Root | Self::Text(_) => Node::Empty,
        }
    }
}

/// Render-produced state kept on a fiber.
#[derive(Clone, Default)]
pub(crate) enum FiberState {
    #[default]
    None,
    /// The root's element queue.
    Root {
        queue: SharedQueue<Node>,
        state: QueueState<Node>,
    },
    /// A function component's hook list.
    Hooks(Vec<Hook>),
    /// A suspense boundary's branch.
    Suspense { showing_fallback: bool },
}

impl FiberState {
    pub(crate) fn hooks(&self) -> Option<&[Hook]> {
        match self {
            Self::Hooks(hooks) => Some(hooks),
            _ => None,
        }
    }

    pub(crate) fn showing_fallback(&self) -> bool {
        matches!(
            self,
            Self::Suspense {
                showing_fallback: true
            }
        )
    }
}

impl fmt::Debug for FiberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Root { state, .. } => write!(f, "Root({:?})", state.memoized),
            Self::Hooks(hooks) => write!(f, "Hooks({})", hooks.len()),
            Self::Suspense { showing_fallback } => f
                .debug_struct("Suspense")
                .field("showing_fallback", showing_fallback)
                .finish(),
        }
    }
}

/// One unit of work: a position in the tree.
#[derive(Debug)]
pub struct Fiber<I> {
    pub(crate) kind: FiberKind,
    pub(crate) key: Option<Key>,
    pub(crate) pending_props: PendingProps,
    pub(crate) memoized_props: Option<PendingProps>,
    pub(crate) state: FiberState,
    pub(crate) flags: Flags,
    pub(crate) subtree_flags: Flags,
    pub(crate) lanes: Lanes,
    pub(crate) child_lanes: Lanes,
    pub(crate) parent: u32,
    pub(crate) child: u32,
    pub(crate) sibling: u32,
    pub(crate) index: usize,
    pub(crate) alternate: u32,
    pub(crate) deletions: Vec<u32>,
    pub(crate) instance: Option<I>,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) dependencies: Vec<Context>,
    pub(crate) dependency_lanes: Lanes,
}

impl<I> Fiber<I> {
    pub(crate) fn new(kind: FiberKind, key: Option<Key>, pending_props: PendingProps) -> Self {
        Self {
            kind,
            key,
            pending_props,
            memoized_props: None,
            state: FiberState::None,
            flags: Flags::NONE,
            subtree_flags: Flags::NONE,
            lanes: Lanes::NONE,
            child_lanes: Lanes::NONE,
            parent: INVALID,
            child: INVALID,
            sibling: INVALID,
            index: 0,
            alternate: INVALID,
            deletions: Vec::new(),
            instance: None,
            node_ref: None,
            dependencies: Vec::new(),
            dependency_lanes: Lanes::NONE,
        }
    }

    /// What this fiber is.
    #[must_use]
    pub fn kind(&self) -> &FiberKind {
        &self.kind
    }

    /// The reconciliation key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Effects recorded on this fiber by the last render.
    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Lanes with pending work on this fiber.
    #[must_use]
    pub fn lanes(&self) -> Lanes {
        self.lanes
    }

    /// Lanes with pending work somewhere below this fiber.
    #[must_use]
    pub fn child_lanes(&self) -> Lanes {
        self.child_lanes
    }

    /// The host instance, for host fibers and roots.
    #[must_use]
    pub fn instance(&self) -> Option<&I> {
        self.instance.as_ref()
    }

    /// Slot index of the first child, or [`INVALID`].
    #[must_use]
    pub fn child(&self) -> u32 {
        self.child
    }

    /// Slot index of the next sibling, or [`INVALID`].
    #[must_use]
    pub fn sibling(&self) -> u32 {
        self.sibling
    }
}

#[derive(Debug)]
struct Slot<I> {
    generation: u32,
    fiber: Option<Fiber<I>>,
}

/// Slot arena holding both trees.
#[derive(Debug)]
pub struct FiberStore<I> {
    slots: Vec<Slot<I>>,
    free_list: Vec<u32>,
    /// Slots allocated by the render in progress.
    pending_added: Vec<u32>,
}

impl<I> Default for FiberStore<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> FiberStore<I> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            pending_added: Vec::new(),
        }
    }

    /// Number of live fibers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Returns `true` if no fiber is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores a fiber that outlives any single render.
    pub(crate) fn insert(&mut self, fiber: Fiber<I>) -> u32 {
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize].fiber = Some(fiber);
            idx
        } else {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "slot count stays far below u32::MAX"
            )]
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                fiber: Some(fiber),
            });
            idx
        }
    }

    /// Stores a fiber allocated by the render in progress.
    ///
    /// Tracked fibers are released if the render is thrown away or if they
    /// end up outside the committed tree.
    pub(crate) fn insert_tracked(&mut self, fiber: Fiber<I>) -> u32 {
        let idx = self.insert(fiber);
        self.pending_added.push(idx);
        idx
    }

    /// Returns the fiber in a slot, or `None` if the slot is free.
    #[must_use]
    pub fn get(&self, idx: u32) -> Option<&Fiber<I>> {
        self.slots.get(idx as usize)?.fiber.as_ref()
    }

    pub(crate) fn get_mut(&mut self, idx: u32) -> Option<&mut Fiber<I>> {
        self.slots.get_mut(idx as usize)?.fiber.as_mut()
    }

    /// Returns a generational handle to a live slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot is free.
    #[must_use]
    pub fn id(&self, idx: u32) -> FiberId {
        assert!(self.get(idx).is_some(), "fiber slot {idx} is free");
        FiberId {
            idx,
            generation: self.slots[idx as usize].generation,
        }
    }

    /// A handle for the fiber being rendered at `idx` that outlives the
    /// render.
    ///
    /// Work-in-progress slots are freed when a render is thrown away, so
    /// this names the committed partner when there is one. A fiber without
    /// a partner is mounting and has nothing to outlive.
    #[must_use]
    pub fn stable_id(&self, idx: u32) -> FiberId {
        let alternate = self[idx].alternate;
        if self.get(alternate).is_some() {
            self.id(alternate)
        } else {
            self.id(idx)
        }
    }

    /// Maps a handle back to its slot, or `None` if it is stale.
    #[must_use]
    pub fn resolve(&self, id: FiberId) -> Option<u32> {
        let slot = self.slots.get(id.idx as usize)?;
        (slot.generation == id.generation && slot.fiber.is_some()).then_some(id.idx)
    }

    /// Returns whether the handle refers to a live fiber.
    #[must_use]
    pub fn is_alive(&self, id: FiberId) -> bool {
        self.resolve(id).is_some()
    }

    /// Frees a slot and unlinks it from its alternate.
    ///
    /// Releasing a free slot is a no-op.
    pub(crate) fn release(&mut self, idx: u32) {
        let Some(slot) = self.slots.get_mut(idx as usize) else {
            return;
        };
        let Some(fiber) = slot.fiber.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(idx);
        let partner = fiber.alternate;
        let Some(p) = self.get_mut(partner) else {
            return;
        };
        if p.alternate != idx {
            return;
        }
        p.alternate = INVALID;
        // Children shared between the pair may still name the freed slot.
        for first in [fiber.child, p.child] {
            let mut child = first;
            while let Some(c) = self.get_mut(child) {
                if c.parent == idx {
                    c.parent = partner;
                }
                child = c.sibling;
            }
        }
    }

    /// Releases every fiber allocated by an abandoned render.
    pub(crate) fn discard_pending(&mut self) -> usize {
        let pending = core::mem::take(&mut self.pending_added);
        let mut freed = 0;
        for idx in pending {
            if self.get(idx).is_some() {
                self.release(idx);
                freed += 1;
            }
        }
        freed
    }

    /// Keeps the render's allocations that made it into the tree under
    /// `root` and releases the rest.
    ///
    /// Reachability is settled by one walk of the finished tree.
    pub(crate) fn commit_pending(&mut self, root: u32) -> usize {
        let pending = core::mem::take(&mut self.pending_added);
        if pending.is_empty() {
            return 0;
        }
        let mut attached = vec![false; self.slots.len()];
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if self.get(idx).is_none() || core::mem::replace(&mut attached[idx as usize], true) {
                continue;
            }
            stack.extend(self.children(idx));
        }
        let mut freed = 0;
        for idx in pending {
            if self.get(idx).is_some() && !attached[idx as usize] {
                self.release(idx);
                freed += 1;
            }
        }
        freed
    }

    /// Iterates the child list of a fiber.
    pub(crate) fn children(&self, parent: u32) -> Children<'_, I> {
        Children {
            store: self,
            next: self.get(parent).map_or(INVALID, |f| f.child),
        }
    }
}

/// Iterator over a fiber's children, following sibling links.
#[derive(Debug)]
pub(crate) struct Children<'a, I> {
    store: &'a FiberStore<I>,
    next: u32,
}

impl<I> Iterator for Children<'_, I> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let current = self.next;
        let fiber = self.store.get(current)?;
        self.next = fiber.sibling;
        Some(current)
    }
}

impl<I> Index<u32> for FiberStore<I> {
    type Output = Fiber<I>;

    fn index(&self, idx: u32) -> &Fiber<I> {
        match self.get(idx) {
            Some(fiber) => fiber,
            None => panic!("fiber slot {idx} is free"),
        }
    }
}

impl<I> IndexMut<u32> for FiberStore<I> {
    fn index_mut(&mut self, idx: u32) -> &mut Fiber<I> {
        match self.get_mut(idx) {
            Some(fiber) => fiber,
            None => panic!("fiber slot {idx} is free"),
        }
    }
}

/// Returns the work-in-progress partner of `current`, prepared for a new
/// render with `props`.
///
/// The first call for a fiber allocates the partner; later calls reuse it,
/// resetting its effects while copying the committed child link, state, and
/// lanes from `current`.
pub(crate) fn create_alternate<I: Clone>(
    fibers: &mut FiberStore<I>,
    current: u32,
    props: PendingProps,
) -> u32 {
    let alternate = fibers[current].alternate;
    let wip = if alternate == INVALID {
        let source = &fibers[current];
        let mut fiber = Fiber::new(source.kind.clone(), source.key.clone(), props);
        fiber.instance = source.instance.clone();
        fiber.alternate = current;
        let wip = fibers.insert_tracked(fiber);
        fibers[current].alternate = wip;
        wip
    } else {
        let fiber = &mut fibers[alternate];
        fiber.pending_props = props;
        fiber.flags = Flags::NONE;
        fiber.subtree_flags = Flags::NONE;
        fiber.deletions.clear();
        alternate
    };

    let source = &fibers[current];
    let child = source.child;
    let sibling = source.sibling;
    let index = source.index;
    let memoized_props = source.memoized_props.clone();
    let state = source.state.clone();
    let lanes = source.lanes;
    let child_lanes = source.child_lanes;
    let node_ref = source.node_ref.clone();
    let dependencies = source.dependencies.clone();
    let dependency_lanes = source.dependency_lanes;

    let fiber = &mut fibers[wip];
    fiber.child = child;
    fiber.sibling = sibling;
    fiber.index = index;
    fiber.memoized_props = memoized_props;
    fiber.state = state;
    fiber.lanes = lanes;
    fiber.child_lanes = child_lanes;
    fiber.node_ref = node_ref;
    fiber.dependencies = dependencies;
    fiber.dependency_lanes = dependency_lanes;
    wip
}
