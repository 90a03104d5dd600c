// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Child reconciliation.
//!
//! Diffs a parent's committed child list against a new [`Node`] description
//! and produces the work-in-progress child list. Reused children are paired
//! with their committed fiber through [`create_alternate`]; children that
//! disappear are queued on the parent's deletion list.
//!
//! Lists are matched by key (explicit key, else position). A reused child
//! whose previous position is lower than the highest previous position seen
//! so far is flagged for placement (a move); otherwise it stays where it is
//! and raises that watermark.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;

use crate::element::{Element, ElementType, Key, Node};
use crate::fiber::{Fiber, FiberKind, FiberStore, INVALID, PendingProps, create_alternate};
use crate::flags::Flags;

/// Identity of a child within its parent's list.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ChildKey {
    Explicit(Key),
    Index(usize),
}

impl ChildKey {
    fn of_fiber<I>(fiber: &Fiber<I>) -> Self {
        match &fiber.key {
            Some(key) => Self::Explicit(key.clone()),
            None => Self::Index(fiber.index),
        }
    }

    fn of_node(node: &Node, index: usize) -> Self {
        match node {
            Node::Element(Element { key: Some(key), .. }) => Self::Explicit(key.clone()),
            _ => Self::Index(index),
        }
    }
}

/// One instantiation of the diff.
///
/// [`MOUNT`](Self::MOUNT) skips placement and deletion bookkeeping because a
/// freshly mounted parent inserts its whole subtree at once.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChildReconciler {
    track_effects: bool,
}

impl ChildReconciler {
    pub(crate) const MOUNT: Self = Self {
        track_effects: false,
    };
    pub(crate) const UPDATE: Self = Self {
        track_effects: true,
    };

    /// Returns the first new child, or [`INVALID`] for no children.
    pub(crate) fn reconcile<I: Clone>(
        self,
        fibers: &mut FiberStore<I>,
        parent: u32,
        current_first: u32,
        children: &Node,
    ) -> u32 {
        let children = match children {
            Node::Element(Element {
                ty: ElementType::Fragment,
                key: None,
                props,
                ..
            }) => &props.children,
            other => other,
        };
        match children {
            Node::Text(content) => {
                let fiber = self.reconcile_single_text(fibers, parent, current_first, content);
                self.place_single_child(fibers, fiber)
            }
            Node::Element(element) => {
                let fiber = self.reconcile_single_element(fibers, parent, current_first, element);
                self.place_single_child(fibers, fiber)
            }
            Node::List(items) => self.reconcile_list(fibers, parent, current_first, items),
            Node::Empty => {
                self.delete_remaining(fibers, parent, current_first);
                INVALID
            }
        }
    }

    fn delete_child<I>(self, fibers: &mut FiberStore<I>, parent: u32, child: u32) {
        if !self.track_effects {
            return;
        }
        let parent = &mut fibers[parent];
        parent.deletions.push(child);
        parent.flags.insert(Flags::CHILD_DELETION);
    }

    fn delete_remaining<I>(self, fibers: &mut FiberStore<I>, parent: u32, first: u32) {
        if !self.track_effects {
            return;
        }
        let mut child = first;
        while child != INVALID {
            let next = fibers[child].sibling;
            self.delete_child(fibers, parent, child);
            child = next;
        }
    }

    fn reconcile_single_text<I: Clone>(
        self,
        fibers: &mut FiberStore<I>,
        parent: u32,
        current_first: u32,
        content: &Rc<str>,
    ) -> u32 {
        if let Some(first) = fibers.get(current_first)
            && matches!(first.kind, FiberKind::HostText)
        {
            let rest = first.sibling;
            self.delete_remaining(fibers, parent, rest);
            let existing = use_fiber(fibers, current_first, PendingProps::Text(content.clone()));
            fibers[existing].parent = parent;
            return existing;
        }
        self.delete_remaining(fibers, parent, current_first);
        create_child(fibers, parent, &Node::Text(content.clone())).unwrap_or(INVALID)
    }

    fn reconcile_single_element<I: Clone>(
        self,
        fibers: &mut FiberStore<I>,
        parent: u32,
        current_first: u32,
        element: &Element,
    ) -> u32 {
        let mut child = current_first;
        while child != INVALID {
            let fiber = &fibers[child];
            let sibling = fiber.sibling;
            if fiber.key == element.key {
                if fiber.kind.matches(&element.ty) {
                    self.delete_remaining(fibers, parent, sibling);
                    let existing = use_fiber(
                        fibers,
                        child,
                        PendingProps::Element(element.props.clone()),
                    );
                    let fiber = &mut fibers[existing];
                    fiber.node_ref = element.node_ref.clone();
                    fiber.parent = parent;
                    return existing;
                }
                self.delete_remaining(fibers, parent, child);
                break;
            }
            self.delete_child(fibers, parent, child);
            child = sibling;
        }
        create_child(fibers, parent, &Node::Element(element.clone())).unwrap_or(INVALID)
    }

    fn place_single_child<I>(self, fibers: &mut FiberStore<I>, fiber: u32) -> u32 {
        if self.track_effects
            && let Some(f) = fibers.get_mut(fiber)
            && f.alternate == INVALID
        {
            f.flags.insert(Flags::PLACEMENT);
        }
        fiber
    }

    /// Flags a list child for placement if it is new or moved, and returns
    /// the new watermark.
    fn place_child<I>(self, fibers: &mut FiberStore<I>, fiber: u32, last_placed: usize) -> usize {
        if !self.track_effects {
            return last_placed;
        }
        let current = fibers[fiber].alternate;
        if let Some(old_index) = fibers.get(current).map(|f| f.index)
            && old_index >= last_placed
        {
            return old_index;
        }
        fibers[fiber].flags.insert(Flags::PLACEMENT);
        last_placed
    }

    fn reconcile_list<I: Clone>(
        self,
        fibers: &mut FiberStore<I>,
        parent: u32,
        current_first: u32,
        items: &[Node],
    ) -> u32 {
        let mut existing = BTreeMap::new();
        let mut child = current_first;
        while let Some(fiber) = fibers.get(child) {
            existing.insert(ChildKey::of_fiber(fiber), child);
            child = fiber.sibling;
        }

        let mut first = INVALID;
        let mut previous = INVALID;
        let mut last_placed = 0;
        for (index, item) in items.iter().enumerate() {
            let key = ChildKey::of_node(item, index);
            let reusable = existing
                .get(&key)
                .copied()
                .filter(|&old| compatible(&fibers[old], item));
            let fiber = match reusable {
                Some(old) => {
                    existing.remove(&key);
                    Some(update_from(fibers, old, item))
                }
                None => create_child(fibers, parent, item),
            };
            let Some(fiber) = fiber else {
                continue;
            };

            let f = &mut fibers[fiber];
            f.index = index;
            f.parent = parent;
            last_placed = self.place_child(fibers, fiber, last_placed);
            if previous == INVALID {
                first = fiber;
            } else {
                fibers[previous].sibling = fiber;
            }
            previous = fiber;
        }

        for old in existing.into_values() {
            self.delete_child(fibers, parent, old);
        }
        first
    }
}

/// Reuses `fiber` for a new render as the only child so far.
fn use_fiber<I: Clone>(fibers: &mut FiberStore<I>, fiber: u32, props: PendingProps) -> u32 {
    let clone = create_alternate(fibers, fiber, props);
    let f = &mut fibers[clone];
    f.index = 0;
    f.sibling = INVALID;
    clone
}

fn compatible<I>(fiber: &Fiber<I>, node: &Node) -> bool {
    match node {
        Node::Text(_) => matches!(fiber.kind, FiberKind::HostText),
        Node::Element(element) => fiber.kind.matches(&element.ty),
        Node::List(_) => matches!(fiber.kind, FiberKind::Fragment) && fiber.key.is_none(),
        Node::Empty => false,
    }
}

fn update_from<I: Clone>(fibers: &mut FiberStore<I>, old: u32, node: &Node) -> u32 {
    match node {
        Node::Text(content) => use_fiber(fibers, old, PendingProps::Text(content.clone())),
        Node::Element(element) => {
            let fiber = use_fiber(fibers, old, PendingProps::Element(element.props.clone()));
            fibers[fiber].node_ref = element.node_ref.clone();
            fiber
        }
        Node::List(_) | Node::Empty => use_fiber(fibers, old, PendingProps::Fragment(node.clone())),
    }
}

/// Allocates a fiber for `node`, or returns `None` for an empty slot.
fn create_child<I>(fibers: &mut FiberStore<I>, parent: u32, node: &Node) -> Option<u32> {
    let mut fiber = match node {
        Node::Empty => return None,
        Node::Text(content) => {
            Fiber::new(FiberKind::HostText, None, PendingProps::Text(content.clone()))
        }
        Node::Element(element) => {
            let mut fiber = Fiber::new(
                FiberKind::from_element(&element.ty),
                element.key.clone(),
                PendingProps::Element(element.props.clone()),
            );
            fiber.node_ref = element.node_ref.clone();
            fiber
        }
        Node::List(_) => Fiber::new(FiberKind::Fragment, None, PendingProps::Fragment(node.clone())),
    };
    fiber.parent = parent;
    Some(fibers.insert_tracked(fiber))
}

/// Reconciles the children of `wip`, choosing the diff variant by whether
/// `wip` has a committed counterpart.
pub(crate) fn reconcile_children<I: Clone>(fibers: &mut FiberStore<I>, wip: u32, children: &Node) {
    let current = fibers[wip].alternate;
    let child = match fibers.get(current) {
        Some(current) => {
            let first = current.child;
            ChildReconciler::UPDATE.reconcile(fibers, wip, first, children)
        }
        None => ChildReconciler::MOUNT.reconcile(fibers, wip, INVALID, children),
    };
    fibers[wip].child = child;
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::root::RootId;

    fn keyed(keys: &[&str]) -> Node {
        Node::list(
            keys.iter()
                .map(|k| Element::host("li").with_key(*k).into()),
        )
    }

    fn children<I>(fibers: &FiberStore<I>, parent: u32) -> Vec<u32> {
        fibers.children(parent).collect()
    }

    /// Commits a render the way the commit phase does for the parts these
    /// tests look at: the wip parent becomes current and flags are cleared.
    fn commit(fibers: &mut FiberStore<u32>, wip: u32) {
        for child in children(fibers, wip) {
            fibers[child].memoized_props = Some(fibers[child].pending_props.clone());
            fibers[child].flags = Flags::NONE;
        }
        fibers[wip].flags = Flags::NONE;
        fibers[wip].deletions.clear();
        fibers.commit_pending(wip);
    }

    fn root(fibers: &mut FiberStore<u32>) -> u32 {
        fibers.insert(Fiber::new(FiberKind::Root(RootId(0)), None, PendingProps::Root))
    }

    /// Pairs `current` with a fresh wip parent and reconciles `next` into it.
    fn rerender(fibers: &mut FiberStore<u32>, current: u32, next: &Node) -> u32 {
        let wip = create_alternate(fibers, current, PendingProps::Root);
        reconcile_children(fibers, wip, next);
        wip
    }

    #[test]
    fn mount_does_not_track_placements() {
        let mut fibers = FiberStore::<u32>::new();
        let parent = root(&mut fibers);
        reconcile_children(&mut fibers, parent, &keyed(&["a", "b"]));
        let kids = children(&fibers, parent);
        assert_eq!(kids.len(), 2);
        assert!(kids.iter().all(|&k| fibers[k].flags.is_empty()));
        assert_eq!(fibers[kids[1]].index, 1);
    }

    #[test]
    fn moving_last_to_front_flags_the_displaced_tail() {
        let mut fibers = FiberStore::<u32>::new();
        let current = root(&mut fibers);
        reconcile_children(&mut fibers, current, &keyed(&["a", "b", "c"]));
        commit(&mut fibers, current);
        let before = fibers.len();

        let wip = rerender(&mut fibers, current, &keyed(&["c", "a", "b"]));
        let kids = children(&fibers, wip);
        let flagged: Vec<bool> = kids
            .iter()
            .map(|&k| fibers[k].flags.contains(Flags::PLACEMENT))
            .collect();
        assert_eq!(flagged, [false, true, true]);
        assert!(fibers[wip].deletions.is_empty());
        // One wip partner per reused child plus the parent.
        assert_eq!(fibers.len(), before + 4);
    }

    #[test]
    fn moving_first_to_back_flags_one_child() {
        let mut fibers = FiberStore::<u32>::new();
        let current = root(&mut fibers);
        reconcile_children(&mut fibers, current, &keyed(&["a", "b", "c"]));
        commit(&mut fibers, current);

        let wip = rerender(&mut fibers, current, &keyed(&["b", "c", "a"]));
        let placed: Vec<Key> = children(&fibers, wip)
            .into_iter()
            .filter(|&k| fibers[k].flags.contains(Flags::PLACEMENT))
            .filter_map(|k| fibers[k].key.clone())
            .collect();
        assert_eq!(placed, [Key::from("a")]);
    }

    #[test]
    fn removed_keys_are_deleted_and_new_ones_placed() {
        let mut fibers = FiberStore::<u32>::new();
        let current = root(&mut fibers);
        reconcile_children(&mut fibers, current, &keyed(&["a", "b"]));
        commit(&mut fibers, current);
        let old_b = children(&fibers, current)[1];

        let wip = rerender(&mut fibers, current, &keyed(&["a", "z"]));
        assert_eq!(fibers[wip].deletions, [old_b]);
        assert!(fibers[wip].flags.contains(Flags::CHILD_DELETION));
        let kids = children(&fibers, wip);
        assert!(fibers[kids[1]].flags.contains(Flags::PLACEMENT));
        assert!(!fibers[kids[0]].flags.contains(Flags::PLACEMENT));
    }

    #[test]
    fn single_text_reuses_text_child() {
        let mut fibers = FiberStore::<u32>::new();
        let current = root(&mut fibers);
        reconcile_children(&mut fibers, current, &Node::text("a"));
        commit(&mut fibers, current);
        let old = fibers[current].child;

        let wip = rerender(&mut fibers, current, &Node::text("b"));
        let child = fibers[wip].child;
        assert_eq!(fibers[child].alternate, old);
        assert!(fibers[child].flags.is_empty());
        assert!(fibers[wip].deletions.is_empty());
    }

    #[test]
    fn single_element_with_new_type_replaces() {
        let mut fibers = FiberStore::<u32>::new();
        let current = root(&mut fibers);
        reconcile_children(&mut fibers, current, &Element::host("p").into());
        commit(&mut fibers, current);
        let old = fibers[current].child;

        let wip = rerender(&mut fibers, current, &Element::host("div").into());
        let child = fibers[wip].child;
        assert_eq!(fibers[child].alternate, INVALID);
        assert!(fibers[child].flags.contains(Flags::PLACEMENT));
        assert_eq!(fibers[wip].deletions, [old]);
    }

    #[test]
    fn unkeyed_fragment_is_unwrapped() {
        let mut fibers = FiberStore::<u32>::new();
        let parent = root(&mut fibers);
        let fragment = Element::fragment().with_children(Node::list([
            Node::text("x"),
            Element::host("b").into(),
        ]));
        reconcile_children(&mut fibers, parent, &fragment.into());
        let kinds: Vec<_> = children(&fibers, parent)
            .into_iter()
            .map(|k| fibers[k].kind.tag())
            .collect();
        assert_eq!(
            kinds,
            [
                crate::fiber::WorkTag::HostText,
                crate::fiber::WorkTag::HostElement
            ]
        );
    }

    #[test]
    fn empty_slots_keep_positions() {
        let mut fibers = FiberStore::<u32>::new();
        let parent = root(&mut fibers);
        let list = Node::list([Node::Empty, Node::text("x")]);
        reconcile_children(&mut fibers, parent, &list);
        let kids = children(&fibers, parent);
        assert_eq!(kids.len(), 1);
        assert_eq!(fibers[kids[0]].index, 1);
    }
}
