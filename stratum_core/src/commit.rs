// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The commit phase and the passive effect flush.
//!
//! Commit applies a finished work-in-progress tree to the host in one
//! uninterrupted pass:
//!
//! 1. **Mutation**: deletions, then children, then the fiber's own
//!    placement, update, ref detach, and visibility toggle.
//! 2. **Flip**: the finished tree becomes the root's current tree.
//! 3. **Layout**: refs are attached, effects of components flagged
//!    `PASSIVE` are collected, and effect flags are cleared.
//!
//! Effects collected by commit run later, in
//! [`flush_passive_effects_on_root`](Reconciler::flush_passive_effects_on_root),
//! which is scheduled at normal priority and also runs before any new render
//! of the same root.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::error::{HostError, ReconcileError};
use crate::fiber::{FiberKind, FiberStore, INVALID, OffscreenMode, PendingProps};
use crate::flags::{EffectTag, Flags};
use crate::hooks::{EffectHook, Hook};
use crate::host::HostConfig;
use crate::lane::Lanes;
use crate::reconciler::Reconciler;
use crate::root::RootId;
use crate::scheduler::{PriorityLevel, Task, TaskKind, TimeSlicer};
use crate::trace::{
    CommitEvent, CommitPhase, CommitStats, PassiveFlushEvent, ScheduleEvent, ScheduleKind,
};

impl<H: HostConfig, S: TimeSlicer> Reconciler<H, S> {
    /// Commits the root's finished tree, if it has one.
    pub(crate) fn commit_root(&mut self, id: RootId) -> Result<(), ReconcileError> {
        let root = &mut self.roots[id.0 as usize];
        let finished = core::mem::replace(&mut root.finished_work, INVALID);
        let lane = core::mem::replace(&mut root.finished_lane, Lanes::NONE);
        if finished == INVALID {
            return Ok(());
        }
        let container = root.container.clone();
        self.trace(move |t, seq| {
            t.commit(&CommitEvent {
                seq,
                root: id,
                lane,
                phase: CommitPhase::Begin,
                stats: CommitStats::default(),
            });
        });

        let effects = self.fibers[finished].flags | self.fibers[finished].subtree_flags;
        if effects.intersects(Flags::PASSIVE_MASK) && !self.roots[id.0 as usize].passive_scheduled {
            self.roots[id.0 as usize].passive_scheduled = true;
            self.slicer.schedule(
                PriorityLevel::Normal,
                Task {
                    root: id,
                    kind: TaskKind::PassiveEffects,
                },
            );
            self.trace(move |t, seq| {
                t.schedule(&ScheduleEvent {
                    seq,
                    root: id,
                    lane,
                    kind: ScheduleKind::Passive,
                });
            });
        }

        let mut committer = Committer {
            fibers: &mut self.fibers,
            host: &mut self.host,
            container,
            stats: CommitStats::default(),
            unmount: Vec::new(),
            deleted: Vec::new(),
            update: Vec::new(),
        };
        if effects.intersects(Flags::MUTATION_MASK) {
            committer.commit_mutation_effects(finished)?;
        }

        let root = &mut self.roots[id.0 as usize];
        root.current = finished;
        root.mark_finished(lane);
        let remaining = committer.fibers[finished].lanes | committer.fibers[finished].child_lanes;
        root.pending_lanes |= remaining;

        committer.commit_layout_effects(finished);
        let Committer {
            stats,
            unmount,
            deleted,
            update,
            ..
        } = committer;
        self.release_deleted(&deleted);
        self.fibers.commit_pending(finished);

        let passive = &mut self.roots[id.0 as usize].pending_passive;
        passive.unmount.extend(unmount);
        passive.update.extend(update);

        self.trace(move |t, seq| {
            t.commit(&CommitEvent {
                seq,
                root: id,
                lane,
                phase: CommitPhase::End,
                stats,
            });
        });
        Ok(())
    }

    /// Frees deleted subtrees along with their alternates.
    fn release_deleted(&mut self, deleted: &[u32]) {
        let mut doomed = BTreeSet::new();
        let mut stack: Vec<u32> = deleted.to_vec();
        while let Some(idx) = stack.pop() {
            let Some(fiber) = self.fibers.get(idx) else {
                continue;
            };
            if !doomed.insert(idx) {
                continue;
            }
            if fiber.alternate != INVALID {
                stack.push(fiber.alternate);
            }
            stack.extend(self.fibers.children(idx));
        }
        for idx in doomed {
            self.fibers.release(idx);
        }
    }

    /// Runs the root's pending passive effects.
    ///
    /// Unmount cleanups run first, then the cleanups of effects that fire
    /// again, then their creates. Returns `true` if anything was pending.
    pub(crate) fn flush_passive_effects_on_root(&mut self, id: RootId) -> bool {
        let root = &mut self.roots[id.0 as usize];
        root.passive_scheduled = false;
        if root.pending_passive.is_empty() {
            return false;
        }
        let pending = core::mem::take(&mut root.pending_passive);
        let firing = EffectTag::HAS_EFFECT | EffectTag::PASSIVE;

        let mut unmounts = 0;
        for effect in pending.unmount.iter().flatten() {
            let destroy = effect.inst.borrow_mut().destroy.take();
            if let Some(destroy) = destroy {
                destroy();
                unmounts += 1;
            }
        }

        let mut destroys = 0;
        for effect in pending.update.iter().flatten() {
            if !effect.tag.contains(firing) {
                continue;
            }
            let destroy = effect.inst.borrow_mut().destroy.take();
            if let Some(destroy) = destroy {
                destroy();
                destroys += 1;
            }
        }

        let mut creates = 0;
        for effect in pending.update.iter().flatten() {
            if !effect.tag.contains(firing) {
                continue;
            }
            let destroy = (effect.create)();
            effect.inst.borrow_mut().destroy = destroy;
            creates += 1;
        }

        self.trace(move |t, seq| {
            t.passive_flush(&PassiveFlushEvent {
                seq,
                root: id,
                unmounts,
                destroys,
                creates,
            });
        });
        true
    }
}

fn effects_of(hooks: &[Hook]) -> Vec<EffectHook> {
    hooks
        .iter()
        .filter_map(|hook| match hook {
            Hook::Effect(effect) => Some(effect.clone()),
            Hook::State(_) | Hook::Ref(_) => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Committer
// ---------------------------------------------------------------------------

struct Committer<'a, H: HostConfig> {
    fibers: &'a mut FiberStore<H::Instance>,
    host: &'a mut H,
    container: H::Instance,
    stats: CommitStats,
    /// Effect lists of deleted components.
    unmount: Vec<Vec<EffectHook>>,
    /// Roots of deleted subtrees, released once the tree has flipped.
    deleted: Vec<u32>,
    /// Effect lists of committed components flagged `PASSIVE`.
    update: Vec<Vec<EffectHook>>,
}

impl<H: HostConfig> Committer<'_, H> {
    fn commit_mutation_effects(&mut self, idx: u32) -> Result<(), HostError> {
        let deletions = core::mem::take(&mut self.fibers[idx].deletions);
        if !deletions.is_empty() {
            let parent = self.host_parent_of_children(idx);
            for &child in &deletions {
                self.commit_deletion(parent.as_ref(), child)?;
                self.stats.deletions += 1;
            }
            self.deleted.extend(deletions);
        }

        if self.fibers[idx].subtree_flags.intersects(Flags::MUTATION_MASK) {
            let mut child = self.fibers[idx].child;
            while child != INVALID {
                self.commit_mutation_effects(child)?;
                child = self.fibers[child].sibling;
            }
        }

        let flags = self.fibers[idx].flags;
        if flags.contains(Flags::PLACEMENT) {
            self.commit_placement(idx)?;
            self.fibers[idx].flags.remove(Flags::PLACEMENT);
            self.stats.placements += 1;
        }
        if flags.contains(Flags::UPDATE) {
            self.commit_update(idx);
        }
        if flags.contains(Flags::REF) {
            let current = self.fibers[idx].alternate;
            if let Some(old) = self.fibers.get(current).and_then(|f| f.node_ref.as_ref()) {
                old.detach();
            }
        }
        if flags.contains(Flags::VISIBILITY)
            && let PendingProps::Offscreen { mode, .. } = self.fibers[idx].pending_props
        {
            self.hide_or_show(idx, mode == OffscreenMode::Hidden);
            self.stats.visibility += 1;
        }
        Ok(())
    }

    /// The host node children of `idx` are attached to: its own instance if
    /// it is a host element, else the nearest host ancestor's.
    fn host_parent_of_children(&self, idx: u32) -> Option<H::Instance> {
        let mut node = idx;
        while let Some(fiber) = self.fibers.get(node) {
            match fiber.kind {
                FiberKind::HostElement(_) => return fiber.instance.clone(),
                FiberKind::Root(_) => return Some(self.container.clone()),
                _ => node = fiber.parent,
            }
        }
        None
    }

    fn is_host_parent(&self, idx: u32) -> bool {
        matches!(
            self.fibers[idx].kind,
            FiberKind::HostElement(_) | FiberKind::Root(_)
        )
    }

    /// Unmounts a deleted subtree: detaches refs, queues effect cleanups,
    /// and removes its top-level host nodes from `parent`.
    fn commit_deletion(
        &mut self,
        parent: Option<&H::Instance>,
        idx: u32,
    ) -> Result<(), HostError> {
        let fiber = &self.fibers[idx];
        if let Some(node_ref) = &fiber.node_ref {
            node_ref.detach();
        }
        if let Some(hooks) = fiber.state.hooks() {
            let effects = effects_of(hooks);
            if !effects.is_empty() {
                self.unmount.push(effects);
            }
        }
        let nested_parent = if fiber.kind.is_host() {
            if let (Some(parent), Some(instance)) = (parent, fiber.instance.clone()) {
                self.host.remove_child(parent, &instance)?;
            }
            None
        } else {
            parent
        };
        let mut child = self.fibers[idx].child;
        while child != INVALID {
            self.commit_deletion(nested_parent, child)?;
            child = self.fibers[child].sibling;
        }
        Ok(())
    }

    fn commit_placement(&mut self, idx: u32) -> Result<(), HostError> {
        let parent = self.fibers[idx].parent;
        let Some(host_parent) = self.host_parent_of_children(parent) else {
            return Ok(());
        };
        let before = self.host_sibling(idx);
        self.insert_or_append(idx, before.as_ref(), &host_parent)
    }

    /// The first host node after `idx` in host order that is already in
    /// place, if any.
    fn host_sibling(&self, idx: u32) -> Option<H::Instance> {
        let mut node = idx;
        'siblings: loop {
            while self.fibers[node].sibling == INVALID {
                let parent = self.fibers[node].parent;
                if parent == INVALID || self.is_host_parent(parent) {
                    return None;
                }
                node = parent;
            }
            node = self.fibers[node].sibling;
            while !self.fibers[node].kind.is_host() {
                let fiber = &self.fibers[node];
                if fiber.flags.contains(Flags::PLACEMENT) || fiber.child == INVALID {
                    continue 'siblings;
                }
                node = fiber.child;
            }
            let fiber = &self.fibers[node];
            if !fiber.flags.contains(Flags::PLACEMENT) {
                return fiber.instance.clone();
            }
        }
    }

    fn insert_or_append(
        &mut self,
        idx: u32,
        before: Option<&H::Instance>,
        parent: &H::Instance,
    ) -> Result<(), HostError> {
        let fiber = &self.fibers[idx];
        if fiber.kind.is_host() {
            let Some(instance) = fiber.instance.clone() else {
                return Ok(());
            };
            return match before {
                Some(reference) => self.host.insert_before(parent, &instance, reference),
                None => self.host.append_child(parent, &instance),
            };
        }
        let mut child = fiber.child;
        while child != INVALID {
            self.insert_or_append(child, before, parent)?;
            child = self.fibers[child].sibling;
        }
        Ok(())
    }

    fn commit_update(&mut self, idx: u32) {
        let fiber = &self.fibers[idx];
        let Some(instance) = &fiber.instance else {
            return;
        };
        match &fiber.pending_props {
            PendingProps::Element(props) => self.host.apply_props(instance, props),
            PendingProps::Text(content) => self.host.set_text_content(instance, content),
            _ => return,
        }
        self.stats.updates += 1;
    }

    /// Toggles the top-level host nodes of an offscreen subtree.
    fn hide_or_show(&mut self, idx: u32, hidden: bool) {
        let mut child = self.fibers[idx].child;
        while child != INVALID {
            let fiber = &self.fibers[child];
            if fiber.kind.is_host() {
                if let Some(instance) = &fiber.instance {
                    self.host.set_visibility(instance, hidden);
                }
            } else {
                self.hide_or_show(child, hidden);
            }
            child = self.fibers[child].sibling;
        }
    }

    fn commit_layout_effects(&mut self, idx: u32) {
        let fiber = &self.fibers[idx];
        if (fiber.flags | fiber.subtree_flags).is_empty() {
            return;
        }
        if !fiber.subtree_flags.is_empty() {
            let mut child = fiber.child;
            while child != INVALID {
                self.commit_layout_effects(child);
                child = self.fibers[child].sibling;
            }
        }

        let fiber = &mut self.fibers[idx];
        if fiber.flags.contains(Flags::REF)
            && let (Some(node_ref), Some(instance)) = (&fiber.node_ref, &fiber.instance)
        {
            node_ref.attach(instance.clone());
        }
        if fiber.flags.contains(Flags::PASSIVE)
            && let Some(hooks) = fiber.state.hooks()
        {
            self.update.push(effects_of(hooks));
        }
        fiber.flags = Flags::NONE;
        fiber.subtree_flags = Flags::NONE;
    }
}
