// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host adapter contract.
//!
//! The reconciler never touches concrete output nodes. It describes the
//! mutations it wants through a [`HostConfig`], which an embedder implements
//! for its platform (a DOM, a native widget tree, or an in-memory tree for
//! tests).
//!
//! Construction happens while completing a unit of work: a new host element
//! is created and all host nodes of its subtree are appended to it before it
//! is attached anywhere. Attaching to the live tree, updating, hiding, and
//! removing nodes only happen during commit.

use core::fmt::Debug;

use crate::element::Props;
use crate::error::HostError;
use crate::scheduler::Microtask;

/// Creates and mutates nodes of a host-managed output tree.
pub trait HostConfig {
    /// A handle to a host node. The root container is also an instance.
    type Instance: Clone + Eq + Debug + 'static;

    /// Creates a detached element node.
    fn create_node(&mut self, tag: &str, props: &Props) -> Self::Instance;

    /// Creates a detached text node.
    fn create_text_node(&mut self, content: &str) -> Self::Instance;

    /// Appends `child` as the last child of `parent`.
    ///
    /// If `child` is already a child of `parent`, it is moved to the end.
    /// Implementations report a child mounted under a different parent as
    /// [`HostError::AlreadyMounted`].
    fn append_child(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), HostError>;

    /// Inserts `child` into `parent` right before `reference`.
    fn insert_before(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
        reference: &Self::Instance,
    ) -> Result<(), HostError>;

    /// Detaches `child` from `parent`.
    fn remove_child(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), HostError>;

    /// Replaces the content of a text node.
    fn set_text_content(&mut self, node: &Self::Instance, content: &str);

    /// Hides or shows a node without detaching it.
    fn set_visibility(&mut self, node: &Self::Instance, hidden: bool);

    /// Syncs new props into an existing element node.
    fn apply_props(&mut self, node: &Self::Instance, props: &Props);

    /// Asks the embedder to hand `task` back to
    /// [`Reconciler::run_microtask`](crate::reconciler::Reconciler::run_microtask)
    /// at the end of the current macrotask.
    fn schedule_microtask(&mut self, task: Microtask);
}
