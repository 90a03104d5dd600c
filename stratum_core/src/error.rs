// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types surfaced by the host adapter and the reconciler.

use alloc::rc::Rc;
use alloc::string::String;

use thiserror::Error;

use crate::lane::Lanes;
use crate::root::RootId;

/// Structural misuse reported by a [`HostConfig`](crate::host::HostConfig).
///
/// These indicate a broken invariant in the caller and are never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostError {
    /// The node already has a different parent.
    #[error("node {child} is already mounted under another parent")]
    AlreadyMounted {
        /// The node being inserted.
        child: String,
    },
    /// The node is not a child of the given parent.
    #[error("node {child} is not a child of {parent}")]
    NotAChild {
        /// The parent the removal targeted.
        parent: String,
        /// The node being removed.
        child: String,
    },
    /// The insertion reference is not a child of the given parent.
    #[error("reference node {reference} is not a child of {parent}")]
    ReferenceNotFound {
        /// The parent the insertion targeted.
        parent: String,
        /// The reference node.
        reference: String,
    },
    /// The host does not know the node.
    #[error("unknown host node {node}")]
    UnknownNode {
        /// The unknown node.
        node: String,
    },
}

/// A failure raised by a function component or by a rejected awaitable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ComponentError {
    message: Rc<str>,
}

impl ComponentError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<Rc<str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by the [`Reconciler`](crate::reconciler::Reconciler) entry points.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ReconcileError {
    /// A host call failed while rendering or committing.
    ///
    /// Like [`RenderFailed`](Self::RenderFailed), the lane is parked until a
    /// new update arrives.
    #[error(transparent)]
    Host(#[from] HostError),
    /// Rendering kept failing until the retry budget ran out.
    ///
    /// The lane is parked as suspended and is not rescheduled until a new
    /// update arrives.
    #[error("render at {lane:?} failed after {attempts} attempts: {reason}")]
    RenderFailed {
        /// The lane that was being rendered.
        lane: Lanes,
        /// How many attempts were made.
        attempts: u32,
        /// The last failure.
        #[source]
        reason: ComponentError,
    },
    /// A component called its hooks in a different order, or a different
    /// number of them, than on its previous render.
    ///
    /// The render is not retried and the lane is parked until a new update
    /// arrives.
    #[error("component {component} changed hook {index} between renders")]
    HookOrder {
        /// The component's name.
        component: String,
        /// Position of the first hook that did not match.
        index: usize,
    },
    /// The root handle does not belong to this reconciler.
    #[error("unknown root {0:?}")]
    UnknownRoot(RootId),
}
