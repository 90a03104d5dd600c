// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Priority-aware, interruptible tree reconciliation.
//!
//! `stratum_core` turns descriptions of a UI tree ([`Node`](element::Node)s
//! built from host elements, function components, context providers, and
//! suspense boundaries) into the smallest set of mutations on a host tree.
//! It is `no_std` compatible (with `alloc`), single-threaded, and never owns
//! an event loop: the embedder supplies a [`HostConfig`](host::HostConfig)
//! and a [`TimeSlicer`](scheduler::TimeSlicer) and hands scheduled callbacks
//! back to the [`Reconciler`](reconciler::Reconciler).
//!
//! # Architecture
//!
//! Every root keeps two fiber trees in one slot arena: the committed tree and
//! a work-in-progress tree whose fibers are paired with their committed
//! counterparts through `alternate` links. Rendering builds the
//! work-in-progress tree one unit of work at a time and may yield between
//! units; committing applies its effects to the host and flips the pair.
//!
//! ```text
//!   update ──► lane ──► ensure_root_is_scheduled
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼ SYNC                          ▼ other lanes
//!        microtask flush                 TimeSlicer task
//!              │                               │
//!              └──────────► render_root ◄──────┘
//!                    begin_work / complete_work (may yield)
//!                              │
//!                              ▼
//!                         commit_root ──► HostConfig mutations
//!                              │
//!                              ▼
//!                     passive effect flush
//! ```
//!
//! **[`lane`]**: priority lanes and their mapping to scheduler priorities.
//!
//! **[`fiber`]**: the fiber arena with generational handles and the
//! double-buffer pairing.
//!
//! **[`element`]**: nodes, elements, components, contexts, and refs.
//!
//! **[`reconciler`]**: roots, update entry points, and the callbacks the
//! embedder drives.
//!
//! **[`work_loop`]**: the render driver, time slicing, and root scheduling.
//!
//! **[`hooks`]**: the [`Scope`](hooks::Scope) handed to function components.
//!
//! **[`suspense`]**: [`Awaitable`](suspense::Awaitable) values and pings.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! reconciler instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-unit
//!   begin, complete, and unwind events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

mod begin;
mod child;
mod commit;
mod complete;
mod context;

pub mod config;
pub mod element;
pub mod error;
pub mod fiber;
pub mod flags;
pub mod hooks;
pub mod host;
pub mod lane;
pub mod reconciler;
pub mod root;
pub mod scheduler;
pub mod suspense;
pub mod trace;
pub mod update_queue;
pub mod work_loop;
