// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! The reconciler has no clock, so event sequence numbers stand in for
//! timestamps: one sequence step is drawn as one microsecond. Each root gets
//! its own process row.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use stratum_core::trace::{CommitPhase, ScheduleKind};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::RenderBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": "Render",
                    "cat": "Render",
                    "ts": e.seq,
                    "pid": e.root.0,
                    "tid": 0,
                    "args": {
                        "lane": format!("{:?}", e.lane),
                        "fresh": e.fresh,
                    }
                }));
            }
            RecordedEvent::RenderEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": "Render",
                    "cat": "Render",
                    "ts": e.seq,
                    "pid": e.root.0,
                    "tid": 0,
                    "args": {
                        "status": format!("{:?}", e.status),
                        "units": e.units,
                    }
                }));
            }
            RecordedEvent::Suspend(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Suspend",
                    "cat": "Render",
                    "ts": e.seq,
                    "pid": e.root.0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "lane": format!("{:?}", e.lane),
                        "awaitable": e.awaitable.0,
                        "captured": e.captured,
                    }
                }));
            }
            RecordedEvent::Ping(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Ping",
                    "cat": "Scheduler",
                    "ts": e.seq,
                    "pid": e.root.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "lane": format!("{:?}", e.lane),
                        "awaitable": e.awaitable.0,
                    }
                }));
            }
            RecordedEvent::Commit(e) => {
                let ph = match e.phase {
                    CommitPhase::Begin => "B",
                    CommitPhase::End => "E",
                };
                events.push(json!({
                    "ph": ph,
                    "name": "Commit",
                    "cat": "Commit",
                    "ts": e.seq,
                    "pid": e.root.0,
                    "tid": 0,
                    "args": {
                        "lane": format!("{:?}", e.lane),
                        "placements": e.stats.placements,
                        "updates": e.stats.updates,
                        "deletions": e.stats.deletions,
                        "visibility": e.stats.visibility,
                    }
                }));
            }
            RecordedEvent::PassiveFlush(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "PassiveFlush",
                    "cat": "Commit",
                    "ts": e.seq,
                    "pid": e.root.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "unmounts": e.unmounts,
                        "destroys": e.destroys,
                        "creates": e.creates,
                    }
                }));
            }
            RecordedEvent::Schedule(e) => {
                let kind = match e.kind {
                    ScheduleKind::Task(level) => format!("Task({level:?})"),
                    other => format!("{other:?}"),
                };
                events.push(json!({
                    "ph": "i",
                    "name": "Schedule",
                    "cat": "Scheduler",
                    "ts": e.seq,
                    "pid": e.root.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "lane": format!("{:?}", e.lane),
                        "kind": kind,
                    }
                }));
            }
            RecordedEvent::RenderError(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RenderError",
                    "cat": "Render",
                    "ts": e.seq,
                    "pid": e.root.0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "lane": format!("{:?}", e.lane),
                        "attempt": e.attempt,
                    }
                }));
            }
            RecordedEvent::Unit(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.step),
                    "cat": "Rich",
                    "ts": e.seq,
                    "pid": 0,
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "fiber": e.fiber_index,
                        "tag": format!("{:?}", e.tag),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}
