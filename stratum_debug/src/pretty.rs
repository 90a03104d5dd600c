// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Every line
//! starts with the event's sequence number.

use std::io::Write;

use stratum_core::trace::{
    CommitEvent, CommitPhase, PassiveFlushEvent, PingEvent, RenderBeginEvent, RenderEndEvent,
    RenderErrorEvent, ScheduleEvent, ScheduleKind, SuspendEvent, TraceSink, UnitEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    units: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            units: false,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            units: false,
        }
    }

    /// Also prints one line per unit of work. Off by default; renders of
    /// large trees produce many of them.
    #[must_use]
    pub fn with_units(mut self, units: bool) -> Self {
        self.units = units;
        self
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_render_begin(&mut self, e: &RenderBeginEvent) {
        let start = if e.fresh { "fresh" } else { "resume" };
        let _ = writeln!(
            self.writer,
            "#{} [render:begin] root={} lane={:?} {start}",
            e.seq, e.root.0, e.lane,
        );
    }

    fn on_render_end(&mut self, e: &RenderEndEvent) {
        let _ = writeln!(
            self.writer,
            "#{} [render:end] root={} lane={:?} status={:?} units={}",
            e.seq, e.root.0, e.lane, e.status, e.units,
        );
    }

    fn on_suspend(&mut self, e: &SuspendEvent) {
        let target = if e.captured { "boundary" } else { "root" };
        let _ = writeln!(
            self.writer,
            "#{} [suspend] root={} lane={:?} awaitable={} unwind-to={target}",
            e.seq, e.root.0, e.lane, e.awaitable.0,
        );
    }

    fn on_ping(&mut self, e: &PingEvent) {
        let _ = writeln!(
            self.writer,
            "#{} [ping] root={} lane={:?} awaitable={}",
            e.seq, e.root.0, e.lane, e.awaitable.0,
        );
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        match e.phase {
            CommitPhase::Begin => {
                let _ = writeln!(
                    self.writer,
                    "#{} [commit:begin] root={} lane={:?}",
                    e.seq, e.root.0, e.lane,
                );
            }
            CommitPhase::End => {
                let _ = writeln!(
                    self.writer,
                    "#{} [commit:end] root={} lane={:?} placed={} updated={} \
                     deleted={} toggled={}",
                    e.seq,
                    e.root.0,
                    e.lane,
                    e.stats.placements,
                    e.stats.updates,
                    e.stats.deletions,
                    e.stats.visibility,
                );
            }
        }
    }

    fn on_passive_flush(&mut self, e: &PassiveFlushEvent) {
        let _ = writeln!(
            self.writer,
            "#{} [passive] root={} unmounts={} destroys={} creates={}",
            e.seq, e.root.0, e.unmounts, e.destroys, e.creates,
        );
    }

    fn on_schedule(&mut self, e: &ScheduleEvent) {
        let what = match e.kind {
            ScheduleKind::Sync => "sync".to_owned(),
            ScheduleKind::Task(level) => format!("task:{level:?}"),
            ScheduleKind::Passive => "passive".to_owned(),
            ScheduleKind::Cancel => "cancel".to_owned(),
        };
        let _ = writeln!(
            self.writer,
            "#{} [schedule] root={} lane={:?} {what}",
            e.seq, e.root.0, e.lane,
        );
    }

    fn on_render_error(&mut self, e: &RenderErrorEvent) {
        let _ = writeln!(
            self.writer,
            "#{} [error] root={} lane={:?} attempt={}",
            e.seq, e.root.0, e.lane, e.attempt,
        );
    }

    fn on_unit(&mut self, e: &UnitEvent) {
        if !self.units {
            return;
        }
        let _ = writeln!(
            self.writer,
            "#{} [unit] {:?} {:?} fiber={}",
            e.seq, e.step, e.tag, e.fiber_index,
        );
    }
}
