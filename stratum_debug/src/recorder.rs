// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use stratum_core::fiber::WorkTag;
use stratum_core::lane::Lanes;
use stratum_core::root::RootId;
use stratum_core::scheduler::PriorityLevel;
use stratum_core::suspense::AwaitableId;
use stratum_core::trace::{
    CommitEvent, CommitPhase, CommitStats, PassiveFlushEvent, PingEvent, RenderBeginEvent,
    RenderEndEvent, RenderErrorEvent, ScheduleEvent, ScheduleKind, SuspendEvent, TraceSink,
    UnitEvent, UnitStep,
};
use stratum_core::work_loop::RenderStatus;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_RENDER_BEGIN: u8 = 1;
const TAG_RENDER_END: u8 = 2;
const TAG_SUSPEND: u8 = 3;
const TAG_PING: u8 = 4;
const TAG_COMMIT: u8 = 5;
const TAG_PASSIVE_FLUSH: u8 = 6;
const TAG_SCHEDULE: u8 = 7;
const TAG_RENDER_ERROR: u8 = 8;
const TAG_UNIT: u8 = 9;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    /// Writes the header shared by every root-scoped event.
    fn write_head(&mut self, tag: u8, seq: u64, root: RootId, lane: Lanes) {
        self.write_u8(tag);
        self.write_u64(seq);
        self.write_u32(root.0);
        self.write_u32(lane.bits());
    }

    fn write_status(&mut self, s: RenderStatus) {
        self.write_u8(match s {
            RenderStatus::InProgress => 0,
            RenderStatus::Interrupted => 1,
            RenderStatus::Completed => 2,
            RenderStatus::Aborted => 3,
            RenderStatus::Failed => 4,
        });
    }

    fn write_priority(&mut self, p: PriorityLevel) {
        self.write_u8(p as u8);
    }

    fn write_tag(&mut self, t: WorkTag) {
        self.write_u8(match t {
            WorkTag::Root => 0,
            WorkTag::HostElement => 1,
            WorkTag::HostText => 2,
            WorkTag::Function => 3,
            WorkTag::Fragment => 4,
            WorkTag::Provider => 5,
            WorkTag::Suspense => 6,
            WorkTag::Offscreen => 7,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_render_begin(&mut self, e: &RenderBeginEvent) {
        self.write_head(TAG_RENDER_BEGIN, e.seq, e.root, e.lane);
        self.write_bool(e.fresh);
    }

    fn on_render_end(&mut self, e: &RenderEndEvent) {
        self.write_head(TAG_RENDER_END, e.seq, e.root, e.lane);
        self.write_status(e.status);
        self.write_u32(e.units);
    }

    fn on_suspend(&mut self, e: &SuspendEvent) {
        self.write_head(TAG_SUSPEND, e.seq, e.root, e.lane);
        self.write_u64(e.awaitable.0);
        self.write_bool(e.captured);
    }

    fn on_ping(&mut self, e: &PingEvent) {
        self.write_head(TAG_PING, e.seq, e.root, e.lane);
        self.write_u64(e.awaitable.0);
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.write_head(TAG_COMMIT, e.seq, e.root, e.lane);
        self.write_bool(e.phase == CommitPhase::End);
        self.write_u32(e.stats.placements);
        self.write_u32(e.stats.updates);
        self.write_u32(e.stats.deletions);
        self.write_u32(e.stats.visibility);
    }

    fn on_passive_flush(&mut self, e: &PassiveFlushEvent) {
        self.write_head(TAG_PASSIVE_FLUSH, e.seq, e.root, Lanes::NONE);
        self.write_u32(e.unmounts);
        self.write_u32(e.destroys);
        self.write_u32(e.creates);
    }

    fn on_schedule(&mut self, e: &ScheduleEvent) {
        self.write_head(TAG_SCHEDULE, e.seq, e.root, e.lane);
        match e.kind {
            ScheduleKind::Sync => self.write_u8(0),
            ScheduleKind::Task(level) => {
                self.write_u8(1);
                self.write_priority(level);
            }
            ScheduleKind::Passive => self.write_u8(2),
            ScheduleKind::Cancel => self.write_u8(3),
        }
    }

    fn on_render_error(&mut self, e: &RenderErrorEvent) {
        self.write_head(TAG_RENDER_ERROR, e.seq, e.root, e.lane);
        self.write_u32(e.attempt);
    }

    fn on_unit(&mut self, e: &UnitEvent) {
        self.write_u8(TAG_UNIT);
        self.write_u64(e.seq);
        self.write_u32(e.fiber_index);
        self.write_tag(e.tag);
        self.write_u8(match e.step {
            UnitStep::Begin => 0,
            UnitStep::Complete => 1,
            UnitStep::Unwind => 2,
        });
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`RenderBeginEvent`].
    RenderBegin(RenderBeginEvent),
    /// A [`RenderEndEvent`].
    RenderEnd(RenderEndEvent),
    /// A [`SuspendEvent`].
    Suspend(SuspendEvent),
    /// A [`PingEvent`].
    Ping(PingEvent),
    /// A [`CommitEvent`].
    Commit(CommitEvent),
    /// A [`PassiveFlushEvent`].
    PassiveFlush(PassiveFlushEvent),
    /// A [`ScheduleEvent`].
    Schedule(ScheduleEvent),
    /// A [`RenderErrorEvent`].
    RenderError(RenderErrorEvent),
    /// A [`UnitEvent`].
    Unit(UnitEvent),
}

impl RecordedEvent {
    /// The event's sequence number.
    #[must_use]
    pub fn seq(&self) -> u64 {
        match self {
            Self::RenderBegin(e) => e.seq,
            Self::RenderEnd(e) => e.seq,
            Self::Suspend(e) => e.seq,
            Self::Ping(e) => e.seq,
            Self::Commit(e) => e.seq,
            Self::PassiveFlush(e) => e.seq,
            Self::Schedule(e) => e.seq,
            Self::RenderError(e) => e.seq,
            Self::Unit(e) => e.seq,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

/// The header shared by every root-scoped record.
struct Head {
    seq: u64,
    root: RootId,
    lane: Lanes,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_head(&mut self) -> Option<Head> {
        Some(Head {
            seq: self.read_u64()?,
            root: RootId(self.read_u32()?),
            lane: Lanes::from_bits(self.read_u32()?),
        })
    }

    fn read_status(&mut self) -> Option<RenderStatus> {
        Some(match self.read_u8()? {
            0 => RenderStatus::InProgress,
            1 => RenderStatus::Interrupted,
            2 => RenderStatus::Completed,
            3 => RenderStatus::Aborted,
            _ => RenderStatus::Failed,
        })
    }

    fn read_priority(&mut self) -> Option<PriorityLevel> {
        Some(match self.read_u8()? {
            1 => PriorityLevel::Immediate,
            2 => PriorityLevel::UserBlocking,
            3 => PriorityLevel::Normal,
            4 => PriorityLevel::Low,
            _ => PriorityLevel::Idle,
        })
    }

    fn read_tag(&mut self) -> Option<WorkTag> {
        Some(match self.read_u8()? {
            0 => WorkTag::Root,
            1 => WorkTag::HostElement,
            2 => WorkTag::HostText,
            3 => WorkTag::Function,
            4 => WorkTag::Fragment,
            5 => WorkTag::Provider,
            6 => WorkTag::Suspense,
            _ => WorkTag::Offscreen,
        })
    }

    fn decode_render_begin(&mut self) -> Option<RecordedEvent> {
        let h = self.read_head()?;
        Some(RecordedEvent::RenderBegin(RenderBeginEvent {
            seq: h.seq,
            root: h.root,
            lane: h.lane,
            fresh: self.read_bool()?,
        }))
    }

    fn decode_render_end(&mut self) -> Option<RecordedEvent> {
        let h = self.read_head()?;
        Some(RecordedEvent::RenderEnd(RenderEndEvent {
            seq: h.seq,
            root: h.root,
            lane: h.lane,
            status: self.read_status()?,
            units: self.read_u32()?,
        }))
    }

    fn decode_suspend(&mut self) -> Option<RecordedEvent> {
        let h = self.read_head()?;
        Some(RecordedEvent::Suspend(SuspendEvent {
            seq: h.seq,
            root: h.root,
            lane: h.lane,
            awaitable: AwaitableId(self.read_u64()?),
            captured: self.read_bool()?,
        }))
    }

    fn decode_ping(&mut self) -> Option<RecordedEvent> {
        let h = self.read_head()?;
        Some(RecordedEvent::Ping(PingEvent {
            seq: h.seq,
            root: h.root,
            lane: h.lane,
            awaitable: AwaitableId(self.read_u64()?),
        }))
    }

    fn decode_commit(&mut self) -> Option<RecordedEvent> {
        let h = self.read_head()?;
        let phase = if self.read_bool()? {
            CommitPhase::End
        } else {
            CommitPhase::Begin
        };
        Some(RecordedEvent::Commit(CommitEvent {
            seq: h.seq,
            root: h.root,
            lane: h.lane,
            phase,
            stats: CommitStats {
                placements: self.read_u32()?,
                updates: self.read_u32()?,
                deletions: self.read_u32()?,
                visibility: self.read_u32()?,
            },
        }))
    }

    fn decode_passive_flush(&mut self) -> Option<RecordedEvent> {
        let h = self.read_head()?;
        Some(RecordedEvent::PassiveFlush(PassiveFlushEvent {
            seq: h.seq,
            root: h.root,
            unmounts: self.read_u32()?,
            destroys: self.read_u32()?,
            creates: self.read_u32()?,
        }))
    }

    fn decode_schedule(&mut self) -> Option<RecordedEvent> {
        let h = self.read_head()?;
        let kind = match self.read_u8()? {
            0 => ScheduleKind::Sync,
            1 => ScheduleKind::Task(self.read_priority()?),
            2 => ScheduleKind::Passive,
            _ => ScheduleKind::Cancel,
        };
        Some(RecordedEvent::Schedule(ScheduleEvent {
            seq: h.seq,
            root: h.root,
            lane: h.lane,
            kind,
        }))
    }

    fn decode_render_error(&mut self) -> Option<RecordedEvent> {
        let h = self.read_head()?;
        Some(RecordedEvent::RenderError(RenderErrorEvent {
            seq: h.seq,
            root: h.root,
            lane: h.lane,
            attempt: self.read_u32()?,
        }))
    }

    fn decode_unit(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Unit(UnitEvent {
            seq: self.read_u64()?,
            fiber_index: self.read_u32()?,
            tag: self.read_tag()?,
            step: match self.read_u8()? {
                0 => UnitStep::Begin,
                1 => UnitStep::Complete,
                _ => UnitStep::Unwind,
            },
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_RENDER_BEGIN => self.decode_render_begin(),
            TAG_RENDER_END => self.decode_render_end(),
            TAG_SUSPEND => self.decode_suspend(),
            TAG_PING => self.decode_ping(),
            TAG_COMMIT => self.decode_commit(),
            TAG_PASSIVE_FLUSH => self.decode_passive_flush(),
            TAG_SCHEDULE => self.decode_schedule(),
            TAG_RENDER_ERROR => self.decode_render_error(),
            TAG_UNIT => self.decode_unit(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use stratum_core::element::{Element, Node};
    use stratum_core::reconciler::Reconciler;
    use stratum_noop::{ManualScheduler, NoopHost};

    use super::*;

    #[test]
    fn commit_keeps_stats_and_phase() {
        let mut rec = RecorderSink::new();
        rec.on_commit(&CommitEvent {
            seq: 9,
            root: RootId(2),
            lane: Lanes::TRANSITION,
            phase: CommitPhase::End,
            stats: CommitStats {
                placements: 3,
                updates: 1,
                deletions: 0,
                visibility: 2,
            },
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::Commit(e) => {
                assert_eq!(e.seq, 9);
                assert_eq!(e.root, RootId(2));
                assert_eq!(e.lane, Lanes::TRANSITION);
                assert_eq!(e.phase, CommitPhase::End);
                assert_eq!(e.stats.total(), 6);
            }
            other => panic!("expected Commit, got {other:?}"),
        }
    }

    #[test]
    fn schedule_keeps_task_priority() {
        let mut rec = RecorderSink::new();
        for kind in [
            ScheduleKind::Task(PriorityLevel::UserBlocking),
            ScheduleKind::Cancel,
        ] {
            rec.on_schedule(&ScheduleEvent {
                seq: 0,
                root: RootId(0),
                lane: Lanes::INPUT_CONTINUOUS,
                kind,
            });
        }

        let kinds: Vec<_> = decode(rec.as_bytes())
            .map(|e| match e {
                RecordedEvent::Schedule(s) => s.kind,
                other => panic!("expected Schedule, got {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            [
                ScheduleKind::Task(PriorityLevel::UserBlocking),
                ScheduleKind::Cancel
            ]
        );
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_ping(&PingEvent {
            seq: 1,
            root: RootId(0),
            lane: Lanes::DEFAULT,
            awaitable: AwaitableId(7),
        });
        let bytes = rec.into_bytes();
        assert_eq!(decode(&bytes).count(), 1);
        assert_eq!(decode(&bytes[..bytes.len() - 1]).count(), 0);
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn records_a_live_mount_in_order() {
        let rec = Rc::new(RefCell::new(RecorderSink::new()));
        let mut r = Reconciler::new(NoopHost::new(), ManualScheduler::new());
        r.set_trace_sink(Box::new(rec.clone()));
        let root = r.create_root_container(NoopHost::CONTAINER);
        r.update_container(root, Element::host("p").with_children(Node::text("x")).into())
            .ok();
        stratum_noop::flush_all(&mut r).ok();

        let rec = rec.borrow();
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        let seqs: Vec<u64> = events.iter().map(RecordedEvent::seq).collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]), "seq is monotonic: {seqs:?}");

        let kinds: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::Schedule(_) => Some("schedule"),
                RecordedEvent::RenderBegin(_) => Some("render"),
                RecordedEvent::Commit(c) if c.phase == CommitPhase::End => Some("commit"),
                _ => None,
            })
            .collect();
        assert_eq!(kinds[..3], ["schedule", "render", "commit"]);
        assert!(
            events.iter().any(|e| matches!(e, RecordedEvent::Unit(u) if u.tag == WorkTag::HostText)),
            "rich unit events are recorded"
        );
    }
}
