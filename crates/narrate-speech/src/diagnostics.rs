//! Per-session timing and size bookkeeping.
//!
//! Observability only: nothing here feeds back into control flow.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use narrate_core::SessionId;

/// How a segment's request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    Pending,
    Synthesized,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SegmentTiming {
    pub issued_at: Instant,
    pub completed_at: Option<Instant>,
    pub payload_len: Option<usize>,
    pub outcome: SegmentOutcome,
}

impl SegmentTiming {
    /// Time from issue to settle, once settled.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.completed_at
            .map(|done| done.saturating_duration_since(self.issued_at))
    }
}

/// Timings for every segment issued in one session.
#[derive(Debug, Clone)]
pub struct SessionDiagnostics {
    session_id: SessionId,
    started_at: Instant,
    segments: BTreeMap<usize, SegmentTiming>,
}

impl SessionDiagnostics {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            started_at: Instant::now(),
            segments: BTreeMap::new(),
        }
    }

    pub fn record_issued(&mut self, index: usize) {
        self.segments.insert(
            index,
            SegmentTiming {
                issued_at: Instant::now(),
                completed_at: None,
                payload_len: None,
                outcome: SegmentOutcome::Pending,
            },
        );
    }

    pub fn record_synthesized(&mut self, index: usize, payload_len: usize) {
        self.settle(index, SegmentOutcome::Synthesized, Some(payload_len));
    }

    pub fn record_failed(&mut self, index: usize) {
        self.settle(index, SegmentOutcome::Failed, None);
    }

    pub fn record_cancelled(&mut self, index: usize) {
        self.settle(index, SegmentOutcome::Cancelled, None);
    }

    fn settle(&mut self, index: usize, outcome: SegmentOutcome, payload_len: Option<usize>) {
        if let Some(timing) = self.segments.get_mut(&index) {
            timing.completed_at = Some(Instant::now());
            timing.payload_len = payload_len;
            timing.outcome = outcome;
        }
    }

    #[must_use]
    pub fn summary(&self) -> DiagnosticsSummary {
        let count = |outcome| {
            self.segments
                .values()
                .filter(|t| t.outcome == outcome)
                .count()
        };
        let latencies: Vec<Duration> = self
            .segments
            .values()
            .filter_map(SegmentTiming::latency)
            .collect();

        let mean_latency = u32::try_from(latencies.len())
            .ok()
            .filter(|n| *n > 0)
            .map(|n| latencies.iter().sum::<Duration>() / n);

        DiagnosticsSummary {
            session_id: self.session_id,
            issued: self.segments.len(),
            synthesized: count(SegmentOutcome::Synthesized),
            failed: count(SegmentOutcome::Failed),
            total_bytes: self.segments.values().filter_map(|t| t.payload_len).sum(),
            mean_latency,
            max_latency: latencies.iter().max().copied(),
            elapsed: self.started_at.elapsed(),
        }
    }
}

/// Aggregate view of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsSummary {
    pub session_id: SessionId,
    pub issued: usize,
    pub synthesized: usize,
    pub failed: usize,
    pub total_bytes: usize,
    pub mean_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
    pub elapsed: Duration,
}

impl DiagnosticsSummary {
    pub fn log(&self) {
        tracing::info!(
            session_id = %self.session_id,
            issued = self.issued,
            synthesized = self.synthesized,
            failed = self.failed,
            total_bytes = self.total_bytes,
            mean_latency_ms = self.mean_latency.map(|d| d.as_millis()),
            max_latency_ms = self.max_latency.map(|d| d.as_millis()),
            elapsed_ms = self.elapsed.as_millis(),
            "Session issuance finished"
        );
    }
}
