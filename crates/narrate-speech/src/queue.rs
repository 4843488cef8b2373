//! Ordered release of audio chunks that arrive out of order.
//!
//! The queue belongs to the playback context. It buffers chunks for the
//! current session keyed by index and releases them strictly in
//! increasing index order, waiting on gaps instead of skipping ahead.
//! An index is only passed over when the orchestrator explicitly marks it
//! skipped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use narrate_core::{AudioChunk, SessionId};

// ── Resource accounting ────────────────────────────────────────────

/// Counts audio buffers currently held by the playback context.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker(Arc<AtomicUsize>);

impl ResourceTracker {
    /// Number of buffers acquired and not yet released.
    #[must_use]
    pub fn live(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn acquire(&self, chunk: AudioChunk) -> ChunkHandle {
        self.0.fetch_add(1, Ordering::SeqCst);
        ChunkHandle {
            chunk,
            tracker: self.clone(),
        }
    }
}

/// An accepted chunk. Dropping the handle releases the buffer, on every
/// path: played to the end, errored, stopped, or superseded.
#[derive(Debug)]
pub struct ChunkHandle {
    chunk: AudioChunk,
    tracker: ResourceTracker,
}

impl ChunkHandle {
    #[must_use]
    pub const fn chunk(&self) -> &AudioChunk {
        &self.chunk
    }
}

impl Drop for ChunkHandle {
    fn drop(&mut self) {
        self.tracker.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Queue ──────────────────────────────────────────────────────────

#[derive(Debug)]
enum Slot {
    Ready(ChunkHandle),
    Skipped,
}

/// What happened to a submitted chunk or skip notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// Tagged with a session that is not the current one.
    Stale,
    /// The index was already buffered, played, or skipped.
    Duplicate,
    /// The index is past the session's segment count.
    OutOfRange,
}

/// Next action for the playback driver.
#[derive(Debug)]
pub enum Release {
    /// Play this chunk, then call [`OrderedPlaybackQueue::complete`].
    Play(ChunkHandle),
    /// This index was skipped; the cursor already moved past it.
    Skipped(usize),
    /// The expected index has not arrived yet (or a chunk is still playing).
    Wait,
    /// Every index was played or skipped. Reported once per session.
    Drained(SessionId),
    /// No session, or the session already drained.
    Idle,
}

/// Buffers chunks for one session and releases them in index order.
#[derive(Debug)]
pub struct OrderedPlaybackQueue {
    session: SessionId,
    total: usize,
    expected: usize,
    slots: BTreeMap<usize, Slot>,
    in_flight: Option<usize>,
    drained: bool,
    tracker: ResourceTracker,
}

impl OrderedPlaybackQueue {
    pub fn new(tracker: ResourceTracker) -> Self {
        Self {
            session: SessionId::NONE,
            total: 0,
            expected: 0,
            slots: BTreeMap::new(),
            in_flight: None,
            drained: false,
            tracker,
        }
    }

    /// Start over for `session` with `total` segments, releasing any
    /// buffers left from the previous session.
    pub fn reset(&mut self, session: SessionId, total: usize) {
        self.slots.clear();
        self.session = session;
        self.total = total;
        self.expected = 0;
        self.in_flight = None;
        self.drained = false;
    }

    /// Drop everything and forget the session.
    pub fn clear(&mut self) {
        self.reset(SessionId::NONE, 0);
    }

    pub fn submit(&mut self, chunk: AudioChunk) -> SubmitOutcome {
        match self.check(chunk.session_id, chunk.index) {
            SubmitOutcome::Accepted => {
                let index = chunk.index;
                self.slots
                    .insert(index, Slot::Ready(self.tracker.acquire(chunk)));
                SubmitOutcome::Accepted
            }
            other => other,
        }
    }

    /// Record that `index` will never arrive.
    pub fn mark_skipped(&mut self, session: SessionId, index: usize) -> SubmitOutcome {
        let outcome = self.check(session, index);
        if outcome == SubmitOutcome::Accepted {
            self.slots.insert(index, Slot::Skipped);
        }
        outcome
    }

    fn check(&self, session: SessionId, index: usize) -> SubmitOutcome {
        if session.is_none() || session != self.session {
            SubmitOutcome::Stale
        } else if index >= self.total {
            SubmitOutcome::OutOfRange
        } else if index < self.expected
            || self.in_flight == Some(index)
            || self.slots.contains_key(&index)
        {
            SubmitOutcome::Duplicate
        } else {
            SubmitOutcome::Accepted
        }
    }

    /// Decide what the driver should do next.
    pub fn next_release(&mut self) -> Release {
        if self.session.is_none() || self.drained {
            return Release::Idle;
        }
        if self.in_flight.is_some() {
            return Release::Wait;
        }
        if self.expected >= self.total {
            self.drained = true;
            return Release::Drained(self.session);
        }

        match self.slots.remove(&self.expected) {
            Some(Slot::Ready(handle)) => {
                self.in_flight = Some(self.expected);
                Release::Play(handle)
            }
            Some(Slot::Skipped) => {
                let index = self.expected;
                self.expected += 1;
                Release::Skipped(index)
            }
            None => Release::Wait,
        }
    }

    /// The released chunk finished (or failed); advance the cursor.
    ///
    /// Returns `false` if `(session, index)` is not the chunk in flight.
    pub fn complete(&mut self, session: SessionId, index: usize) -> bool {
        if session != self.session || self.in_flight != Some(index) {
            return false;
        }
        self.in_flight = None;
        self.expected += 1;
        true
    }

    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// The next index the queue is waiting to release.
    #[must_use]
    pub const fn expected_index(&self) -> usize {
        self.expected
    }

    /// Chunks buffered and not yet released.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }
}
