//! Player state machine and event fan-out.
//!
//! ```text
//!   Stopped ──▶ Loading ──▶ Ready ──▶ Playing ⇄ Paused
//!      ▲           │          │          │         │
//!      └───────────┴──────────┴──────────┴─────────┘
//! ```
//!
//! Any state may go to `Loading` (a new session supersedes the old one).
//! The coordinator is the only writer; observers read through a `watch`
//! channel or the event broadcast.

use narrate_core::{PlayerState, ReaderEvent};
use tokio::sync::{broadcast, watch};

use crate::error::ReaderError;

/// Best-effort broadcast of [`ReaderEvent`]s.
///
/// Sending never blocks and never fails: with no subscribers the event is
/// dropped, and a lagging subscriber loses the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReaderEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ReaderEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No reader event subscribers");
        }
    }
}

/// Whether `from → to` is a legal transition. Same-state is handled by the caller.
#[must_use]
pub const fn can_transition(from: PlayerState, to: PlayerState) -> bool {
    use PlayerState::{Loading, Paused, Playing, Ready, Stopped};

    matches!(
        (from, to),
        (_, Loading)
            | (Loading | Ready | Playing | Paused, Stopped)
            | (Loading, Ready)
            | (Ready | Paused, Playing)
            | (Playing, Paused)
    )
}

/// Single-writer state holder that broadcasts every change.
#[derive(Debug)]
pub struct PlayerStateMachine {
    state: PlayerState,
    watch: watch::Sender<PlayerState>,
    bus: EventBus,
}

impl PlayerStateMachine {
    pub fn new(bus: EventBus) -> Self {
        let (watch, _) = watch::channel(PlayerState::Stopped);
        Self {
            state: PlayerState::Stopped,
            watch,
            bus,
        }
    }

    #[must_use]
    pub const fn state(&self) -> PlayerState {
        self.state
    }

    pub fn watch(&self) -> watch::Receiver<PlayerState> {
        self.watch.subscribe()
    }

    /// Move to `next`. Returns `Ok(false)` when already there.
    pub fn transition(&mut self, next: PlayerState) -> Result<bool, ReaderError> {
        if self.state == next {
            return Ok(false);
        }
        if !can_transition(self.state, next) {
            return Err(ReaderError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!(old = %self.state, new = %next, "Player state transition");
        self.state = next;
        self.watch.send_replace(next);
        self.bus.emit(ReaderEvent::StateChanged { state: next });
        Ok(true)
    }

    /// Go to `Stopped` from wherever we are.
    pub fn stop(&mut self) {
        // Every non-stopped state may stop.
        let _ = self.transition(PlayerState::Stopped);
    }
}
