//! Events broadcast by a reader to its observers.
//!
//! # Wire Format
//!
//! Events serialize with a `type` tag so a UI can dispatch on it:
//!
//! ```json
//! { "type": "state_changed", "state": "playing" }
//! { "type": "time_update", "currentTime": 1.5, "duration": 4.0 }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{PlayerState, RecordedAudio, SessionId};

/// Notifications observed by front-ends.
///
/// Delivery is best-effort: observers may be slow or gone, and the reader
/// never blocks or fails because of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReaderEvent {
    /// The player state changed.
    StateChanged { state: PlayerState },

    /// A session failed as a whole (bad settings, nothing to read, ...).
    Error { message: String },

    /// Periodic progress of the active playback element.
    TimeUpdate {
        #[serde(rename = "currentTime")]
        current_time: f64,
        duration: Option<f64>,
    },

    /// A segment started audible playback.
    SegmentStarted {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        index: usize,
        total: usize,
    },

    /// The first successfully synthesised payload, when recording is enabled.
    RecordingAvailable {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        index: usize,
        recording: RecordedAudio,
    },

    /// Every segment of the session was played or skipped.
    StreamComplete {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
}

impl ReaderEvent {
    /// Short name of the event type, matching the serialized tag.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Error { .. } => "error",
            Self::TimeUpdate { .. } => "time_update",
            Self::SegmentStarted { .. } => "segment_started",
            Self::RecordingAvailable { .. } => "recording_available",
            Self::StreamComplete { .. } => "stream_complete",
        }
    }
}
