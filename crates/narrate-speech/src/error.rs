//! Error types for synthesis, playback, and the reader API.

use std::time::Duration;

use narrate_core::{PlayerState, SettingsError};

/// Errors from a single synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// The request or the response was unacceptable (empty text, bad
    /// speed, non-audio content type, ...).
    #[error("Invalid synthesis request: {0}")]
    Validation(String),

    /// Transport failure, non-2xx status, or an empty payload.
    #[error(
        "Speech endpoint request failed{}: {message}",
        .status.map_or_else(String::new, |s| format!(" (HTTP {s})"))
    )]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// The request did not settle within the configured limit.
    #[error("Speech request timed out after {0:?}")]
    Timeout(Duration),

    /// The owning session was superseded or stopped while the request was in flight.
    #[error("Speech request cancelled")]
    Cancelled,
}

impl SynthesisError {
    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status code, when the endpoint answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether a chunked session should skip this segment and carry on.
    #[must_use]
    pub const fn is_segment_local(&self) -> bool {
        !self.is_cancelled()
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Errors from the playback context and output devices.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// Failed to open the audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStream(String),

    /// The payload could not be decoded.
    #[error("Failed to decode {mime_type} audio: {reason}")]
    Decode { mime_type: String, reason: String },

    /// The dedicated audio thread exited unexpectedly.
    #[error("Audio thread died unexpectedly")]
    AudioThreadDied,

    /// Seek was requested with no active playback element.
    #[error("Nothing is playing")]
    NothingPlaying,

    /// The output does not support seeking.
    #[error("Seeking is not supported by this output: {0}")]
    SeekUnsupported(String),

    /// The device reported a failure while playing a chunk.
    #[error("Failed to play audio: {0}")]
    ChunkFailed(String),

    /// The playback context has shut down.
    #[error("Playback context is not running")]
    ContextClosed,

    /// IO error (file output).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by [`ReaderHandle`](crate::ReaderHandle).
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Settings failed validation; nothing was requested.
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    /// Segmentation produced nothing to read.
    #[error("Nothing to read: text is empty after segmentation")]
    NoSegments,

    /// A single-shot (unchunked) read failed.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// The request is not valid in the current player state.
    #[error("Cannot go from {from} to {to}")]
    InvalidTransition { from: PlayerState, to: PlayerState },

    /// The playback context rejected the request.
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// The reader has shut down.
    #[error("Reader is not running")]
    Closed,
}
