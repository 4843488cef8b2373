use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally observed state of the reader.
///
/// ```text
///   Stopped → Loading → Ready → Playing ⇄ Paused
///      ▲         │        │        │         │
///      └─────────┴────────┴────────┴─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// Nothing is playing. Initial and terminal state.
    #[default]
    Stopped,

    /// A session has started and audio is being requested.
    Loading,

    /// The first chunk has been handed to the output device.
    Ready,

    /// Audio output is audible.
    Playing,

    /// Playback is held by an explicit pause request.
    Paused,
}

impl PlayerState {
    /// Whether a session is in progress (anything but `Stopped`).
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Stopped)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
