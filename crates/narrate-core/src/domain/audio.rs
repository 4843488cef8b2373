use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::SessionId;

/// Synthesised audio for one segment, tagged with the session that asked for it.
///
/// The payload is opaque: whatever the endpoint returned, described only by
/// its MIME type. Cloning is cheap (`Bytes` is reference counted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub session_id: SessionId,
    pub index: usize,
    pub payload: Bytes,
    pub mime_type: String,
}

impl AudioChunk {
    pub fn new(
        session_id: SessionId,
        index: usize,
        payload: impl Into<Bytes>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            index,
            payload: payload.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Copy of a synthesised payload handed to observers when recording is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAudio {
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Position of the active playback element, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    pub current_time: f64,
    /// Unknown for streamed formats that carry no length header.
    pub duration: Option<f64>,
}

/// File extension conventionally used for an audio MIME type.
///
/// Parameters (`; codecs=...`) are ignored. Unknown types map to `bin`.
#[must_use]
pub fn mime_extension(mime_type: &str) -> &'static str {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => "wav",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/aac" => "aac",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/webm" => "webm",
        "audio/pcm" | "audio/l16" => "pcm",
        _ => "bin",
    }
}
