//! Speech synthesis backends.
//!
//! A [`SpeechSynthesizer`] turns one segment of text into one opaque audio
//! payload. Implementations must honour the cancellation token and must
//! not touch session or queue state: they are a pure request/response
//! boundary.

mod http;

use async_trait::async_trait;
use bytes::Bytes;
use narrate_core::{ReaderSettings, speed_in_range};
use tokio_util::sync::CancellationToken;

use crate::error::SynthesisError;

pub use http::{ACCEPT_AUDIO, DEFAULT_MIME_TYPE, HttpSynthesizer};

/// Audio returned for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub payload: Bytes,
    pub mime_type: String,
}

/// Trait for speech synthesis backends.
///
/// Must be object-safe for use as `Arc<dyn SpeechSynthesizer>`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesise `text` with the given voice settings.
    ///
    /// Fails with [`SynthesisError::Cancelled`] if `cancel` fires first.
    async fn synthesize(
        &self,
        text: &str,
        settings: &ReaderSettings,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAudio, SynthesisError>;
}

/// Check request preconditions before any I/O.
pub fn validate_request(text: &str, settings: &ReaderSettings) -> Result<(), SynthesisError> {
    if text.trim().is_empty() {
        return Err(SynthesisError::Validation("text is empty".to_string()));
    }
    if settings.voice.trim().is_empty() {
        return Err(SynthesisError::Validation("voice is empty".to_string()));
    }
    if !speed_in_range(settings.speed) {
        return Err(SynthesisError::Validation(format!(
            "speed must be in (0, 4], got {}",
            settings.speed
        )));
    }
    Ok(())
}
