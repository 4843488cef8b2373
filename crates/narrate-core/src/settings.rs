//! Reader settings and segmentation bounds.
//!
//! These are pure domain types: persistence lives in [`crate::paths`], and
//! the pipeline re-validates whatever it is given before doing any work.

use serde::{Deserialize, Serialize};
use url::Url;

/// Default OpenAI-compatible speech endpoint (a local Kokoro server).
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:8000/v1/audio/speech";

/// Default voice identifier.
pub const DEFAULT_VOICE: &str = "af_bella";

/// Default model name sent with every request.
pub const DEFAULT_MODEL: &str = "tts-1";

/// Default playback speed multiplier.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Upper bound (inclusive) accepted for the speed multiplier.
pub const MAX_SPEED: f32 = 4.0;

/// Settings for one read, supplied by the settings provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// URL the synthesis request is posted to.
    pub endpoint_url: String,

    /// Voice identifier understood by the endpoint.
    pub voice: String,

    /// Speed multiplier, in `(0, 4]`.
    pub speed: f32,

    /// Model name sent in the request body.
    pub model: String,

    /// Publish the first synthesised payload as a recording.
    pub record_output: bool,

    /// Split long text into segments. When off the text is synthesised
    /// and played in one request.
    pub chunking_enabled: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            speed: DEFAULT_SPEED,
            model: DEFAULT_MODEL.to_string(),
            record_output: false,
            chunking_enabled: true,
        }
    }
}

impl ReaderSettings {
    /// Apply a partial update, only touching fields that are `Some`.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(ref url) = other.endpoint_url {
            self.endpoint_url.clone_from(url);
        }
        if let Some(ref voice) = other.voice {
            self.voice.clone_from(voice);
        }
        if let Some(speed) = other.speed {
            self.speed = speed;
        }
        if let Some(ref model) = other.model {
            self.model.clone_from(model);
        }
        if let Some(record) = other.record_output {
            self.record_output = record;
        }
        if let Some(chunking) = other.chunking_enabled {
            self.chunking_enabled = chunking;
        }
    }
}

/// Partial settings update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    pub endpoint_url: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub model: Option<String>,
    pub record_output: Option<bool>,
    pub chunking_enabled: Option<bool>,
}

impl SettingsUpdate {
    /// Whether the update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.endpoint_url.is_none()
            && self.voice.is_none()
            && self.speed.is_none()
            && self.model.is_none()
            && self.record_output.is_none()
            && self.chunking_enabled.is_none()
    }
}

/// Size bounds for the segmenter, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Segments longer than this are split (a single long sentence excepted).
    pub max_size: usize,
    /// Lower bound reported by segmentation diagnostics. Merging is bounded
    /// by `max_size` alone; this never forces a segment past it.
    pub min_size: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_size: 400,
            min_size: 100,
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Voice must not be empty")]
    EmptyVoice,

    #[error("Speed must be a finite number in (0, 4], got {0}")]
    InvalidSpeed(f32),

    #[error("Invalid endpoint URL '{0}'")]
    InvalidEndpoint(String),

    #[error("Model must not be empty")]
    EmptyModel,

    #[error("Segment bounds must satisfy 0 < min ({min}) <= max ({max})")]
    InvalidSegmentBounds { min: usize, max: usize },
}

/// Check that a speed multiplier lies in `(0, MAX_SPEED]`.
#[must_use]
pub fn speed_in_range(speed: f32) -> bool {
    speed.is_finite() && speed > 0.0 && speed <= MAX_SPEED
}

/// Validate reader settings.
pub fn validate_settings(settings: &ReaderSettings) -> Result<(), SettingsError> {
    if settings.voice.trim().is_empty() {
        return Err(SettingsError::EmptyVoice);
    }

    if !speed_in_range(settings.speed) {
        return Err(SettingsError::InvalidSpeed(settings.speed));
    }

    if settings.model.trim().is_empty() {
        return Err(SettingsError::EmptyModel);
    }

    match Url::parse(settings.endpoint_url.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
        _ => return Err(SettingsError::InvalidEndpoint(settings.endpoint_url.clone())),
    }

    Ok(())
}

/// Validate segmenter bounds.
pub const fn validate_segmenter(config: &SegmenterConfig) -> Result<(), SettingsError> {
    if config.min_size == 0 || config.min_size > config.max_size {
        return Err(SettingsError::InvalidSegmentBounds {
            min: config.min_size,
            max: config.max_size,
        });
    }
    Ok(())
}
