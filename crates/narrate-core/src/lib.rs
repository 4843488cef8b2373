//! Core domain for narrate.
//!
//! Pure types and algorithms shared by the speech pipeline and the CLI:
//! text segmentation and normalisation, reader settings, player state,
//! and the event union observed by front-ends. Nothing in this crate
//! performs network or audio I/O.

pub mod domain;
pub mod events;
pub mod paths;
pub mod settings;
pub mod text;

// Re-export commonly used types for convenience
pub use domain::{
    AudioChunk, PlayerState, RecordedAudio, Segment, SessionId, TimeInfo, mime_extension,
};
pub use events::ReaderEvent;
pub use paths::{PathError, SettingsStore, StoreError, config_dir, settings_path};
pub use settings::{
    DEFAULT_ENDPOINT_URL, DEFAULT_MODEL, DEFAULT_SPEED, DEFAULT_VOICE, MAX_SPEED, ReaderSettings,
    SegmenterConfig, SettingsError, SettingsUpdate, speed_in_range, validate_segmenter,
    validate_settings,
};
pub use text::{normalize, segment};
