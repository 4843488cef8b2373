//! Chunked speech synthesis with strictly ordered playback.
//!
//! A [`Reader`] turns text into audio one session at a time:
//!
//! ```text
//!   text ─▶ segment ─▶ SessionOrchestrator ─▶ SpeechSynthesizer (one request at a time)
//!                              │
//!                              ▼ (session id, index)
//!                      playback context: OrderedPlaybackQueue ─▶ PlaybackDevice
//!                              │
//!                              ▼
//!                    coordinator: PlayerStateMachine ─▶ ReaderEvent observers
//! ```
//!
//! Starting a new session supersedes the previous one. Work belonging to a
//! superseded session is dropped wherever it is observed and never plays.

pub mod backend;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod queue;
pub mod reader;
pub mod session;
pub mod state;

// Re-export key types for convenience
pub use backend::{HttpSynthesizer, SpeechSynthesizer, SynthesizedAudio};
pub use device::{DeviceEvent, FileDevice, PlaybackDevice};
#[cfg(feature = "rodio")]
pub use device::RodioDevice;
pub use diagnostics::{DiagnosticsSummary, SessionDiagnostics};
pub use error::{PlaybackError, ReaderError, SynthesisError};
pub use orchestrator::IssuancePolicy;
pub use playback::PlaybackStats;
pub use queue::{OrderedPlaybackQueue, Release, ResourceTracker};
pub use reader::{Reader, ReaderConfig, ReaderHandle};
pub use session::{ActiveSession, SessionContext, SessionIds};
pub use state::{EventBus, PlayerStateMachine};

