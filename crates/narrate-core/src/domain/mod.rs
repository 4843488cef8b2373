//! Domain value types for a read session.

mod audio;
mod segment;
mod session;
mod state;

pub use audio::{AudioChunk, RecordedAudio, TimeInfo, mime_extension};
pub use segment::Segment;
pub use session::SessionId;
pub use state::PlayerState;
