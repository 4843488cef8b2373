//! Audio output devices.
//!
//! A device plays one chunk at a time and reports progress through the
//! event receiver returned by [`PlaybackDevice::play`]. Starting a new
//! chunk or calling [`stop`](PlaybackDevice::stop) abandons the previous
//! receiver; the playback context drops it so late events cannot leak
//! into the next chunk.

mod file;
#[cfg(feature = "rodio")]
mod speaker;

use std::time::Duration;

use narrate_core::{AudioChunk, TimeInfo};
use tokio::sync::mpsc;

use crate::error::PlaybackError;

pub use file::FileDevice;
#[cfg(feature = "rodio")]
pub use speaker::RodioDevice;

/// Progress of the chunk handed to [`PlaybackDevice::play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Audio output actually began.
    Started,
    /// The chunk played to its end.
    Finished,
    /// The chunk could not be played to its end.
    Errored(String),
}

/// An output the playback context can drive.
///
/// Calls are made from the playback context's task and must return
/// promptly; long-running work belongs on the device's own thread.
pub trait PlaybackDevice: Send + 'static {
    /// Begin playing `chunk`, replacing anything currently playing.
    fn play(
        &mut self,
        chunk: &AudioChunk,
    ) -> Result<mpsc::UnboundedReceiver<DeviceEvent>, PlaybackError>;

    fn pause(&mut self) -> Result<(), PlaybackError>;

    fn resume(&mut self) -> Result<(), PlaybackError>;

    /// Stop and release the current chunk. No further events are sent for it.
    fn stop(&mut self);

    /// Position of the current chunk, if anything is loaded.
    fn time_info(&self) -> Option<TimeInfo>;

    /// Seek within the current chunk.
    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError>;
}

impl<D: PlaybackDevice + ?Sized> PlaybackDevice for Box<D> {
    fn play(
        &mut self,
        chunk: &AudioChunk,
    ) -> Result<mpsc::UnboundedReceiver<DeviceEvent>, PlaybackError> {
        (**self).play(chunk)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        (**self).pause()
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        (**self).resume()
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn time_info(&self) -> Option<TimeInfo> {
        (**self).time_info()
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        (**self).seek(position)
    }
}
