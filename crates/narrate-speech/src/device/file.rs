//! Writes each released chunk to disk in playback order.
//!
//! Useful without a sound card, and as a deterministic output for tests:
//! every chunk is reported started and finished as soon as it is written.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use narrate_core::{AudioChunk, TimeInfo, mime_extension};
use tokio::sync::mpsc;

use super::{DeviceEvent, PlaybackDevice};
use crate::error::PlaybackError;

#[derive(Debug)]
pub struct FileDevice {
    dir: PathBuf,
}

impl FileDevice {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File name used for a chunk: `<session>-<index>.<ext>`.
    #[must_use]
    pub fn file_name(chunk: &AudioChunk) -> String {
        format!(
            "{}-{:04}.{}",
            chunk.session_id,
            chunk.index,
            mime_extension(&chunk.mime_type)
        )
    }
}

impl PlaybackDevice for FileDevice {
    fn play(
        &mut self,
        chunk: &AudioChunk,
    ) -> Result<mpsc::UnboundedReceiver<DeviceEvent>, PlaybackError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::file_name(chunk));
        fs::write(&path, &chunk.payload)?;

        tracing::debug!(
            session_id = %chunk.session_id,
            index = chunk.index,
            bytes = chunk.len(),
            path = %path.display(),
            "Wrote chunk"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(DeviceEvent::Started);
        let _ = tx.send(DeviceEvent::Finished);
        Ok(rx)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn time_info(&self) -> Option<TimeInfo> {
        None
    }

    fn seek(&mut self, _position: Duration) -> Result<(), PlaybackError> {
        Err(PlaybackError::SeekUnsupported(
            "file output has no playhead".to_string(),
        ))
    }
}
