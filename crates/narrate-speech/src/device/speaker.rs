//! Speaker output via `rodio`, confined to a dedicated audio thread.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so the stream lives
//! on one OS thread for its whole life and [`RodioDevice`] proxies every
//! call through an [`AudioCommand`] channel. Replies come back on one-shot
//! `std` channels. Position reads skip the channel: the audio thread
//! publishes the current sink in [`NowPlaying`] and the handle reads it
//! directly.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use narrate_core::{AudioChunk, TimeInfo};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::mpsc as async_mpsc;

use super::{DeviceEvent, PlaybackDevice};
use crate::error::PlaybackError;

// ── Commands ───────────────────────────────────────────────────────

enum AudioCommand {
    /// Decode and start a payload on a fresh sink.
    Play {
        payload: Bytes,
        mime_type: String,
        events: async_mpsc::UnboundedSender<DeviceEvent>,
        reply: mpsc::Sender<Result<(), PlaybackError>>,
    },

    Pause,

    Resume,

    /// Stop the current sink (fire-and-forget).
    Stop,

    Seek {
        position: Duration,
        reply: mpsc::Sender<Result<(), PlaybackError>>,
    },

    /// Shut down the audio thread, releasing the output stream.
    Shutdown,
}

// ── Handle (Send proxy) ────────────────────────────────────────────

/// Plays chunks on the default output device.
pub struct RodioDevice {
    cmd_tx: mpsc::Sender<AudioCommand>,
    now_playing: NowPlaying,
    thread: Option<thread::JoinHandle<()>>,
}

impl RodioDevice {
    /// Spawn the audio thread and open the default output device.
    ///
    /// Errors opening the device are propagated back through a one-shot
    /// init channel.
    pub fn spawn() -> Result<Self, PlaybackError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), PlaybackError>>();
        let now_playing = NowPlaying::default();

        let published = now_playing.clone();
        let thread = thread::Builder::new()
            .name("narrate-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx, published))
            .map_err(|e| PlaybackError::OutputStream(format!("failed to spawn audio thread: {e}")))?;

        init_rx.recv().map_err(|_| PlaybackError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            now_playing,
            thread: Some(thread),
        })
    }

    fn send(&self, cmd: AudioCommand) -> Result<(), PlaybackError> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| PlaybackError::AudioThreadDied)
    }

    fn send_and_recv<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<T, PlaybackError>>) -> AudioCommand,
    ) -> Result<T, PlaybackError> {
        let (tx, rx) = mpsc::channel();
        self.send(build(tx))?;
        rx.recv().map_err(|_| PlaybackError::AudioThreadDied)?
    }

    // ── Audio thread event loop ────────────────────────────────────

    fn run(
        cmd_rx: &mpsc::Receiver<AudioCommand>,
        init_tx: &mpsc::Sender<Result<(), PlaybackError>>,
        now_playing: NowPlaying,
    ) {
        let (stream, handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(PlaybackError::OutputStream(e.to_string())));
                return;
            }
        };

        if init_tx.send(Ok(())).is_err() {
            return;
        }

        tracing::info!("Audio output initialised on default device");
        let mut output = Output {
            _stream: stream,
            handle,
            current: None,
            now_playing,
        };

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::Play {
                    payload,
                    mime_type,
                    events,
                    reply,
                } => {
                    let _ = reply.send(output.play(payload, &mime_type, events));
                }
                AudioCommand::Pause => output.pause(),
                AudioCommand::Resume => output.resume(),
                AudioCommand::Stop => output.stop(),
                AudioCommand::Seek { position, reply } => {
                    let _ = reply.send(output.seek(position));
                }
                AudioCommand::Shutdown => break,
            }
        }

        output.stop();
        tracing::debug!("Audio thread shutting down");
    }
}

impl PlaybackDevice for RodioDevice {
    fn play(
        &mut self,
        chunk: &AudioChunk,
    ) -> Result<async_mpsc::UnboundedReceiver<DeviceEvent>, PlaybackError> {
        let (events, rx) = async_mpsc::unbounded_channel();
        self.send_and_recv(|reply| AudioCommand::Play {
            payload: chunk.payload.clone(),
            mime_type: chunk.mime_type.clone(),
            events,
            reply,
        })?;
        Ok(rx)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.send(AudioCommand::Pause)
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        self.send(AudioCommand::Resume)
    }

    fn stop(&mut self) {
        let _ = self.send(AudioCommand::Stop);
    }

    fn time_info(&self) -> Option<TimeInfo> {
        self.now_playing.time_info()
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        self.send_and_recv(|reply| AudioCommand::Seek { position, reply })
    }
}

impl Drop for RodioDevice {
    fn drop(&mut self) {
        // The thread may already be dead.
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

// ── Shared position ────────────────────────────────────────────────

struct Published {
    sink: Arc<Sink>,
    duration: Option<Duration>,
}

/// The sink currently playing, if any. Written by the audio thread on
/// play and stop; read by the handle for position updates.
#[derive(Clone, Default)]
struct NowPlaying(Arc<Mutex<Option<Published>>>);

impl NowPlaying {
    fn set(&self, published: Option<Published>) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = published;
        }
    }

    fn time_info(&self) -> Option<TimeInfo> {
        let slot = self.0.lock().ok()?;
        slot.as_ref().map(|p| TimeInfo {
            current_time: p.sink.get_pos().as_secs_f64(),
            duration: p.duration.map(|d| d.as_secs_f64()),
        })
    }
}

// ── Thread-local output state ──────────────────────────────────────

struct Playing {
    sink: Arc<Sink>,
    /// Set when stopped explicitly so the watcher stays quiet.
    stopped: Arc<AtomicBool>,
}

struct Output {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    current: Option<Playing>,
    now_playing: NowPlaying,
}

impl Output {
    fn play(
        &mut self,
        payload: Bytes,
        mime_type: &str,
        events: async_mpsc::UnboundedSender<DeviceEvent>,
    ) -> Result<(), PlaybackError> {
        self.stop();

        let decoder = Decoder::new(Cursor::new(payload)).map_err(|e| PlaybackError::Decode {
            mime_type: mime_type.to_string(),
            reason: e.to_string(),
        })?;
        let duration = decoder.total_duration();

        let sink = Sink::try_new(&self.handle)
            .map_err(|e| PlaybackError::OutputStream(e.to_string()))?;
        sink.append(decoder);

        let sink = Arc::new(sink);
        let stopped = Arc::new(AtomicBool::new(false));
        let _ = events.send(DeviceEvent::Started);
        spawn_completion_watcher(Arc::clone(&sink), Arc::clone(&stopped), events);

        tracing::debug!(mime_type, ?duration, "Playback started");
        self.now_playing.set(Some(Published {
            sink: Arc::clone(&sink),
            duration,
        }));
        self.current = Some(Playing { sink, stopped });
        Ok(())
    }

    fn pause(&self) {
        if let Some(playing) = &self.current {
            playing.sink.pause();
        }
    }

    fn resume(&self) {
        if let Some(playing) = &self.current {
            playing.sink.play();
        }
    }

    fn stop(&mut self) {
        self.now_playing.set(None);
        if let Some(playing) = self.current.take() {
            playing.stopped.store(true, Ordering::SeqCst);
            playing.sink.stop();
        }
    }

    fn seek(&self, position: Duration) -> Result<(), PlaybackError> {
        let playing = self.current.as_ref().ok_or(PlaybackError::NothingPlaying)?;
        playing
            .sink
            .try_seek(position)
            .map_err(|e| PlaybackError::SeekUnsupported(e.to_string()))
    }
}

/// Report `Finished` once the sink drains, unless it was stopped first.
///
/// `sleep_until_end()` also returns when the sink is stopped, hence the flag.
fn spawn_completion_watcher(
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
    events: async_mpsc::UnboundedSender<DeviceEvent>,
) {
    thread::spawn(move || {
        sink.sleep_until_end();
        if stopped.load(Ordering::SeqCst) {
            return;
        }
        tracing::debug!("Playback finished naturally");
        let _ = events.send(DeviceEvent::Finished);
    });
}
