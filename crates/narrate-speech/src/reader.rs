//! The reader: public handle plus the coordinator task behind it.
//!
//! # Ownership
//!
//! The coordinator is the single writer of the active session id and the
//! player state. The playback context owns the queue and the device. The
//! orchestrator tasks own nothing shared; they only send. Every message
//! that crosses a task boundary names its session, and the receiver drops
//! it when that session is no longer active.

use std::sync::Arc;
use std::time::Duration;

use narrate_core::{
    PlayerState, ReaderEvent, ReaderSettings, SegmenterConfig, SessionId, TimeInfo, segment,
    validate_segmenter, validate_settings,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::backend::SpeechSynthesizer;
use crate::device::PlaybackDevice;
use crate::error::{PlaybackError, ReaderError};
use crate::orchestrator::{IssuancePolicy, SessionNote, SessionOrchestrator};
use crate::playback::{self, PlaybackEvent, PlaybackHandle, PlaybackStats};
use crate::session::{ActiveSession, SessionContext, SessionIds};
use crate::state::{EventBus, PlayerStateMachine};

/// Tunables for a [`Reader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    pub segmenter: SegmenterConfig,
    pub policy: IssuancePolicy,
    /// How often `TimeUpdate` events are sent while audio plays.
    pub time_update_interval: Duration,
    /// Broadcast buffer per subscriber; slow subscribers lose the oldest events.
    pub event_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            policy: IssuancePolicy::default(),
            time_update_interval: Duration::from_millis(250),
            event_capacity: 64,
        }
    }
}

// ── Commands ───────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<Result<T, ReaderError>>;

#[derive(Debug)]
enum ReaderCommand {
    Start {
        text: String,
        settings: ReaderSettings,
        reply: Reply<SessionId>,
    },
    Stop {
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Shutdown,
}

// ── Handle ─────────────────────────────────────────────────────────

/// Cloneable handle to a running reader.
///
/// Dropping every handle shuts the reader down.
#[derive(Debug, Clone)]
pub struct ReaderHandle {
    commands: mpsc::UnboundedSender<ReaderCommand>,
    playback: PlaybackHandle,
    bus: EventBus,
    state: watch::Receiver<PlayerState>,
}

impl ReaderHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ReaderCommand,
    ) -> Result<T, ReaderError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ReaderError::Closed)?;
        rx.await.map_err(|_| ReaderError::Closed)?
    }

    /// Start reading `text`, superseding whatever is in progress.
    ///
    /// Returns the new session id once the session is set up; audio follows
    /// asynchronously. Fails without issuing any request when the settings
    /// are invalid or the text yields no segments.
    pub async fn start(
        &self,
        text: impl Into<String>,
        settings: ReaderSettings,
    ) -> Result<SessionId, ReaderError> {
        let text = text.into();
        self.request(|reply| ReaderCommand::Start {
            text,
            settings,
            reply,
        })
        .await
    }

    /// Stop the active session and release everything it holds.
    pub async fn stop(&self) -> Result<(), ReaderError> {
        self.request(|reply| ReaderCommand::Stop { reply }).await
    }

    /// Pause playback. Only valid while `Playing`.
    pub async fn pause(&self) -> Result<(), ReaderError> {
        self.request(|reply| ReaderCommand::Pause { reply }).await
    }

    /// Resume playback. Only valid while `Paused`.
    pub async fn resume(&self) -> Result<(), ReaderError> {
        self.request(|reply| ReaderCommand::Resume { reply }).await
    }

    /// Seek within the chunk currently on the device.
    pub async fn seek(&self, position: Duration) -> Result<(), ReaderError> {
        Ok(self.playback.seek(position).await?)
    }

    /// Position of the chunk currently on the device.
    pub async fn time_info(&self) -> Option<TimeInfo> {
        self.playback.time_info().await
    }

    pub async fn playback_stats(&self) -> Result<PlaybackStats, ReaderError> {
        Ok(self.playback.stats().await?)
    }

    #[must_use]
    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    /// Receiver that always holds the latest state.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<PlayerState> {
        self.state.clone()
    }

    /// Subscribe to reader events from this point on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.bus.subscribe()
    }

    /// Stop everything and end the background tasks.
    pub fn shutdown(&self) {
        let _ = self.commands.send(ReaderCommand::Shutdown);
    }
}

// ── Reader ─────────────────────────────────────────────────────────

/// Entry point: wires a synthesiser and a device into a running reader.
pub struct Reader;

impl Reader {
    /// Spawn the coordinator and playback tasks on the current runtime.
    pub fn spawn(
        config: ReaderConfig,
        synth: Arc<dyn SpeechSynthesizer>,
        device: impl PlaybackDevice,
    ) -> ReaderHandle {
        let bus = EventBus::new(config.event_capacity);
        let machine = PlayerStateMachine::new(bus.clone());
        let state = machine.watch();

        let (playback, playback_events) =
            playback::spawn(Box::new(device), config.time_update_interval);
        let (note_tx, notes) = mpsc::unbounded_channel();
        let orchestrator =
            SessionOrchestrator::new(synth, config.policy, playback.clone(), note_tx);

        let (cmd_tx, commands) = mpsc::unbounded_channel();
        let coordinator = Coordinator {
            segmenter: config.segmenter,
            ids: SessionIds,
            active: ActiveSession::default(),
            run: None,
            machine,
            bus: bus.clone(),
            playback: playback.clone(),
            orchestrator,
        };
        tokio::spawn(coordinator.run(commands, playback_events, notes));

        ReaderHandle {
            commands: cmd_tx,
            playback,
            bus,
            state,
        }
    }
}

// ── Coordinator ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    Chunked,
    Single,
}

/// The session currently owned by the coordinator.
struct ActiveRun {
    ctx: SessionContext,
    mode: ReadMode,
}

struct Coordinator {
    segmenter: SegmenterConfig,
    ids: SessionIds,
    active: ActiveSession,
    run: Option<ActiveRun>,
    machine: PlayerStateMachine,
    bus: EventBus,
    playback: PlaybackHandle,
    orchestrator: SessionOrchestrator,
}

impl Coordinator {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ReaderCommand>,
        mut playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
        mut notes: mpsc::UnboundedReceiver<SessionNote>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(ReaderCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd).await,
                },
                Some(event) = playback_events.recv() => self.on_playback(event),
                Some(note) = notes.recv() => self.on_note(note),
            }
        }

        self.end_run();
        self.machine.stop();
        self.playback.shutdown();
        tracing::debug!("Reader coordinator shutting down");
    }

    async fn handle(&mut self, cmd: ReaderCommand) {
        match cmd {
            ReaderCommand::Start {
                text,
                settings,
                reply,
            } => {
                let _ = reply.send(self.start(text, settings));
            }
            ReaderCommand::Stop { reply } => {
                self.stop();
                let _ = reply.send(Ok(()));
            }
            ReaderCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            ReaderCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            ReaderCommand::Shutdown => {}
        }
    }

    // ── Session lifecycle ──────────────────────────────────────────

    fn start(&mut self, text: String, settings: ReaderSettings) -> Result<SessionId, ReaderError> {
        self.end_run();

        let id = self.ids.next_id();
        self.active.set(id);
        // Any state may enter Loading.
        let _ = self.machine.transition(PlayerState::Loading);

        if let Err(e) = validate_settings(&settings).and(validate_segmenter(&self.segmenter)) {
            return Err(self.fail(id, e.into()));
        }

        let ctx = SessionContext::new(id, self.active.clone());
        let mode = if settings.chunking_enabled {
            let segments = segment(&text, &self.segmenter);
            if segments.is_empty() {
                return Err(self.fail(id, ReaderError::NoSegments));
            }

            tracing::info!(session_id = %id, segments = segments.len(), "Starting chunked read");
            self.playback.begin(id, segments.len());
            let orchestrator = self.orchestrator.clone();
            let task_ctx = ctx.clone();
            tokio::spawn(async move {
                orchestrator.run_session(task_ctx, segments, settings).await;
            });
            ReadMode::Chunked
        } else {
            if text.trim().is_empty() {
                return Err(self.fail(id, ReaderError::NoSegments));
            }

            tracing::info!(session_id = %id, chars = text.chars().count(), "Starting single-shot read");
            self.playback.begin(id, 1);
            let orchestrator = self.orchestrator.clone();
            let task_ctx = ctx.clone();
            tokio::spawn(async move {
                orchestrator.run_single(task_ctx, text, settings).await;
            });
            ReadMode::Single
        };

        self.run = Some(ActiveRun { ctx, mode });
        Ok(id)
    }

    fn stop(&mut self) {
        if let Some(run) = &self.run {
            tracing::info!(session_id = %run.ctx.id(), "Stopping read");
        }
        self.end_run();
        self.machine.stop();
    }

    /// Supersede the active session: cancel its work, forget its id, and
    /// drop whatever the playback context holds for it.
    fn end_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.ctx.cancel();
            tracing::debug!(session_id = %run.ctx.id(), "Session superseded");
        }
        self.active.clear();
        self.playback.stop_all();
    }

    /// Session-fatal failure: tell observers, then stop.
    fn fail(&mut self, session: SessionId, error: ReaderError) -> ReaderError {
        tracing::warn!(session_id = %session, error = %error, "Read failed");
        self.bus.emit(ReaderEvent::Error {
            message: error.to_string(),
        });
        self.end_run();
        self.machine.stop();
        error
    }

    async fn pause(&mut self) -> Result<(), ReaderError> {
        self.require(PlayerState::Playing, PlayerState::Paused)?;
        self.playback.pause().await?;
        self.machine.transition(PlayerState::Paused)?;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), ReaderError> {
        self.require(PlayerState::Paused, PlayerState::Playing)?;
        self.playback.resume().await?;
        self.machine.transition(PlayerState::Playing)?;
        Ok(())
    }

    fn require(&self, expected: PlayerState, to: PlayerState) -> Result<(), ReaderError> {
        let from = self.machine.state();
        if from == expected {
            Ok(())
        } else {
            Err(ReaderError::InvalidTransition { from, to })
        }
    }

    fn current_mode(&self, session: SessionId) -> Option<ReadMode> {
        self.run
            .as_ref()
            .filter(|run| run.ctx.id() == session && run.ctx.is_current())
            .map(|run| run.mode)
    }

    // ── Inbound events ─────────────────────────────────────────────

    fn on_playback(&mut self, event: PlaybackEvent) {
        let session = match &event {
            PlaybackEvent::Ready { session, .. }
            | PlaybackEvent::Started { session, .. }
            | PlaybackEvent::ChunkFailed { session, .. }
            | PlaybackEvent::Time { session, .. }
            | PlaybackEvent::Drained { session } => *session,
        };
        let Some(mode) = self.current_mode(session) else {
            tracing::debug!(session_id = %session, ?event, "Ignoring playback event for inactive session");
            return;
        };

        match event {
            PlaybackEvent::Ready { .. } => {
                if self.machine.state() == PlayerState::Loading {
                    let _ = self.machine.transition(PlayerState::Ready);
                }
            }
            PlaybackEvent::Started { index, total, .. } => {
                if self.machine.state() == PlayerState::Loading {
                    let _ = self.machine.transition(PlayerState::Ready);
                }
                if self.machine.state() == PlayerState::Ready {
                    let _ = self.machine.transition(PlayerState::Playing);
                }
                self.bus.emit(ReaderEvent::SegmentStarted {
                    session_id: session,
                    index,
                    total,
                });
            }
            PlaybackEvent::ChunkFailed { message, .. } => {
                if mode == ReadMode::Single {
                    self.fail(session, PlaybackError::ChunkFailed(message).into());
                }
            }
            PlaybackEvent::Time { info, .. } => {
                self.bus.emit(ReaderEvent::TimeUpdate {
                    current_time: info.current_time,
                    duration: info.duration,
                });
            }
            PlaybackEvent::Drained { .. } => {
                tracing::info!(session_id = %session, "Read complete");
                self.bus
                    .emit(ReaderEvent::StreamComplete { session_id: session });
                self.end_run();
                self.machine.stop();
            }
        }
    }

    fn on_note(&mut self, note: SessionNote) {
        match note {
            SessionNote::Recording {
                session,
                index,
                recording,
            } => {
                if self.current_mode(session).is_some() {
                    self.bus.emit(ReaderEvent::RecordingAvailable {
                        session_id: session,
                        index,
                        recording,
                    });
                }
            }
            SessionNote::IssuanceFinished { session, summary } => {
                tracing::debug!(
                    session_id = %session,
                    synthesized = summary.synthesized,
                    failed = summary.failed,
                    "All segments issued"
                );
            }
            SessionNote::SingleFailed { session, error } => {
                if self.current_mode(session).is_some() {
                    self.fail(session, error.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use narrate_core::AudioChunk;

    use super::*;
    use crate::backend::{MockSpeechSynthesizer, SynthesizedAudio};
    use crate::device::DeviceEvent;
    use crate::error::SynthesisError;

    /// Plays instantly: every chunk starts and finishes on the spot.
    #[derive(Clone, Default)]
    struct InstantDevice {
        played: Arc<Mutex<Vec<(SessionId, usize)>>>,
    }

    impl PlaybackDevice for InstantDevice {
        fn play(
            &mut self,
            chunk: &AudioChunk,
        ) -> Result<mpsc::UnboundedReceiver<DeviceEvent>, PlaybackError> {
            self.played
                .lock()
                .unwrap()
                .push((chunk.session_id, chunk.index));
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
            Ok(())
        }
    }

    fn config() -> ReaderConfig {
        ReaderConfig {
            policy: IssuancePolicy::without_delays(),
            ..ReaderConfig::default()
        }
    }

    fn ok_synth() -> MockSpeechSynthesizer {
        let mut synth = MockSpeechSynthesizer::new();
        synth.expect_synthesize().returning(|text, _, _| {
            Ok(SynthesizedAudio {
                payload: Bytes::copy_from_slice(text.as_bytes()),
                mime_type: "audio/wav".to_string(),
            })
        });
        synth
    }

    async fn wait_stopped(reader: &ReaderHandle) {
        let mut state = reader.watch_state();
        tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| *s == PlayerState::Stopped),
        )
        .await
        .expect("reader never stopped")
        .expect("state channel closed");
    }

    #[tokio::test]
    async fn test_reads_to_completion() {
        let device = InstantDevice::default();
        let reader = Reader::spawn(config(), Arc::new(ok_synth()), device.clone());
        let mut events = reader.subscribe();

        let id = reader
            .start("First paragraph.\n\nSecond paragraph.", ReaderSettings::default())
            .await
            .unwrap();

        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .expect("timed out")
                .unwrap();
            if event == (ReaderEvent::StreamComplete { session_id: id }) {
                break;
            }
        }
        wait_stopped(&reader).await;
        assert_eq!(*device.played.lock().unwrap(), vec![(id, 0)]);
    }

    #[tokio::test]
    async fn test_invalid_settings_never_request() {
        let mut synth = MockSpeechSynthesizer::new();
        synth.expect_synthesize().never();
        let reader = Reader::spawn(config(), Arc::new(synth), InstantDevice::default());
        let mut events = reader.subscribe();

        let settings = ReaderSettings {
            speed: 0.0,
            ..ReaderSettings::default()
        };
        let err = reader.start("Hello.", settings).await.unwrap_err();
        assert!(matches!(err, ReaderError::InvalidSettings(_)));
        assert_eq!(reader.state(), PlayerState::Stopped);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            saw_error |= matches!(event, ReaderEvent::Error { .. });
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_empty_text_is_fatal() {
        let reader = Reader::spawn(config(), Arc::new(ok_synth()), InstantDevice::default());
        let err = reader
            .start("  \n\n ", ReaderSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::NoSegments));
        assert_eq!(reader.state(), PlayerState::Stopped);
    }

    #[tokio::test]
    async fn test_pause_requires_playing() {
        let reader = Reader::spawn(config(), Arc::new(ok_synth()), InstantDevice::default());
        let err = reader.pause().await.unwrap_err();
        assert!(matches!(
            err,
            ReaderError::InvalidTransition {
                from: PlayerState::Stopped,
                to: PlayerState::Paused
            }
        ));
        assert!(matches!(
            reader.resume().await,
            Err(ReaderError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_shot_failure_is_fatal() {
        let mut synth = MockSpeechSynthesizer::new();
        synth
            .expect_synthesize()
            .times(1)
            .returning(|_, _, _| Err(SynthesisError::network("refused")));
        let reader = Reader::spawn(config(), Arc::new(synth), InstantDevice::default());
        let mut events = reader.subscribe();

        let settings = ReaderSettings {
            chunking_enabled: false,
            ..ReaderSettings::default()
        };
        reader.start("Hello there.", settings).await.unwrap();
        wait_stopped(&reader).await;

        let mut messages = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ReaderEvent::Error { message } = event {
                messages.push(message);
            }
        }
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("refused"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let reader = Reader::spawn(config(), Arc::new(ok_synth()), InstantDevice::default());
        reader.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if matches!(reader.stop().await, Err(ReaderError::Closed)) {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(result.is_ok());
    }
}
