//! The playback context: an actor owning the queue and the output device.
//!
//! It talks to the rest of the reader only through messages. Commands come
//! in on [`PlaybackHandle`]; progress goes out as [`PlaybackEvent`]s to the
//! coordinator. Exactly one chunk is on the device at a time, and a new
//! chunk only starts after the previous one finished, errored, or was torn
//! down by a stop or a new session.

use std::time::Duration;

use narrate_core::{AudioChunk, SessionId, TimeInfo};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::device::{DeviceEvent, PlaybackDevice};
use crate::error::PlaybackError;
use crate::queue::{ChunkHandle, OrderedPlaybackQueue, Release, ResourceTracker, SubmitOutcome};

// ── Messages ───────────────────────────────────────────────────────

pub(crate) enum PlaybackCommand {
    /// Tear down whatever is playing and expect `total` chunks for `session`.
    Begin { session: SessionId, total: usize },
    Submit(AudioChunk),
    Skip { session: SessionId, index: usize },
    Pause {
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    /// Stop playback and drop every buffered chunk.
    StopAll,
    Seek {
        position: Duration,
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    TimeInfo {
        reply: oneshot::Sender<Option<TimeInfo>>,
    },
    Stats {
        reply: oneshot::Sender<PlaybackStats>,
    },
    Shutdown,
}

/// Progress reported to the coordinator. Every event names its session so
/// the receiver can drop stale ones.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlaybackEvent {
    /// A chunk was handed to the device.
    Ready { session: SessionId, index: usize },
    /// The device reported audible output for a chunk.
    Started {
        session: SessionId,
        index: usize,
        total: usize,
    },
    /// A chunk could not be played; the cursor moved past it.
    ChunkFailed {
        session: SessionId,
        index: usize,
        message: String,
    },
    Time { session: SessionId, info: TimeInfo },
    /// Every chunk of the session was played or skipped.
    Drained { session: SessionId },
}

/// Snapshot of the playback context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStats {
    pub session_id: SessionId,
    pub expected_index: usize,
    /// Chunks buffered but not yet released.
    pub pending: usize,
    /// Audio buffers currently held, including the one playing.
    pub live_buffers: usize,
    pub paused: bool,
}

// ── Handle ─────────────────────────────────────────────────────────

/// Cloneable sender side of the playback context.
///
/// Fire-and-forget sends ignore a closed context: the caller's session is
/// being torn down anyway.
#[derive(Debug, Clone)]
pub(crate) struct PlaybackHandle {
    tx: mpsc::UnboundedSender<PlaybackCommand>,
}

impl PlaybackHandle {
    pub(crate) const fn new(tx: mpsc::UnboundedSender<PlaybackCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, cmd: PlaybackCommand) {
        if self.tx.send(cmd).is_err() {
            tracing::debug!("Playback context gone, dropping command");
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> PlaybackCommand,
    ) -> Result<T, PlaybackError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| PlaybackError::ContextClosed)?;
        rx.await.map_err(|_| PlaybackError::ContextClosed)
    }

    pub(crate) fn begin(&self, session: SessionId, total: usize) {
        self.send(PlaybackCommand::Begin { session, total });
    }

    pub(crate) fn submit(&self, chunk: AudioChunk) {
        self.send(PlaybackCommand::Submit(chunk));
    }

    pub(crate) fn skip(&self, session: SessionId, index: usize) {
        self.send(PlaybackCommand::Skip { session, index });
    }

    pub(crate) fn stop_all(&self) {
        self.send(PlaybackCommand::StopAll);
    }

    pub(crate) fn shutdown(&self) {
        self.send(PlaybackCommand::Shutdown);
    }

    pub(crate) async fn pause(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Pause { reply }).await?
    }

    pub(crate) async fn resume(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Resume { reply }).await?
    }

    pub(crate) async fn seek(&self, position: Duration) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Seek { position, reply })
            .await?
    }

    pub(crate) async fn time_info(&self) -> Option<TimeInfo> {
        self.request(|reply| PlaybackCommand::TimeInfo { reply })
            .await
            .ok()
            .flatten()
    }

    pub(crate) async fn stats(&self) -> Result<PlaybackStats, PlaybackError> {
        self.request(|reply| PlaybackCommand::Stats { reply }).await
    }
}

// ── Actor ──────────────────────────────────────────────────────────

struct Current {
    handle: ChunkHandle,
    events: mpsc::UnboundedReceiver<DeviceEvent>,
    started: bool,
}

impl Current {
    fn session(&self) -> SessionId {
        self.handle.chunk().session_id
    }

    fn index(&self) -> usize {
        self.handle.chunk().index
    }
}

pub(crate) struct PlaybackContext {
    device: Box<dyn PlaybackDevice>,
    queue: OrderedPlaybackQueue,
    tracker: ResourceTracker,
    current: Option<Current>,
    paused: bool,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl PlaybackContext {
    pub(crate) fn new(
        device: Box<dyn PlaybackDevice>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Self {
        let tracker = ResourceTracker::default();
        Self {
            device,
            queue: OrderedPlaybackQueue::new(tracker.clone()),
            tracker,
            current: None,
            paused: false,
            events,
        }
    }

    /// Run until shut down or every handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PlaybackCommand>,
        time_update_interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(time_update_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            self.pump();

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(PlaybackCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                event = next_device_event(&mut self.current) => self.on_device_event(event),
                _ = ticker.tick() => self.emit_time(),
            }
        }

        self.stop_current();
        self.queue.clear();
        tracing::debug!("Playback context shutting down");
    }

    fn handle(&mut self, cmd: PlaybackCommand) {
        match cmd {
            PlaybackCommand::Begin { session, total } => {
                self.stop_current();
                self.queue.reset(session, total);
                self.paused = false;
                tracing::debug!(session_id = %session, total, "Playback queue reset");
            }
            PlaybackCommand::Submit(chunk) => {
                let (session, index) = (chunk.session_id, chunk.index);
                match self.queue.submit(chunk) {
                    SubmitOutcome::Accepted => {
                        tracing::debug!(session_id = %session, index, "Chunk queued");
                    }
                    outcome => {
                        tracing::debug!(session_id = %session, index, ?outcome, "Chunk discarded");
                    }
                }
            }
            PlaybackCommand::Skip { session, index } => {
                let outcome = self.queue.mark_skipped(session, index);
                tracing::debug!(session_id = %session, index, ?outcome, "Skip recorded");
            }
            PlaybackCommand::Pause { reply } => {
                self.paused = true;
                let result = match self.current {
                    Some(_) => self.device.pause(),
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            PlaybackCommand::Resume { reply } => {
                self.paused = false;
                let result = match self.current {
                    Some(_) => self.device.resume(),
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            PlaybackCommand::StopAll => {
                self.stop_current();
                self.queue.clear();
                self.paused = false;
            }
            PlaybackCommand::Seek { position, reply } => {
                let result = match self.current {
                    Some(_) => self.device.seek(position),
                    None => Err(PlaybackError::NothingPlaying),
                };
                let _ = reply.send(result);
            }
            PlaybackCommand::TimeInfo { reply } => {
                let info = self.current.as_ref().and_then(|_| self.device.time_info());
                let _ = reply.send(info);
            }
            PlaybackCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            PlaybackCommand::Shutdown => {}
        }
    }

    /// Release everything the queue allows, one chunk onto the device at most.
    fn pump(&mut self) {
        while self.current.is_none() && !self.paused {
            match self.queue.next_release() {
                Release::Play(handle) => self.start(handle),
                Release::Skipped(index) => {
                    tracing::debug!(session_id = %self.queue.session(), index, "Passing over skipped segment");
                }
                Release::Drained(session) => {
                    tracing::debug!(session_id = %session, "Playback queue drained");
                    self.emit(PlaybackEvent::Drained { session });
                }
                Release::Wait | Release::Idle => break,
            }
        }
    }

    fn start(&mut self, handle: ChunkHandle) {
        let chunk = handle.chunk();
        let (session, index) = (chunk.session_id, chunk.index);

        self.emit(PlaybackEvent::Ready { session, index });

        match self.device.play(chunk) {
            Ok(events) => {
                self.current = Some(Current {
                    handle,
                    events,
                    started: false,
                });
            }
            Err(e) => {
                drop(handle);
                self.fail_chunk(session, index, &e.to_string());
            }
        }
    }

    fn on_device_event(&mut self, event: DeviceEvent) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let (session, index) = (current.session(), current.index());

        match event {
            DeviceEvent::Started => {
                if !current.started {
                    current.started = true;
                    self.emit(PlaybackEvent::Started {
                        session,
                        index,
                        total: self.queue.total(),
                    });
                }
            }
            DeviceEvent::Finished => {
                tracing::debug!(session_id = %session, index, "Chunk finished");
                self.current = None;
                self.queue.complete(session, index);
            }
            DeviceEvent::Errored(message) => {
                self.current = None;
                self.fail_chunk(session, index, &message);
            }
        }
    }

    /// A chunk that cannot play is passed over like a failed request.
    fn fail_chunk(&mut self, session: SessionId, index: usize, message: &str) {
        tracing::warn!(session_id = %session, index, error = %message, "Failed to play chunk, skipping");
        self.queue.complete(session, index);
        self.emit(PlaybackEvent::ChunkFailed {
            session,
            index,
            message: message.to_string(),
        });
    }

    fn stop_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.device.stop();
            tracing::debug!(session_id = %current.session(), index = current.index(), "Playback torn down");
        }
    }

    fn emit_time(&self) {
        let Some(current) = &self.current else {
            return;
        };
        if !current.started || self.paused {
            return;
        }
        if let Some(info) = self.device.time_info() {
            self.emit(PlaybackEvent::Time {
                session: current.session(),
                info,
            });
        }
    }

    fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            session_id: self.queue.session(),
            expected_index: self.queue.expected_index(),
            pending: self.queue.pending(),
            live_buffers: self.tracker.live(),
            paused: self.paused,
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Playback event receiver dropped");
        }
    }
}

/// Next event for the chunk on the device; never resolves when idle.
///
/// A device that drops its sender without finishing counts as an error so
/// the queue cannot stall on it.
async fn next_device_event(current: &mut Option<Current>) -> DeviceEvent {
    match current {
        Some(current) => current
            .events
            .recv()
            .await
            .unwrap_or_else(|| DeviceEvent::Errored("output closed before finishing".to_string())),
        None => std::future::pending().await,
    }
}

/// Spawn the playback context on the current runtime.
pub(crate) fn spawn(
    device: Box<dyn PlaybackDevice>,
    time_update_interval: Duration,
) -> (PlaybackHandle, mpsc::UnboundedReceiver<PlaybackEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let context = PlaybackContext::new(device, event_tx);
    tokio::spawn(context.run(cmd_rx, time_update_interval));
    (PlaybackHandle::new(cmd_tx), event_rx)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records what it was asked to play; finishes only when told to.
    #[derive(Clone, Default)]
    struct ManualDevice {
        played: Arc<Mutex<Vec<usize>>>,
        senders: Arc<Mutex<Vec<mpsc::UnboundedSender<DeviceEvent>>>>,
    }

    impl ManualDevice {
        fn finish_current(&self) {
            if let Some(tx) = self.senders.lock().unwrap().last() {
                let _ = tx.send(DeviceEvent::Finished);
            }
        }
    }

    impl PlaybackDevice for ManualDevice {
        fn play(
            &mut self,
            chunk: &AudioChunk,
        ) -> Result<mpsc::UnboundedReceiver<DeviceEvent>, PlaybackError> {
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(DeviceEvent::Started);
            self.played.lock().unwrap().push(chunk.index);
            self.senders.lock().unwrap().push(tx);
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
            Some(TimeInfo {
                current_time: 0.5,
                duration: Some(1.0),
            })
        }

        fn seek(&mut self, _position: Duration) -> Result<(), PlaybackError> {
            Ok(())
        }
    }

    fn chunk(session: u64, index: usize) -> AudioChunk {
        AudioChunk::new(SessionId::new(session), index, vec![1, 2, 3], "audio/wav")
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>) -> PlaybackEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for playback event")
            .expect("playback context closed")
    }

    #[tokio::test]
    async fn test_plays_in_order_and_drains() {
        let device = ManualDevice::default();
        let (handle, mut events) = spawn(Box::new(device.clone()), Duration::from_secs(60));
        let session = SessionId::new(1);

        handle.begin(session, 2);
        handle.submit(chunk(1, 1));
        handle.submit(chunk(1, 0));

        assert_eq!(next_event(&mut events).await, PlaybackEvent::Ready { session, index: 0 });
        assert_eq!(
            next_event(&mut events).await,
            PlaybackEvent::Started { session, index: 0, total: 2 }
        );

        device.finish_current();
        assert_eq!(next_event(&mut events).await, PlaybackEvent::Ready { session, index: 1 });
        assert_eq!(
            next_event(&mut events).await,
            PlaybackEvent::Started { session, index: 1, total: 2 }
        );

        device.finish_current();
        assert_eq!(next_event(&mut events).await, PlaybackEvent::Drained { session });
        assert_eq!(*device.played.lock().unwrap(), vec![0, 1]);

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(stats.expected_index, 2);
    }

    #[tokio::test]
    async fn test_pause_holds_next_chunk() {
        let device = ManualDevice::default();
        let (handle, mut events) = spawn(Box::new(device.clone()), Duration::from_secs(60));
        let session = SessionId::new(1);

        handle.begin(session, 2);
        handle.submit(chunk(1, 0));
        next_event(&mut events).await;
        next_event(&mut events).await;

        tokio_test::assert_ok!(handle.pause().await);
        handle.submit(chunk(1, 1));
        device.finish_current();

        let stats = handle.stats().await.unwrap();
        assert!(stats.paused);
        assert_eq!(stats.pending, 1);
        assert_eq!(*device.played.lock().unwrap(), vec![0]);

        tokio_test::assert_ok!(handle.resume().await);
        assert_eq!(next_event(&mut events).await, PlaybackEvent::Ready { session, index: 1 });
    }

    #[tokio::test]
    async fn test_stop_all_releases_buffers() {
        let device = ManualDevice::default();
        let (handle, mut events) = spawn(Box::new(device.clone()), Duration::from_secs(60));

        handle.begin(SessionId::new(1), 3);
        handle.submit(chunk(1, 0));
        handle.submit(chunk(1, 2));
        next_event(&mut events).await;

        assert_eq!(handle.stats().await.unwrap().live_buffers, 2);
        handle.stop_all();

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(stats.pending, 0);
        assert!(stats.session_id.is_none());
        assert!(matches!(
            handle.seek(Duration::from_secs(1)).await,
            Err(PlaybackError::NothingPlaying)
        ));
    }

    #[tokio::test]
    async fn test_time_updates_while_playing() {
        let device = ManualDevice::default();
        let (handle, mut events) = spawn(Box::new(device), Duration::from_millis(10));
        let session = SessionId::new(1);

        handle.begin(session, 1);
        handle.submit(chunk(1, 0));

        loop {
            if let PlaybackEvent::Time { session: s, info } = next_event(&mut events).await {
                assert_eq!(s, session);
                assert!((info.current_time - 0.5).abs() < f64::EPSILON);
                break;
            }
        }
        assert!(handle.time_info().await.is_some());
    }

    #[tokio::test]
    async fn test_new_session_discards_old_chunks() {
        let device = ManualDevice::default();
        let (handle, mut events) = spawn(Box::new(device.clone()), Duration::from_secs(60));

        handle.begin(SessionId::new(1), 2);
        handle.begin(SessionId::new(2), 1);
        handle.submit(chunk(1, 0));
        handle.submit(chunk(2, 0));

        assert_eq!(
            next_event(&mut events).await,
            PlaybackEvent::Ready { session: SessionId::new(2), index: 0 }
        );
        assert_eq!(device.played.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stats_json_shape() {
        let stats = PlaybackStats {
            session_id: SessionId::new(5),
            expected_index: 2,
            pending: 1,
            live_buffers: 2,
            paused: true,
        };
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            serde_json::json!({
                "sessionId": 5,
                "expectedIndex": 2,
                "pending": 1,
                "liveBuffers": 2,
                "paused": true,
            })
        );
    }
}
