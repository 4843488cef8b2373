//! Integration tests for session handling in the `Reader`.
//!
//! A scripted synthesiser and a scripted playback device stand in for the
//! speech endpoint and the sound card, so every scenario runs in-process
//! and deterministically.
//!
//! # What is tested
//!
//! - Failed segments are skipped and the rest still play in order
//! - A request that outlives the timeout is skipped like a failure
//! - Stop right after start yields exactly `loading → stopped`
//! - A superseded session never plays, even if its request succeeds later
//! - Stop mid-playback releases every buffer
//! - A session whose segments all fail still reaches `stopped`
//! - Pause holds the queue between chunks until resume
//! - The unchunked path plays the whole text as one payload
//! - Recording and file output
//! - Session ids stay distinct across readers in one process

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use narrate_core::{AudioChunk, PlayerState, ReaderEvent, ReaderSettings, SessionId, TimeInfo};
use narrate_speech::{
    DeviceEvent, FileDevice, IssuancePolicy, PlaybackDevice, PlaybackError, Reader, ReaderConfig,
    ReaderHandle, SpeechSynthesizer, SynthesisError, SynthesizedAudio,
};
use tokio::sync::{Notify, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(3);

// ── Scripted synthesiser ───────────────────────────────────────────

/// Behaviour is keyed on the segment text:
///
/// - `FAIL` fails with a 500
/// - `HANG` waits until cancelled
/// - `SLOW` waits for [`ScriptedSynth::release`] and ignores cancellation
///
/// Anything else succeeds at once, echoing the text back as the payload.
#[derive(Default)]
struct ScriptedSynth {
    calls: AtomicUsize,
    gate: Notify,
}

impl ScriptedSynth {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynth {
    async fn synthesize(
        &self,
        text: &str,
        _settings: &ReaderSettings,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if text.contains("FAIL") {
            return Err(SynthesisError::Network {
                status: Some(500),
                message: "scripted failure".to_string(),
            });
        }
        if text.contains("HANG") {
            cancel.cancelled().await;
            return Err(SynthesisError::Cancelled);
        }
        if text.contains("SLOW") {
            self.gate.notified().await;
        }

        Ok(SynthesizedAudio {
            payload: Bytes::copy_from_slice(text.as_bytes()),
            mime_type: "audio/wav".to_string(),
        })
    }
}

// ── Scripted device ────────────────────────────────────────────────

/// Records every payload it is asked to play. In manual mode a chunk only
/// finishes when the test says so.
#[derive(Clone, Default)]
struct ScriptedDevice {
    manual: bool,
    played: Arc<Mutex<Vec<String>>>,
    current: Arc<Mutex<Option<mpsc::UnboundedSender<DeviceEvent>>>>,
}

impl ScriptedDevice {
    fn manual() -> Self {
        Self {
            manual: true,
            ..Self::default()
        }
    }

    fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    fn finish_current(&self) {
        if let Some(tx) = self.current.lock().unwrap().take() {
            let _ = tx.send(DeviceEvent::Finished);
        }
    }
}

impl PlaybackDevice for ScriptedDevice {
    fn play(
        &mut self,
        chunk: &AudioChunk,
    ) -> Result<mpsc::UnboundedReceiver<DeviceEvent>, PlaybackError> {
        let text = String::from_utf8_lossy(&chunk.payload).into_owned();
        self.played.lock().unwrap().push(text);

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(DeviceEvent::Started);
        if self.manual {
            *self.current.lock().unwrap() = Some(tx);
        } else {
            let _ = tx.send(DeviceEvent::Finished);
        }
        Ok(rx)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&mut self) {
        self.current.lock().unwrap().take();
    }

    fn time_info(&self) -> Option<TimeInfo> {
        None
    }

    fn seek(&mut self, _position: Duration) -> Result<(), PlaybackError> {
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn spawn(synth: &Arc<ScriptedSynth>, device: ScriptedDevice) -> ReaderHandle {
    let config = ReaderConfig {
        policy: IssuancePolicy::without_delays(),
        ..ReaderConfig::default()
    };
    Reader::spawn(config, Arc::clone(synth) as Arc<dyn SpeechSynthesizer>, device)
}

/// One ~300 character paragraph: too long to share a segment with another.
fn paragraph(tag: &str) -> String {
    format!("{tag} {}end.", "lorem ".repeat(48))
}

fn document(tags: &[&str]) -> String {
    tags.iter()
        .map(|t| paragraph(t))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn tags_of(played: &[String]) -> Vec<String> {
    played
        .iter()
        .map(|p| p.split_whitespace().next().unwrap_or_default().to_string())
        .collect()
}

async fn wait_for_state(reader: &ReaderHandle, state: PlayerState) {
    let mut rx = reader.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("never reached {state}"))
        .expect("state channel closed");
}

/// Receive events until `pred` matches, returning everything seen.
async fn collect_until(
    rx: &mut broadcast::Receiver<ReaderEvent>,
    pred: impl Fn(&ReaderEvent) -> bool,
) -> Vec<ReaderEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for reader event")
            .expect("event channel closed");
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn drain(rx: &mut broadcast::Receiver<ReaderEvent>) -> Vec<ReaderEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    seen
}

fn states(events: &[ReaderEvent]) -> Vec<PlayerState> {
    events
        .iter()
        .filter_map(|e| match e {
            ReaderEvent::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

fn is_complete(id: SessionId) -> impl Fn(&ReaderEvent) -> bool {
    move |e| *e == ReaderEvent::StreamComplete { session_id: id }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_segment_is_skipped_and_rest_plays_in_order() {
    let synth = Arc::new(ScriptedSynth::default());
    let device = ScriptedDevice::default();
    let reader = spawn(&synth, device.clone());
    let mut events = reader.subscribe();

    let id = reader
        .start(document(&["ONE", "FAIL", "THREE"]), ReaderSettings::default())
        .await
        .unwrap();

    let seen = collect_until(&mut events, is_complete(id)).await;
    wait_for_state(&reader, PlayerState::Stopped).await;

    assert_eq!(synth.calls(), 3);
    assert_eq!(tags_of(&device.played()), vec!["ONE", "THREE"]);
    assert!(!seen.iter().any(|e| matches!(e, ReaderEvent::Error { .. })));

    let started: Vec<usize> = seen
        .iter()
        .filter_map(|e| match e {
            ReaderEvent::SegmentStarted { index, total, .. } => {
                assert_eq!(*total, 3);
                Some(*index)
            }
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![0, 2]);

    let observed = states(&seen);
    assert_eq!(
        &observed[..3],
        &[PlayerState::Loading, PlayerState::Ready, PlayerState::Playing]
    );
}

#[tokio::test]
async fn timed_out_segment_is_skipped_and_stream_completes() {
    let synth = Arc::new(ScriptedSynth::default());
    let device = ScriptedDevice::default();
    let config = ReaderConfig {
        policy: IssuancePolicy {
            request_timeout: Some(Duration::from_millis(10)),
            ..IssuancePolicy::without_delays()
        },
        ..ReaderConfig::default()
    };
    let reader = Reader::spawn(
        config,
        Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
        device.clone(),
    );
    let mut events = reader.subscribe();

    let id = reader
        .start(document(&["ONE", "HANG", "THREE"]), ReaderSettings::default())
        .await
        .unwrap();

    let seen = collect_until(&mut events, is_complete(id)).await;
    wait_for_state(&reader, PlayerState::Stopped).await;

    assert_eq!(synth.calls(), 3);
    assert_eq!(tags_of(&device.played()), vec!["ONE", "THREE"]);
    assert!(!seen.iter().any(|e| matches!(e, ReaderEvent::Error { .. })));
}

#[tokio::test]
async fn stop_before_any_chunk_goes_straight_to_stopped() {
    let synth = Arc::new(ScriptedSynth::default());
    let device = ScriptedDevice::default();
    let reader = spawn(&synth, device.clone());
    let mut events = reader.subscribe();

    reader
        .start(document(&["HANG", "TWO"]), ReaderSettings::default())
        .await
        .unwrap();
    reader.stop().await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        states(&drain(&mut events)),
        vec![PlayerState::Loading, PlayerState::Stopped]
    );
    assert!(device.played().is_empty());
    assert!(synth.calls() <= 1);
}

#[tokio::test]
async fn superseded_session_never_plays() {
    let synth = Arc::new(ScriptedSynth::default());
    let device = ScriptedDevice::default();
    let reader = spawn(&synth, device.clone());
    let mut events = reader.subscribe();

    reader
        .start(paragraph("SLOW"), ReaderSettings::default())
        .await
        .unwrap();
    wait_until(|| synth.calls() == 1).await;

    let second = reader
        .start(paragraph("FRESH"), ReaderSettings::default())
        .await
        .unwrap();
    // The old request now succeeds, after it was superseded.
    synth.release();

    collect_until(&mut events, is_complete(second)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(tags_of(&device.played()), vec!["FRESH"]);
    let stats = reader.playback_stats().await.unwrap();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn stop_mid_playback_releases_everything() {
    let synth = Arc::new(ScriptedSynth::default());
    let device = ScriptedDevice::manual();
    let reader = spawn(&synth, device.clone());

    reader
        .start(document(&["ONE", "TWO", "THREE"]), ReaderSettings::default())
        .await
        .unwrap();
    wait_for_state(&reader, PlayerState::Playing).await;

    let before = tokio::time::timeout(WAIT, async {
        loop {
            let stats = reader.playback_stats().await.unwrap();
            if stats.pending == 2 {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("later chunks never buffered");
    assert_eq!(before.live_buffers, 3);
    assert_eq!(before.expected_index, 0);

    reader.stop().await.unwrap();
    assert_eq!(reader.state(), PlayerState::Stopped);

    let after = reader.playback_stats().await.unwrap();
    assert_eq!(after.pending, 0);
    assert_eq!(after.live_buffers, 0);
    assert_eq!(tags_of(&device.played()), vec!["ONE"]);
}

#[tokio::test]
async fn all_segments_failing_still_stops() {
    let synth = Arc::new(ScriptedSynth::default());
    let device = ScriptedDevice::default();
    let reader = spawn(&synth, device.clone());
    let mut events = reader.subscribe();

    let id = reader
        .start(document(&["FAIL", "FAIL", "FAIL"]), ReaderSettings::default())
        .await
        .unwrap();

    let seen = collect_until(&mut events, is_complete(id)).await;
    wait_for_state(&reader, PlayerState::Stopped).await;

    assert!(device.played().is_empty());
    assert_eq!(synth.calls(), 3);
    assert!(!seen.iter().any(|e| matches!(e, ReaderEvent::Error { .. })));
    assert!(!states(&seen).contains(&PlayerState::Playing));
}

#[tokio::test]
async fn pause_holds_queue_until_resume() {
    let synth = Arc::new(ScriptedSynth::default());
    let device = ScriptedDevice::manual();
    let reader = spawn(&synth, device.clone());

    reader
        .start(document(&["ONE", "TWO"]), ReaderSettings::default())
        .await
        .unwrap();
    wait_for_state(&reader, PlayerState::Playing).await;

    reader.pause().await.unwrap();
    assert_eq!(reader.state(), PlayerState::Paused);
    assert!(matches!(
        reader.pause().await,
        Err(narrate_speech::ReaderError::InvalidTransition { .. })
    ));

    wait_until(|| synth.calls() == 2).await;
    device.finish_current();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tags_of(&device.played()), vec!["ONE"]);

    reader.resume().await.unwrap();
    wait_until(|| device.played().len() == 2).await;
    assert_eq!(reader.state(), PlayerState::Playing);

    device.finish_current();
    wait_for_state(&reader, PlayerState::Stopped).await;
}

#[tokio::test]
async fn unchunked_read_plays_whole_text_once() {
    let synth = Arc::new(ScriptedSynth::default());
    let device = ScriptedDevice::default();
    let reader = spawn(&synth, device.clone());
    let mut events = reader.subscribe();

    let text = document(&["ONE", "TWO", "THREE"]);
    let settings = ReaderSettings {
        chunking_enabled: false,
        ..ReaderSettings::default()
    };
    let id = reader.start(text.clone(), settings).await.unwrap();

    collect_until(&mut events, is_complete(id)).await;
    assert_eq!(synth.calls(), 1);
    assert_eq!(device.played(), vec![text]);
}

#[tokio::test]
async fn recording_reports_first_success_once() {
    let synth = Arc::new(ScriptedSynth::default());
    let reader = spawn(&synth, ScriptedDevice::default());
    let mut events = reader.subscribe();

    let settings = ReaderSettings {
        record_output: true,
        ..ReaderSettings::default()
    };
    let id = reader
        .start(document(&["FAIL", "TWO", "THREE"]), settings)
        .await
        .unwrap();

    let seen = collect_until(&mut events, is_complete(id)).await;
    let recordings: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            ReaderEvent::RecordingAvailable {
                session_id,
                index,
                recording,
            } => Some((*session_id, *index, recording.mime_type.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(recordings, vec![(id, 1, "audio/wav".to_string())]);
}

#[tokio::test]
async fn file_device_writes_chunks_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let synth = Arc::new(ScriptedSynth::default());
    let config = ReaderConfig {
        policy: IssuancePolicy::without_delays(),
        ..ReaderConfig::default()
    };
    let reader = Reader::spawn(config, synth, FileDevice::new(dir.path()));
    let mut events = reader.subscribe();

    let id = reader
        .start(document(&["ONE", "TWO"]), ReaderSettings::default())
        .await
        .unwrap();
    collect_until(&mut events, is_complete(id)).await;

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![format!("{id}-0000.wav"), format!("{id}-0001.wav")]);

    let first = std::fs::read_to_string(dir.path().join(&names[0])).unwrap();
    assert!(first.starts_with("ONE"));
}

#[tokio::test]
async fn readers_sharing_a_directory_never_overwrite_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let config = ReaderConfig {
        policy: IssuancePolicy::without_delays(),
        ..ReaderConfig::default()
    };
    let alpha = Reader::spawn(
        config,
        Arc::new(ScriptedSynth::default()) as Arc<dyn SpeechSynthesizer>,
        FileDevice::new(dir.path()),
    );
    let bravo = Reader::spawn(
        config,
        Arc::new(ScriptedSynth::default()) as Arc<dyn SpeechSynthesizer>,
        FileDevice::new(dir.path()),
    );
    let mut alpha_events = alpha.subscribe();
    let mut bravo_events = bravo.subscribe();

    let a = alpha
        .start("Alpha text.".to_string(), ReaderSettings::default())
        .await
        .unwrap();
    collect_until(&mut alpha_events, is_complete(a)).await;
    let b = bravo
        .start("Bravo text.".to_string(), ReaderSettings::default())
        .await
        .unwrap();
    collect_until(&mut bravo_events, is_complete(b)).await;

    assert_ne!(a, b);
    let alpha_file = std::fs::read_to_string(dir.path().join(format!("{a}-0000.wav"))).unwrap();
    let bravo_file = std::fs::read_to_string(dir.path().join(format!("{b}-0000.wav"))).unwrap();
    assert_eq!(alpha_file, "Alpha text.");
    assert_eq!(bravo_file, "Bravo text.");
}
