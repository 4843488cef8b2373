//! Sequential issuance of synthesis requests for one session.
//!
//! Segments are issued strictly one at a time, in index order, with a
//! short delay between requests so the endpoint is never flooded. A
//! segment-local failure is logged, reported to the queue as a skip, and
//! issuance carries on. Nothing here touches the player state: results
//! flow to the playback context, and notices flow to the coordinator.

use std::sync::Arc;
use std::time::Duration;

use narrate_core::{AudioChunk, ReaderSettings, RecordedAudio, Segment, SessionId};
use tokio::sync::mpsc;

use crate::backend::{SpeechSynthesizer, SynthesizedAudio};
use crate::diagnostics::{DiagnosticsSummary, SessionDiagnostics};
use crate::error::SynthesisError;
use crate::playback::PlaybackHandle;
use crate::session::SessionContext;

/// Pacing for chunked issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuancePolicy {
    /// Pause after a successful request.
    pub success_delay: Duration,
    /// Pause after a failed request.
    pub failure_delay: Duration,
    /// Upper bound on a single request. `None` waits for as long as the
    /// endpoint takes.
    pub request_timeout: Option<Duration>,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            success_delay: Duration::from_millis(100),
            failure_delay: Duration::from_millis(500),
            request_timeout: None,
        }
    }
}

impl IssuancePolicy {
    /// No pacing at all. Useful in tests.
    #[must_use]
    pub const fn without_delays() -> Self {
        Self {
            success_delay: Duration::ZERO,
            failure_delay: Duration::ZERO,
            request_timeout: None,
        }
    }
}

/// Notices from session tasks to the coordinator.
#[derive(Debug)]
pub(crate) enum SessionNote {
    /// First successful payload of a recording session.
    Recording {
        session: SessionId,
        index: usize,
        recording: RecordedAudio,
    },
    /// Every segment was issued; the summary is informational.
    IssuanceFinished {
        session: SessionId,
        summary: DiagnosticsSummary,
    },
    /// The single-shot request failed.
    SingleFailed {
        session: SessionId,
        error: SynthesisError,
    },
}

/// Drives synthesis for one session at a time.
#[derive(Clone)]
pub(crate) struct SessionOrchestrator {
    synth: Arc<dyn SpeechSynthesizer>,
    policy: IssuancePolicy,
    playback: PlaybackHandle,
    notes: mpsc::UnboundedSender<SessionNote>,
}

impl SessionOrchestrator {
    pub(crate) fn new(
        synth: Arc<dyn SpeechSynthesizer>,
        policy: IssuancePolicy,
        playback: PlaybackHandle,
        notes: mpsc::UnboundedSender<SessionNote>,
    ) -> Self {
        Self {
            synth,
            policy,
            playback,
            notes,
        }
    }

    async fn request(
        &self,
        ctx: &SessionContext,
        text: &str,
        settings: &ReaderSettings,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let call = self.synth.synthesize(text, settings, ctx.token());
        match self.policy.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(SynthesisError::Timeout(limit))),
            None => call.await,
        }
    }

    fn note(&self, note: SessionNote) {
        if self.notes.send(note).is_err() {
            tracing::debug!("Coordinator gone, dropping session note");
        }
    }

    /// Issue every segment of the session in order.
    ///
    /// Returns early, silently, as soon as the session stops being current.
    pub(crate) async fn run_session(
        &self,
        ctx: SessionContext,
        segments: Vec<Segment>,
        settings: ReaderSettings,
    ) {
        let session = ctx.id();
        let total = segments.len();
        let mut diagnostics = SessionDiagnostics::new(session);
        let mut recorded = false;

        for segment in &segments {
            let index = segment.index;
            if ctx.ensure_current().is_err() {
                return;
            }

            diagnostics.record_issued(index);
            let result = self.request(&ctx, &segment.text, &settings).await;

            if !ctx.is_current() {
                diagnostics.record_cancelled(index);
                tracing::debug!(session_id = %session, index, "Session superseded, discarding result");
                return;
            }

            let delay = match result {
                Ok(audio) => {
                    diagnostics.record_synthesized(index, audio.payload.len());
                    let chunk = AudioChunk::new(session, index, audio.payload, audio.mime_type);

                    if settings.record_output && !recorded {
                        recorded = true;
                        self.note(SessionNote::Recording {
                            session,
                            index,
                            recording: RecordedAudio {
                                mime_type: chunk.mime_type.clone(),
                                bytes: chunk.payload.clone(),
                            },
                        });
                    }

                    if ctx.ensure_current().is_err() {
                        return;
                    }
                    self.playback.submit(chunk);
                    self.policy.success_delay
                }
                Err(e) if e.is_segment_local() => {
                    diagnostics.record_failed(index);
                    tracing::warn!(
                        session_id = %session,
                        index,
                        total,
                        error = %e,
                        "Failed to synthesise segment, skipping"
                    );
                    self.playback.skip(session, index);
                    self.policy.failure_delay
                }
                Err(_) => {
                    diagnostics.record_cancelled(index);
                    return;
                }
            };

            if index + 1 < total && !ctx.sleep(delay).await {
                tracing::debug!(session_id = %session, index, "Session cancelled during pacing delay");
                return;
            }
        }

        let summary = diagnostics.summary();
        summary.log();
        self.note(SessionNote::IssuanceFinished { session, summary });
    }

    /// Synthesise `text` in one request and hand it to playback as a
    /// one-chunk session. Any failure is reported to the coordinator.
    pub(crate) async fn run_single(&self, ctx: SessionContext, text: String, settings: ReaderSettings) {
        let session = ctx.id();
        let result = self.request(&ctx, &text, &settings).await;

        if !ctx.is_current() {
            tracing::debug!(session_id = %session, "Session superseded, discarding result");
            return;
        }

        match result {
            Ok(audio) => {
                let chunk = AudioChunk::new(session, 0, audio.payload, audio.mime_type);
                if settings.record_output {
                    self.note(SessionNote::Recording {
                        session,
                        index: 0,
                        recording: RecordedAudio {
                            mime_type: chunk.mime_type.clone(),
                            bytes: chunk.payload.clone(),
                        },
                    });
                }
                self.playback.submit(chunk);
            }
            Err(error) if error.is_segment_local() => {
                tracing::warn!(session_id = %session, error = %error, "Single-shot synthesis failed");
                self.note(SessionNote::SingleFailed { session, error });
            }
            Err(_) => {}
        }
    }
}
