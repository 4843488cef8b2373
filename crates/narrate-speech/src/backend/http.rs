//! OpenAI-compatible `/v1/audio/speech` client.

use async_trait::async_trait;
use narrate_core::ReaderSettings;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{SpeechSynthesizer, SynthesizedAudio, validate_request};
use crate::error::SynthesisError;

/// `Accept` header sent with every request.
pub const ACCEPT_AUDIO: &str = "audio/mpeg, audio/wav, audio/*";

/// MIME type assumed when the response declares none.
pub const DEFAULT_MIME_TYPE: &str = "audio/mpeg";

/// Longest slice of an error body quoted in a network error.
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    speed: f32,
}

/// Posts each segment to `settings.endpoint_url` and returns the audio body.
#[derive(Debug, Clone, Default)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
}

impl HttpSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch(
        &self,
        text: &str,
        settings: &ReaderSettings,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let body = SpeechRequest {
            model: &settings.model,
            voice: settings.voice.trim(),
            input: text,
            speed: settings.speed,
        };

        let response = self
            .client
            .post(settings.endpoint_url.trim())
            .header(ACCEPT, ACCEPT_AUDIO)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.trim().chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(SynthesisError::Network {
                status: Some(status.as_u16()),
                message: if detail.is_empty() {
                    status.to_string()
                } else {
                    detail
                },
            });
        }

        let mime_type = match response.headers().get(CONTENT_TYPE) {
            None => DEFAULT_MIME_TYPE.to_string(),
            Some(value) => {
                let declared = value.to_str().unwrap_or_default().trim();
                if !is_audio_type(declared) {
                    return Err(SynthesisError::Validation(format!(
                        "endpoint returned non-audio content type '{declared}'"
                    )));
                }
                declared.to_string()
            }
        };

        let payload = response.bytes().await?;
        if payload.is_empty() {
            return Err(SynthesisError::Network {
                status: Some(status.as_u16()),
                message: "endpoint returned an empty audio payload".to_string(),
            });
        }

        Ok(SynthesizedAudio { payload, mime_type })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        settings: &ReaderSettings,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        validate_request(text, settings)?;

        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SynthesisError::Cancelled),
            result = self.fetch(text, settings) => result,
        }
    }
}

/// `audio/*` with optional parameters, case-insensitive.
fn is_audio_type(content_type: &str) -> bool {
    content_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("audio/"))
}
