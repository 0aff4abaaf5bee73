//! Speech synthesis proxy.
//!
//! Cleans a reply with the [`Sanitizer`] and forwards the result to an
//! ElevenLabs-compatible text-to-speech endpoint. Degenerate replies (pure
//! stage direction, banner noise) never reach the synthesis API at all.

use bytes::Bytes;
use serde_json::json;
use tracing::{debug, info};

use crate::config::SpeechConfig;
use crate::error::{GatewayError, Result};
use crate::sanitize::Sanitizer;

/// Result of a synthesis request.
#[derive(Debug)]
pub enum SpeechOutcome {
    /// Nothing speakable survived sanitization; no upstream call was made.
    NoContent,
    /// Synthesized audio from the upstream provider.
    Audio {
        /// Upstream content type, `audio/mpeg` unless the provider says
        /// otherwise.
        content_type: String,
        /// Raw audio payload.
        bytes: Bytes,
    },
}

/// Client for the hosted speech-synthesis API.
pub struct SpeechClient {
    config: SpeechConfig,
    sanitizer: Sanitizer,
    client: reqwest::Client,
}

impl std::fmt::Debug for SpeechClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechClient")
            .field("base_url", &self.config.base_url)
            .field("model_id", &self.config.model_id)
            .finish()
    }
}

impl SpeechClient {
    /// Create a client that sanitizes with the given pipeline.
    pub fn new(config: SpeechConfig, sanitizer: Sanitizer) -> Self {
        Self {
            config,
            sanitizer,
            client: reqwest::Client::new(),
        }
    }

    /// Sanitize `text` and synthesize it.
    ///
    /// Returns [`SpeechOutcome::NoContent`] without touching the network
    /// when sanitization leaves nothing speakable. Upstream failures pass
    /// through with the provider's status code and body.
    pub async fn synthesize(&self, text: &str) -> Result<SpeechOutcome> {
        let Some(clean) = self.sanitizer.speakable(text) else {
            info!("no speech content after filtering");
            return Ok(SpeechOutcome::NoContent);
        };
        debug!(chars = clean.chars().count(), "requesting synthesis");

        let voice_id = std::env::var(&self.config.voice_id_env).unwrap_or_default();
        let url = format!(
            "{}/v1/text-to-speech/{voice_id}",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "text": clean,
            "model_id": &self.config.model_id,
            "voice_settings": &self.config.voice_settings,
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Speech(format!("speech request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            info!(status = status.as_u16(), "speech upstream rejected request");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_owned();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Speech(format!("reading audio body failed: {e}")))?;

        Ok(SpeechOutcome::Audio {
            content_type,
            bytes,
        })
    }

    /// API key from the environment, read at call time.
    fn api_key(&self) -> String {
        std::env::var(&self.config.api_key_env).unwrap_or_default()
    }
}
