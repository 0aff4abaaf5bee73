//! Chat completion proxy.
//!
//! Forwards a conversation to an OpenAI-compatible completion endpoint
//! (OpenRouter in production) with the persona system message prepended.
//! Two mutually exclusive strategies produce the reply, selected by
//! [`ResponseMode`]: one buffered JSON response, or an SSE stream decoded
//! incrementally by [`ReplyStream`].

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ChatConfig, ResponseMode};
use crate::error::{GatewayError, Result};
use crate::message::{Message, Role};
use crate::sse::ReplyStream;

/// Client for the hosted chat-completion API.
pub struct ChatClient {
    config: ChatConfig,
    persona_prompt: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("mode", &self.config.mode)
            .finish()
    }
}

impl ChatClient {
    /// Create a client that injects `persona_prompt` on every request.
    pub fn new(config: ChatConfig, persona_prompt: String) -> Self {
        Self {
            config,
            persona_prompt,
            client: reqwest::Client::new(),
        }
    }

    /// The configured upstream strategy.
    pub fn mode(&self) -> ResponseMode {
        self.config.mode
    }

    /// Produce a complete reply for the given history plus the already
    /// appended user message, using the configured strategy. The streaming
    /// strategy is drained into a single string here; callers that want
    /// fragments use [`stream`](Self::stream) directly.
    pub async fn reply(&self, history: &[Message]) -> Result<String> {
        match self.config.mode {
            ResponseMode::Buffered => self.complete(history).await,
            ResponseMode::Streaming => self.stream(history).await?.collect_text().await,
        }
    }

    /// Non-streaming completion: one JSON response, first choice's text.
    pub async fn complete(&self, history: &[Message]) -> Result<String> {
        let response = self.send(history, false).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Chat(format!("invalid completion response: {e}")))?;

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::Chat("completion response carried no text".to_owned()))
    }

    /// Streaming completion: the response body as a lazy fragment sequence.
    pub async fn stream(&self, history: &[Message]) -> Result<ReplyStream> {
        let response = self.send(history, true).await?;
        Ok(ReplyStream::new(response.bytes_stream()))
    }

    /// POST the request and surface upstream failures with the provider's
    /// status code and body.
    async fn send(&self, history: &[Message], stream: bool) -> Result<reqwest::Response> {
        let request_id = Uuid::new_v4();
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = self.build_body(history, stream);
        debug!(%request_id, %url, stream, "forwarding chat request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key()))
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Chat(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            info!(%request_id, status = status.as_u16(), "chat upstream rejected request");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Build the completion request body.
    ///
    /// The persona system message is prepended exactly once, fresh on every
    /// request; any system-role message smuggled into the history is
    /// dropped so the client can never override the persona.
    fn build_body(&self, history: &[Message], stream: bool) -> serde_json::Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": &self.persona_prompt,
        })];
        for msg in history {
            if msg.role == Role::System {
                continue;
            }
            messages.push(json!({
                "role": msg.role.to_string(),
                "content": &msg.content,
            }));
        }

        json!({
            "model": &self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": stream,
        })
    }

    /// API key from the environment, read at call time. An absent key is
    /// forwarded as-is and surfaces as an upstream authentication failure.
    fn api_key(&self) -> String {
        std::env::var(&self.config.api_key_env).unwrap_or_default()
    }
}
