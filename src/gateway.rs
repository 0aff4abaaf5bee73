//! HTTP gateway for the terminal widget.
//!
//! Exposes the two endpoints the widget talks to:
//!
//! - `POST /api/chat` — forward a conversation to the chat upstream and
//!   return the reply (JSON, or re-emitted server-sent events when the
//!   streaming strategy is configured).
//! - `POST /api/speak` — sanitize a reply and return synthesized audio.
//!
//! Each request allocates its own decoder state; nothing mutable is shared
//! across requests. A client that disconnects mid-stream drops the
//! upstream body with it.

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::chat::ChatClient;
use crate::config::{GatewayConfig, ResponseMode};
use crate::error::GatewayError;
use crate::message::{Message, Role};
use crate::persona;
use crate::sanitize::Sanitizer;
use crate::speech::{SpeechClient, SpeechOutcome};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `POST /api/chat`: the conversation history plus the new user
/// message, roles restricted to user/assistant on the client side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Ordered conversation messages.
    pub messages: Vec<Message>,
}

/// Successful `POST /api/chat` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Reply content parts (always a single text part today).
    pub content: Vec<ContentPart>,
}

/// One typed part of a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    /// Part discriminator, `"text"`.
    #[serde(rename = "type")]
    pub part_type: String,
    /// The reply text.
    pub text: String,
}

impl ContentPart {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            part_type: "text".to_owned(),
            text: text.into(),
        }
    }
}

/// Body of `POST /api/speak`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakRequest {
    /// The reply text to sanitize and synthesize.
    pub text: String,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
#[derive(Clone)]
struct AppState {
    chat: Arc<ChatClient>,
    speech: Arc<SpeechClient>,
}

// ---------------------------------------------------------------------------
// GatewayServer
// ---------------------------------------------------------------------------

/// The widget-facing HTTP server.
///
/// Binds `{host}:{port}` (port 0 for auto-assign) and serves in a
/// background task until dropped or shut down.
pub struct GatewayServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl GatewayServer {
    /// Build the clients from `config` and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the sanitizer config is invalid or the TCP
    /// listener cannot bind.
    pub async fn start(config: GatewayConfig) -> crate::error::Result<Self> {
        let sanitizer = Sanitizer::new(&config.sanitizer)?;
        let prompt = persona::system_prompt(&config.persona);
        let state = AppState {
            chat: Arc::new(ChatClient::new(config.chat, prompt)),
            speech: Arc::new(SpeechClient::new(config.speech, sanitizer)),
        };

        let app = router(state);

        let bind_addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| GatewayError::Config(format!("gateway bind failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Config(format!("failed to get local addr: {e}")))?;

        info!("gateway listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("gateway server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// The address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for GatewayServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/chat",
            post(handle_chat).fallback(handle_method_not_allowed),
        )
        .route(
            "/api/speak",
            post(handle_speak).fallback(handle_method_not_allowed),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// Any method other than POST, on either route, independent of payload.
async fn handle_method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

/// `POST /api/chat` — forward the conversation upstream.
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    // The persona is injected by the chat client; anything system-role the
    // widget sent is discarded rather than forwarded.
    let history: Vec<Message> = request
        .messages
        .into_iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .collect();

    match state.chat.mode() {
        ResponseMode::Buffered => match state.chat.reply(&history).await {
            Ok(text) => Json(ChatResponse {
                content: vec![ContentPart::text(text)],
            })
            .into_response(),
            Err(e) => error_response(e),
        },
        ResponseMode::Streaming => match state.chat.stream(&history).await {
            Ok(reply) => stream_response(reply),
            Err(e) => error_response(e),
        },
    }
}

/// Re-emit decoded reply fragments to the widget as server-sent events, in
/// the same `data:` chunk shape the widget's decoder already understands.
fn stream_response(mut reply: crate::sse::ReplyStream) -> Response {
    let sse_stream = async_stream::stream! {
        loop {
            match reply.next().await {
                Ok(Some(fragment)) => {
                    let chunk = json!({
                        "choices": [{ "delta": { "content": fragment } }]
                    });
                    yield Ok::<_, std::convert::Infallible>(
                        Event::default().data(chunk.to_string()),
                    );
                }
                Ok(None) => {
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
                Err(e) => {
                    let err = json!({ "error": e.to_string() });
                    yield Ok(Event::default().data(err.to_string()));
                    break;
                }
            }
        }
    };
    Sse::new(sse_stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// `POST /api/speak` — sanitize and synthesize.
async fn handle_speak(
    State(state): State<AppState>,
    Json(request): Json<SpeakRequest>,
) -> Response {
    match state.speech.synthesize(&request.text).await {
        Ok(SpeechOutcome::NoContent) => {
            Json(json!({ "message": "No speech content" })).into_response()
        }
        Ok(SpeechOutcome::Audio {
            content_type,
            bytes,
        }) => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        Err(e) => error_response(e),
    }
}

/// Map a gateway error to the widget-facing taxonomy: upstream failures
/// keep the provider's status code and body; everything else is a 500 with
/// the error message. No retries.
fn error_response(err: GatewayError) -> Response {
    let (status, message) = match err {
        GatewayError::Upstream { status, body } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        ),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn chat_request_parses_widget_json() {
        let json = r#"{"messages":[{"role":"user","content":"hi"}]}"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
    }

    #[test]
    fn chat_response_shape() {
        let response = ChatResponse {
            content: vec![ContentPart::text("Still here.")],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "Still here.");
    }

    #[test]
    fn upstream_error_keeps_provider_status() {
        let response = error_response(GatewayError::Upstream {
            status: 429,
            body: "rate limited".into(),
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn transport_error_maps_to_500() {
        let response = error_response(GatewayError::Chat("connection refused".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_upstream_status_falls_back_to_bad_gateway() {
        let response = error_response(GatewayError::Upstream {
            status: 42,
            body: String::new(),
        });
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn method_not_allowed_is_405() {
        let response = handle_method_not_allowed().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
