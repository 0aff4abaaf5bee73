//! Specter: voice-enabled chat gateway for a terminal-styled web widget.
//!
//! The widget shows a scrolling conversation with a "haunted terminal"
//! persona. This crate is everything behind it:
//!
//! Widget → gateway (`/api/chat`) → chat upstream (OpenRouter)
//!        → gateway (`/api/speak`) → sanitizer → speech upstream (ElevenLabs)
//!
//! The two load-bearing pieces are the [`sse`] decoder, which turns a
//! streamed completion body into reply fragments no matter how the
//! transport chunks it, and the [`sanitize`] pipeline, which keeps leaked
//! stage directions and status banners out of the synthesized speech.

pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod message;
pub mod persona;
pub mod sanitize;
pub mod speech;
pub mod sse;

pub use chat::ChatClient;
pub use config::{GatewayConfig, ResponseMode};
pub use error::{GatewayError, Result};
pub use gateway::GatewayServer;
pub use history::ConversationStore;
pub use message::{Message, Role};
pub use sanitize::Sanitizer;
pub use speech::{SpeechClient, SpeechOutcome};
pub use sse::{DeltaDecoder, ReplyStream};
