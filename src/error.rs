//! Error types for the specter gateway.

/// Top-level error type for the chat/speech gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Chat completion request or response error.
    #[error("chat error: {0}")]
    Chat(String),

    /// Speech synthesis request or response error.
    #[error("speech error: {0}")]
    Speech(String),

    /// Read failure on a streamed response body.
    #[error("stream error: {0}")]
    Stream(String),

    /// A reply stream was polled again after it closed or errored.
    #[error("stream already closed")]
    StreamClosed,

    /// Non-success status from an upstream provider, passed through
    /// with the provider's own status code and body text.
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream {
        /// The provider's HTTP status code.
        status: u16,
        /// The provider's response body text.
        body: String,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, GatewayError>;
