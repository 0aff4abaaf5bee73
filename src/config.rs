//! Configuration types for the gateway.
//!
//! Everything here is non-secret and may live in a TOML file. Credentials
//! (chat API key, speech API key, voice identifier) are read from the
//! process environment at call time and never written to the config file;
//! absence is not validated locally and surfaces as an upstream
//! authentication failure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::persona::PersonaConfig;
use crate::sanitize::SanitizerConfig;

/// Top-level configuration for the gateway and its upstream clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Chat completion upstream settings.
    pub chat: ChatConfig,
    /// Speech synthesis upstream settings.
    pub speech: SpeechConfig,
    /// Reply sanitization settings.
    pub sanitizer: SanitizerConfig,
    /// Persona selection.
    pub persona: PersonaConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port (0 = auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8787,
        }
    }
}

/// Which response-producing strategy the chat proxy uses upstream.
///
/// The two paths are mutually exclusive per request; this flag selects one
/// for the whole process, it is never negotiated per call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// One buffered JSON response per request.
    #[default]
    Buffered,
    /// `stream: true` upstream, decoded incrementally as server-sent events.
    Streaming,
}

/// Chat completion upstream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Provider base URL (an OpenAI-compatible API, e.g. OpenRouter).
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Bounded reply length. Replies are spoken, so this stays small.
    pub max_tokens: u32,
    /// Sampling temperature. High, to keep the persona lively.
    pub temperature: f64,
    /// `HTTP-Referer` attribution header required by OpenRouter.
    pub referer: String,
    /// `X-Title` attribution header.
    pub title: String,
    /// Buffered or streaming upstream strategy.
    pub mode: ResponseMode,
    /// Environment variable holding the API key, read at call time.
    pub api_key_env: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api".to_owned(),
            model: "anthropic/claude-3.7-sonnet".to_owned(),
            max_tokens: 100,
            temperature: 0.9,
            referer: "https://specter.sh".to_owned(),
            title: "Specter".to_owned(),
            mode: ResponseMode::Buffered,
            api_key_env: "OPENROUTER_API_KEY".to_owned(),
        }
    }
}

/// Fixed voice-quality parameters sent with every synthesis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Voice stability (0.0–1.0).
    pub stability: f64,
    /// Similarity boost (0.0–1.0).
    pub similarity_boost: f64,
    /// Style exaggeration (0.0–1.0).
    pub style: f64,
    /// Whether to enable speaker boost.
    pub use_speaker_boost: bool,
    /// Playback speed multiplier. Slightly slow, for the haunted delivery.
    pub speed: f64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.7,
            similarity_boost: 0.75,
            style: 0.2,
            use_speaker_boost: true,
            speed: 0.8,
        }
    }
}

/// Speech synthesis upstream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Provider base URL (an ElevenLabs-compatible API).
    pub base_url: String,
    /// Synthesis model identifier.
    pub model_id: String,
    /// Voice-quality parameters.
    pub voice_settings: VoiceSettings,
    /// Environment variable holding the API key, read at call time.
    pub api_key_env: String,
    /// Environment variable holding the voice identifier, read at call time.
    pub voice_id_env: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_owned(),
            model_id: "eleven_turbo_v2_5".to_owned(),
            voice_settings: VoiceSettings::default(),
            api_key_env: "ELEVENLABS_API_KEY".to_owned(),
            voice_id_env: "ELEVENLABS_VOICE_ID".to_owned(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults; a present but unparsable file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| GatewayError::Config(format!("serialize config: {e}")))?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

/// Default config file location, `~/.specter/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".specter")
        .join("config.toml")
}
