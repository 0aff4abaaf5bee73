//! Persona system prompt assembly.
//!
//! Every chat request gets a fixed persona system message prepended before
//! it is forwarded upstream. The persona is invisible to the widget: it is
//! never stored in the conversation log and never returned as history.
//!
//! The prompt is assembled from two layers: brevity/output rules that apply
//! to every persona, and a character overlay loaded by name.

use serde::{Deserialize, Serialize};

/// Output rules prepended regardless of which persona is selected.
///
/// Replies are short because the widget renders a narrow terminal and the
/// reply may be spoken aloud.
pub const CORE_PROMPT: &str = "\
Respond in 1-3 short sentences. No emojis, no markdown, no lists.\n\
Do not narrate actions or print status banners; speak in plain sentences.";

/// The SPECTER character profile, compiled into the binary from
/// `personas/specter.md`.
pub const SPECTER_PERSONA: &str = include_str!("../personas/specter.md");

/// Fixed line a client shows when a request fails and the user must
/// resubmit by hand.
pub const FALLBACK_REPLY: &str = "Signal lost somewhere between us. Say that again.";

/// Persona selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Persona name; `"default"` means core rules only.
    pub name: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "specter".to_owned(),
        }
    }
}

/// Assemble the system prompt for the given persona.
///
/// `"default"` yields the core rules alone; unknown names fall back to the
/// SPECTER profile so a typo in config does not silently drop the persona.
pub fn system_prompt(config: &PersonaConfig) -> String {
    match config.name.as_str() {
        "default" => CORE_PROMPT.to_owned(),
        _ => format!("{CORE_PROMPT}\n\n{SPECTER_PERSONA}"),
    }
}
