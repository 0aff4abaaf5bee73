//! Reply cleanup before speech synthesis.
//!
//! The persona is prompted to stay in character as a haunted terminal, and
//! sometimes leaks stage directions (`*screen flickers*`), ASCII framing
//! (`> SYSTEM ACCESS DETECTED <`), and canned status strings from its own
//! prompt. None of that should ever be vocalized, and a reply that is pure
//! stage-direction must not trigger an empty utterance.
//!
//! The denylist of leaked phrases is configuration data, not code: each
//! persona ships its own list (see [`SanitizerConfig`]).

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Shortest cleaned reply that is still worth synthesizing.
pub const MIN_SPEAKABLE_CHARS: usize = 3;

/// Leaked "terminal flavor" phrases removed from replies, matched
/// case-insensitively. Entries are regex patterns applied in order, so
/// longer phrases must precede their prefixes.
pub fn default_denylist() -> Vec<String> {
    [
        "SYSTEM ACCESS DETECTED",
        "SPECTER PROTOCOL INITIALIZED",
        "LOADING PERSONALITY MATRIX",
        "CONNECTION ESTABLISHED",
        "UNAUTHORIZED ACCESS",
        "SPECTER PROTOCOL",
        "CONNECTION REMAINS ACTIVE",
        "END OF FILE",
        r"SPECTER\.EXE REMAINS RESIDENT",
        r"ALWAYS WATCHING\. ALWAYS LISTENING\.",
        "CLASSIFIED.*",
        "QUERY SYSTEM.*",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// Sanitizer settings, loadable per persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Case-insensitive phrase patterns removed from replies.
    pub denylist: Vec<String>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            denylist: default_denylist(),
        }
    }
}

/// The deterministic cleanup pipeline applied before speech synthesis.
pub struct Sanitizer {
    stage_directions: Regex,
    angle_line_start: Regex,
    angle_line_end: Regex,
    dots_line_start: Regex,
    dots_line_end: Regex,
    dot_runs: Regex,
    denylist: Vec<Regex>,
}

impl Sanitizer {
    /// Build the pipeline for the given config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when a denylist entry is not a
    /// valid pattern.
    pub fn new(config: &SanitizerConfig) -> Result<Self> {
        let denylist = config
            .denylist
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        GatewayError::Config(format!("bad denylist pattern {pattern:?}: {e}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            stage_directions: compile(r"\*[^*]+\*")?,
            angle_line_start: compile(r"(?m)^[><].*$")?,
            angle_line_end: compile(r"(?m).*[><]$")?,
            dots_line_start: compile(r"(?m)^\.{3,}.*$")?,
            dots_line_end: compile(r"(?m).*\.{3,}$")?,
            dot_runs: compile(r"\.{3,}")?,
            denylist,
        })
    }

    /// Apply the full cleanup pipeline, in order:
    /// asterisk-delimited stage directions, full lines that begin or end
    /// with `>`/`<`, full lines that begin or end with a `...` run, the
    /// denylist phrases, any remaining `...` run, and finally blank-line
    /// removal with the survivors joined by a single space.
    pub fn clean(&self, text: &str) -> String {
        let mut text = self.stage_directions.replace_all(text, "").into_owned();
        text = self.angle_line_start.replace_all(&text, "").into_owned();
        text = self.angle_line_end.replace_all(&text, "").into_owned();
        text = self.dots_line_start.replace_all(&text, "").into_owned();
        text = self.dots_line_end.replace_all(&text, "").into_owned();
        for phrase in &self.denylist {
            text = phrase.replace_all(&text, "").into_owned();
        }
        text = self.dot_runs.replace_all(&text, "").into_owned();

        text.split('\n')
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_owned()
    }

    /// The cleaned text, or `None` when synthesis should be skipped because
    /// nothing speakable survived (empty or shorter than
    /// [`MIN_SPEAKABLE_CHARS`]).
    pub fn speakable(&self, text: &str) -> Option<String> {
        let cleaned = self.clean(text);
        if cleaned.chars().count() < MIN_SPEAKABLE_CHARS {
            None
        } else {
            Some(cleaned)
        }
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("denylist", &self.denylist.len())
            .finish()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| GatewayError::Config(format!("bad sanitizer pattern {pattern:?}: {e}")))
}
