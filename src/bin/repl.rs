//! Terminal REPL client: the conversation loop without the widget.
//!
//! Reads lines from stdin, keeps the displayed log in a
//! [`ConversationStore`], forwards the derived history to the chat
//! upstream, and prints the reply. With `SPECTER_SPEAK=1` each reply is
//! also sanitized and synthesized, and the audio saved next to the cwd as
//! `reply-<n>.mp3`.
//!
//! On a failed request the fixed fallback line is shown and appended, and
//! input stays open for a manual retry.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use specter::config::{GatewayConfig, default_config_path};
use specter::persona::{self, FALLBACK_REPLY};
use specter::speech::SpeechOutcome;
use specter::{ChatClient, ConversationStore, Message, Role, Sanitizer, SpeechClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = GatewayConfig::load(&path)?;

    let prompt = persona::system_prompt(&config.persona);
    let chat = ChatClient::new(config.chat, prompt);
    let speak = std::env::var("SPECTER_SPEAK").is_ok_and(|v| v == "1");
    let speech = SpeechClient::new(config.speech, Sanitizer::new(&config.sanitizer)?);

    let mut store = ConversationStore::new();
    let mut replies = 0u32;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"connected. type to talk, ctrl-d to leave.\n> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }

        store.push(Message::stamped(Role::User, input));

        // One request in flight at a time: we block on the reply before
        // prompting again, so submissions never overlap.
        let reply = match chat.reply(&store.history()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                FALLBACK_REPLY.to_owned()
            }
        };
        store.push(Message::stamped(Role::Assistant, reply.as_str()));
        stdout.write_all(format!("{reply}\n").as_bytes()).await?;

        if speak {
            match speech.synthesize(&reply).await {
                Ok(SpeechOutcome::Audio { bytes, .. }) => {
                    replies += 1;
                    let file = format!("reply-{replies}.mp3");
                    tokio::fs::write(&file, &bytes).await?;
                    stdout
                        .write_all(format!("[audio saved to {file}]\n").as_bytes())
                        .await?;
                }
                Ok(SpeechOutcome::NoContent) => {
                    stdout.write_all(b"[nothing speakable]\n").await?;
                }
                Err(e) => tracing::warn!(error = %e, "speech request failed"),
            }
        }

        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
