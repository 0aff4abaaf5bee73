//! Gateway binary: serve `/api/chat` and `/api/speak` for the widget.
//!
//! Takes an optional config file path as its only argument, defaulting to
//! `~/.specter/config.toml`. Credentials come from the environment
//! (`OPENROUTER_API_KEY`, `ELEVENLABS_API_KEY`, `ELEVENLABS_VOICE_ID`).

use specter::GatewayServer;
use specter::config::{GatewayConfig, default_config_path};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = GatewayConfig::load(&path)?;

    let server = GatewayServer::start(config).await?;
    tracing::info!("specter gateway ready on http://{}", server.addr());

    tokio::signal::ctrl_c().await?;
    tracing::info!("specter gateway shutting down");
    server.shutdown();
    Ok(())
}
