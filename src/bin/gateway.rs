//! voicebot-gateway: HTTP answer gateway for the voicebot daemon
//!
//! Serves `POST /api/chat`, forwarding each question to an OpenAI-compatible
//! completion API with a fixed persona system prompt.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voicebot_daemon::chat::gateway::{build_router, GatewayState};
use voicebot_daemon::config::GatewayConfig;
use voicebot_daemon::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "voicebot-gateway starting"
    );

    let config = GatewayConfig::load()?;
    if config.api_key.is_none() {
        warn!("no API key configured - the completion API may reject requests");
    }
    info!(
        listen_addr = %config.listen_addr,
        llm_url = %config.llm_url,
        model = %config.model,
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new();
    let listen_addr = config.listen_addr;
    let router = build_router(GatewayState::new(config));

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .context("failed to bind gateway listener")?;
    info!(%listen_addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let signal = shutdown.wait().await;
            info!(signal, "shutdown signal received");
        })
        .await
        .context("gateway server error")?;

    info!("voicebot-gateway stopped");

    Ok(())
}
