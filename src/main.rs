//! voicebot-daemon: Background daemon for push-to-talk voice question answering
//!
//! The daemon owns one interactive voice session and provides:
//! - Speech capture and playback through pluggable engines
//! - Answer requests against the chat gateway
//! - IPC server for mic presses, mute toggles, and status queries

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use voicebot_daemon::capture::SpeechCaptureController;
use voicebot_daemon::chat::AnswerRequester;
use voicebot_daemon::config::{Config, EngineChoice};
use voicebot_daemon::engine::{
    PlaceholderRecognizer, PlaceholderSynthesizer, SpeechToText, TextToSpeech,
};
use voicebot_daemon::events::SessionEvent;
use voicebot_daemon::ipc::{DaemonStatus, Server};
use voicebot_daemon::lifecycle::ShutdownSignal;
use voicebot_daemon::playback::SpeechPlaybackController;
use voicebot_daemon::session::{SessionMachine, SessionOptions};

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
        "voicebot-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, chat_url = %config.chat_url, "configuration loaded");

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // IPC server and operation tasks -> session machine
    let (input_tx, input_rx) = mpsc::channel(32);
    // Session machine -> IPC server and subscribed clients
    let (event_tx, _event_rx) = broadcast::channel::<SessionEvent>(64);

    // Wire up the speech engines
    let stt: Option<Arc<dyn SpeechToText>> = match config.stt_engine {
        EngineChoice::Placeholder => Some(Arc::new(PlaceholderRecognizer::new())),
        EngineChoice::Off => None,
    };
    let tts: Option<Arc<dyn TextToSpeech>> = match config.tts_engine {
        EngineChoice::Placeholder => Some(Arc::new(PlaceholderSynthesizer::new())),
        EngineChoice::Off => None,
    };
    if stt.is_none() {
        warn!("speech recognition is off - every mic press will fail");
    }
    if tts.is_none() {
        warn!("speech synthesis is off - answers will not be read aloud");
    }

    let capture = SpeechCaptureController::new(stt, input_tx.clone());
    let playback = SpeechPlaybackController::new(tts, input_tx.clone());
    let answers = Arc::new(AnswerRequester::new(&config.chat_url));

    let status = DaemonStatus {
        muted: config.start_muted,
        capture_available: capture.is_available(),
        playback_available: playback.is_available(),
        ..DaemonStatus::default()
    };

    let options = SessionOptions {
        start_muted: config.start_muted,
        request_timeout: config.request_timeout,
    };

    // Create the session machine
    let mut session = SessionMachine::new(
        capture,
        playback,
        answers,
        options,
        input_tx.clone(),
        event_tx.clone(),
    );

    // Create IPC server
    let server = Server::new(
        &config.socket_path,
        input_tx.clone(),
        event_tx.clone(),
        status,
    )?;

    // Mirror session events into the IPC status snapshot
    let mut ipc_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the session machine (processes inputs)
        _ = session.run(input_rx) => {
            info!("session machine exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Handle session events for IPC synchronization
        _ = async {
            loop {
                match ipc_event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "session event");
                        server_for_events.apply_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("session event handler exited");
        }

        // Wait for shutdown signal
        signal = shutdown.wait() => {
            info!(signal, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;

    info!("voicebot-daemon stopped");

    Ok(())
}
