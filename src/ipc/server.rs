//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! session events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::SessionEvent;
use crate::session::{SessionInput, SessionState};

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Channel for handing user intents to the session machine
    input_tx: mpsc::Sender<SessionInput>,
    /// Channel subscribed clients receive session events from
    event_tx: broadcast::Sender<SessionEvent>,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        input_tx: mpsc::Sender<SessionInput>,
        event_tx: broadcast::Sender<SessionEvent>,
        status: DaemonStatus,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status,
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            input_tx,
            event_tx,
        })
    }

    /// Fold a session event into the status snapshot served to clients
    pub async fn apply_event(&self, event: &SessionEvent) {
        let mut state = self.state.write().await;
        match event {
            SessionEvent::StateChanged { to, .. } => {
                state.status.state = *to;
                // Listening opens a new turn; the old turn's data is gone.
                if *to == SessionState::Listening {
                    state.status.transcript.clear();
                    state.status.answer.clear();
                    state.status.error = None;
                }
            }
            SessionEvent::TranscriptReady { text } => state.status.transcript = text.clone(),
            SessionEvent::AnswerReady { text } => state.status.answer = text.clone(),
            SessionEvent::TurnFailed { message } => state.status.error = Some(message.clone()),
            SessionEvent::MuteChanged { muted } => state.status.muted = *muted,
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let input_tx = self.input_tx.clone();
                    let event_tx = self.event_tx.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, input_tx, event_tx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        input_tx: mpsc::Sender<SessionInput>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Result<()> {
        let (mut reader, writer) = stream.into_split();

        // All frames leave through one task, so responses and notifications
        // cannot interleave mid-frame.
        let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(64);
        tokio::spawn(Self::write_frames(writer, out_rx));

        let mut len_buf = [0u8; 4];
        let mut is_subscribed = false;

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > 1024 * 1024 {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            // Parse request
            let request: Request =
                serde_json::from_slice(&msg_buf).context("failed to parse request")?;

            debug!(?request, "received request");

            // Process request
            let (response, subscribe) = Self::process_request(request, &state, &input_tx).await;
            if subscribe && !is_subscribed {
                is_subscribed = true;
                debug!("client subscribed to notifications");
                Self::spawn_notifier(event_tx.subscribe(), out_tx.clone());
            }

            // Send response
            if out_tx.send(Self::encode_frame(&response)?).await.is_err() {
                return Ok(());
            }
        }
    }

    /// Write queued frames to the client, in order
    async fn write_frames(mut writer: OwnedWriteHalf, mut out_rx: mpsc::Receiver<Vec<u8>>) {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = writer.write_all(&frame).await {
                debug!(?e, "client write failed");
                return;
            }
        }
    }

    /// Forward session events to one subscribed client
    fn spawn_notifier(
        mut event_rx: broadcast::Receiver<SessionEvent>,
        out_tx: mpsc::Sender<Vec<u8>>,
    ) {
        tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        let notification = Notification::SessionEvent { event };
                        let frame = match Self::encode_frame(&notification) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(?e, "failed to encode notification");
                                continue;
                            }
                        };
                        if out_tx.send(frame).await.is_err() {
                            debug!("subscribed client gone");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "notification subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Encode a length-prefixed JSON message
    fn encode_frame<T: serde::Serialize>(msg: &T) -> Result<Vec<u8>> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let mut frame = Vec::with_capacity(4 + msg_bytes.len());
        frame.extend_from_slice(&(msg_bytes.len() as u32).to_le_bytes());
        frame.extend_from_slice(&msg_bytes);
        Ok(frame)
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        input_tx: &mpsc::Sender<SessionInput>,
    ) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                (Response::Status(state.status.clone()), false)
            }

            Request::PressMic => (
                Self::forward(input_tx, SessionInput::MicPressed).await,
                false,
            ),

            Request::SetMuted { muted } => (
                Self::forward(input_tx, SessionInput::SetMuted(muted)).await,
                false,
            ),

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Hand a user intent to the session machine
    async fn forward(input_tx: &mpsc::Sender<SessionInput>, input: SessionInput) -> Response {
        match input_tx.send(input).await {
            Ok(()) => Response::Accepted,
            Err(_) => Response::Error {
                code: "unavailable".to_string(),
                message: "session machine is not running".to_string(),
            },
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}
