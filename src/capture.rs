//! Speech capture control
//!
//! Bridges the session machine and the recognition engine. Each `start`
//! spawns a task that reduces the engine's event stream to a single
//! [`SessionInput::CaptureDone`] carrying the operation token. Canceling an
//! attempt discards its result entirely: the engine is asked to stop, and
//! whatever it still produces goes nowhere.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::engine::{CaptureEvent, SpeechToText};
use crate::error::{TurnError, TurnResult};
use crate::session::{OpToken, SessionInput};

pub struct SpeechCaptureController {
    engine: Option<Arc<dyn SpeechToText>>,
    input_tx: mpsc::Sender<SessionInput>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl SpeechCaptureController {
    pub fn new(engine: Option<Arc<dyn SpeechToText>>, input_tx: mpsc::Sender<SessionInput>) -> Self {
        Self {
            engine,
            input_tx,
            cancel_tx: None,
        }
    }

    /// Whether a recognition engine is present at all.
    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    /// Start one recognition attempt for `token`.
    ///
    /// Exactly one `CaptureDone` with this token reaches the session unless
    /// the attempt is canceled first.
    pub fn start(&mut self, token: OpToken) -> TurnResult<()> {
        let engine = self.engine.as_ref().ok_or(TurnError::Unsupported)?;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        engine
            .start(event_tx)
            .map_err(|e| TurnError::Capture(e.to_string()))?;

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        self.cancel_tx = Some(cancel_tx);

        let input_tx = self.input_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                outcome = collect_transcript(&mut event_rx) => {
                    debug!(%token, ok = outcome.is_ok(), "capture attempt finished");
                    let _ = input_tx.send(SessionInput::CaptureDone { token, outcome }).await;
                }
                _ = &mut cancel_rx => {
                    debug!(%token, "capture attempt canceled, result discarded");
                }
            }
        });

        Ok(())
    }

    /// Stop the engine and discard whatever the current attempt would have
    /// produced. No-op when nothing is running.
    pub fn cancel(&mut self) {
        let Some(cancel_tx) = self.cancel_tx.take() else {
            return;
        };
        let _ = cancel_tx.send(());
        if let Some(engine) = &self.engine {
            engine.stop();
        }
    }
}

/// Reduce one attempt's event stream to a single outcome.
///
/// An empty or whitespace-only transcript counts as no speech; a closed
/// channel counts as the end of the attempt.
async fn collect_transcript(
    events: &mut mpsc::UnboundedReceiver<CaptureEvent>,
) -> TurnResult<String> {
    let mut text = String::new();
    while let Some(event) = events.recv().await {
        match event {
            CaptureEvent::Result(t) => text = t,
            CaptureEvent::Error(reason) => return Err(TurnError::Capture(reason)),
            CaptureEvent::End => break,
        }
    }

    let text = text.trim();
    if text.is_empty() {
        Err(TurnError::NoSpeechDetected)
    } else {
        Ok(text.to_string())
    }
}
