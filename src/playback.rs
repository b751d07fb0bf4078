//! Speech playback control
//!
//! Same shape as capture control, with one difference: a canceled playback
//! still reports a completion, as [`PlaybackOutcome::Canceled`], so the
//! session can tell an intentional interruption from an engine failure.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::engine::{SpeakEvent, TextToSpeech};
use crate::error::{TurnError, TurnResult};
use crate::session::{OpToken, PlaybackOutcome, SessionInput};

pub struct SpeechPlaybackController {
    engine: Option<Arc<dyn TextToSpeech>>,
    input_tx: mpsc::Sender<SessionInput>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl SpeechPlaybackController {
    pub fn new(engine: Option<Arc<dyn TextToSpeech>>, input_tx: mpsc::Sender<SessionInput>) -> Self {
        Self {
            engine,
            input_tx,
            cancel_tx: None,
        }
    }

    /// Whether a synthesis engine is present at all.
    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    /// Start speaking `text` for `token`. Exactly one `PlaybackDone` with
    /// this token reaches the session.
    pub fn speak(&mut self, token: OpToken, text: &str) -> TurnResult<()> {
        let engine = self.engine.as_ref().ok_or(TurnError::Unsupported)?;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        engine
            .speak(text, event_tx)
            .map_err(|e| TurnError::Playback(e.to_string()))?;

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        self.cancel_tx = Some(cancel_tx);

        let input_tx = self.input_tx.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = watch_utterance(&mut event_rx) => outcome,
                _ = &mut cancel_rx => {
                    debug!(%token, "playback canceled");
                    PlaybackOutcome::Canceled
                }
            };
            let _ = input_tx
                .send(SessionInput::PlaybackDone { token, outcome })
                .await;
        });

        Ok(())
    }

    /// Cut off the current utterance. No-op when nothing is playing.
    pub fn cancel(&mut self) {
        let Some(cancel_tx) = self.cancel_tx.take() else {
            return;
        };
        let _ = cancel_tx.send(());
        if let Some(engine) = &self.engine {
            engine.cancel();
        }
    }
}

/// Watch one utterance to its terminal event.
async fn watch_utterance(events: &mut mpsc::UnboundedReceiver<SpeakEvent>) -> PlaybackOutcome {
    while let Some(event) = events.recv().await {
        match event {
            SpeakEvent::Started => debug!("utterance started"),
            SpeakEvent::Error(reason) => {
                return PlaybackOutcome::Failed(TurnError::Playback(reason))
            }
            SpeakEvent::End => break,
        }
    }
    PlaybackOutcome::Finished
}
