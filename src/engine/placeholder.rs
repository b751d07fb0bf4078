//! Canned engines for hosts without a real speech stack
//!
//! The recognizer "hears" a fixed phrase after a short delay; the synthesizer
//! "plays" text for a duration proportional to its length. Both honor stop
//! requests, which makes them good enough for demos and integration tests.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::{CaptureEvent, EngineError, SpeakEvent, SpeechToText, TextToSpeech};

const DEFAULT_TRANSCRIPT: &str = "Tell me about yourself.";
const DEFAULT_CAPTURE_DELAY: Duration = Duration::from_millis(400);
const DEFAULT_MILLIS_PER_CHAR: u64 = 30;

/// Recognizer that reports a fixed transcript after a delay.
pub struct PlaceholderRecognizer {
    transcript: String,
    delay: Duration,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl PlaceholderRecognizer {
    pub fn new() -> Self {
        Self::with_transcript(DEFAULT_TRANSCRIPT)
    }

    pub fn with_transcript(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            delay: DEFAULT_CAPTURE_DELAY,
            stop_tx: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for PlaceholderRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechToText for PlaceholderRecognizer {
    fn start(&self, events: mpsc::UnboundedSender<CaptureEvent>) -> Result<(), EngineError> {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        *self.stop_tx.lock().unwrap() = Some(stop_tx);

        let transcript = self.transcript.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(CaptureEvent::Result(transcript));
                    let _ = events.send(CaptureEvent::End);
                }
                _ = &mut stop_rx => {
                    debug!("placeholder recognizer stopped early");
                    let _ = events.send(CaptureEvent::End);
                }
            }
        });

        Ok(())
    }

    fn stop(&self) {
        if let Some(stop) = self.stop_tx.lock().unwrap().take() {
            let _ = stop.send(());
        }
    }
}

/// Synthesizer that pretends to play text at a fixed rate.
pub struct PlaceholderSynthesizer {
    millis_per_char: u64,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl PlaceholderSynthesizer {
    pub fn new() -> Self {
        Self::with_rate(Duration::from_millis(DEFAULT_MILLIS_PER_CHAR))
    }

    pub fn with_rate(per_char: Duration) -> Self {
        Self {
            millis_per_char: per_char.as_millis() as u64,
            stop_tx: Mutex::new(None),
        }
    }
}

impl Default for PlaceholderSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextToSpeech for PlaceholderSynthesizer {
    fn speak(
        &self,
        text: &str,
        events: mpsc::UnboundedSender<SpeakEvent>,
    ) -> Result<(), EngineError> {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        *self.stop_tx.lock().unwrap() = Some(stop_tx);

        let chars = text.chars().count().max(1) as u64;
        let duration = Duration::from_millis(chars * self.millis_per_char);
        tokio::spawn(async move {
            let _ = events.send(SpeakEvent::Started);
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    let _ = events.send(SpeakEvent::End);
                }
                _ = &mut stop_rx => {
                    debug!("placeholder synthesizer stopped early");
                    let _ = events.send(SpeakEvent::End);
                }
            }
        });

        Ok(())
    }

    fn cancel(&self) {
        if let Some(stop) = self.stop_tx.lock().unwrap().take() {
            let _ = stop.send(());
        }
    }
}
