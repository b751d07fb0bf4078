//! Platform speech engine boundary
//!
//! The daemon never talks to an audio stack directly. Recognition and
//! synthesis hide behind these two traits; an engine reports progress by
//! pushing events into the channel it was handed at start. The placeholder
//! implementations let the daemon run end to end on hosts without a real
//! speech stack.

mod placeholder;

pub use placeholder::{PlaceholderRecognizer, PlaceholderSynthesizer};

use thiserror::Error;
use tokio::sync::mpsc;

/// Failure reported by an engine when asked to start an attempt.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Events one recognition attempt reports.
///
/// A started attempt eventually sends exactly one of `Result`/`Error`, then
/// `End`. Dropping the sender counts as `End`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Final recognized text for this attempt.
    Result(String),
    /// The attempt failed inside the engine.
    Error(String),
    /// The attempt is over; nothing further will arrive.
    End,
}

/// Events one synthesis attempt reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakEvent {
    /// Audio output began.
    Started,
    /// The utterance reached its natural end.
    End,
    /// The engine failed mid-utterance.
    Error(String),
}

/// Speech recognition engine. One attempt at a time.
pub trait SpeechToText: Send + Sync {
    /// Begin a single recognition attempt, reporting through `events`.
    fn start(&self, events: mpsc::UnboundedSender<CaptureEvent>) -> Result<(), EngineError>;

    /// Ask the current attempt to stop. Best effort: late events may still
    /// arrive and are the caller's problem to ignore. Safe to call when idle.
    fn stop(&self);
}

/// Speech synthesis engine. At most one audible utterance at a time.
pub trait TextToSpeech: Send + Sync {
    /// Begin speaking `text`, reporting through `events`.
    fn speak(&self, text: &str, events: mpsc::UnboundedSender<SpeakEvent>)
        -> Result<(), EngineError>;

    /// Cut off the current utterance. Best effort, safe to call when idle.
    fn cancel(&self);
}
