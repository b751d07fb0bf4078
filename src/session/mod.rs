//! Session domain types and the orchestrating state machine.
//!
//! One session-turn runs mic press -> capture -> answer request -> playback.
//! The machine in [`machine`] owns all mutable session state; everything else
//! communicates with it through [`SessionInput`] values.

mod machine;

pub use machine::{SessionMachine, SessionOptions};

use serde::{Deserialize, Serialize};

use crate::error::{TurnError, TurnResult};

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing in flight, ready for a mic press.
    Idle,
    /// A capture attempt is running.
    Listening,
    /// Waiting on the answer service.
    Requesting,
    /// The answer is being read aloud.
    Speaking,
    /// The last turn failed; the message is stored until the next turn.
    Failed,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Requesting => write!(f, "Requesting"),
            SessionState::Speaking => write!(f, "Speaking"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

/// Identity of one started operation.
///
/// The machine mints a fresh token each time capture, an answer request, or
/// playback starts. Completions echo the token back; a completion whose token
/// is no longer current is dropped without touching session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpToken(pub(crate) u64);

impl std::fmt::Display for OpToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal outcome of one playback attempt.
///
/// Cancellation is its own outcome so an intentional interruption never shows
/// up as an error.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// The utterance played to its natural end.
    Finished,
    /// The utterance was cut off on request.
    Canceled,
    /// The engine failed mid-utterance.
    Failed(TurnError),
}

/// Everything the session machine reacts to.
///
/// User actions arrive from the IPC server; the `*Done` variants are delivered
/// by the controllers and the request task, exactly once per started
/// operation.
#[derive(Debug)]
pub enum SessionInput {
    /// The user toggled the microphone.
    MicPressed,
    /// The user set the mute flag.
    SetMuted(bool),
    /// A capture attempt finished.
    CaptureDone {
        token: OpToken,
        outcome: TurnResult<String>,
    },
    /// The answer service resolved or failed.
    AnswerDone {
        token: OpToken,
        outcome: TurnResult<String>,
    },
    /// A playback attempt ended.
    PlaybackDone {
        token: OpToken,
        outcome: PlaybackOutcome,
    },
}
