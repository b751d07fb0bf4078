//! Session events broadcast by the state machine
//!
//! Mirrored to IPC subscribers so a UI can render state, transcript, answer,
//! and error without polling.

use serde::{Deserialize, Serialize};

use crate::session::SessionState;

/// Events emitted by the session machine as a turn progresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved between states
    StateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// A capture attempt produced a transcript
    TranscriptReady { text: String },

    /// The answer service replied
    AnswerReady { text: String },

    /// The current turn failed with a user-readable message
    TurnFailed { message: String },

    /// The mute flag flipped
    MuteChanged { muted: bool },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::StateChanged { from, to } => {
                write!(f, "STATE_CHANGED ({} -> {})", from, to)
            }
            SessionEvent::TranscriptReady { text } => {
                write!(f, "TRANSCRIPT_READY ({} chars)", text.len())
            }
            SessionEvent::AnswerReady { text } => {
                write!(f, "ANSWER_READY ({} chars)", text.len())
            }
            SessionEvent::TurnFailed { message } => write!(f, "TURN_FAILED ({})", message),
            SessionEvent::MuteChanged { muted } => write!(f, "MUTE_CHANGED ({})", muted),
        }
    }
}
