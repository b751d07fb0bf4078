//! Failure taxonomy for a session turn.

use thiserror::Error;

/// Result type alias for turn operations
pub type TurnResult<T> = Result<T, TurnError>;

/// Everything that can go wrong between a mic press and the spoken answer.
///
/// Each variant's message is what the status surface shows the user, so they
/// stay short and free of internal jargon. All of these are recovered at the
/// session machine: the turn ends in `Failed` and the next mic press starts
/// fresh.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurnError {
    /// The host has no speech engine for the requested direction.
    #[error("speech is not supported on this system")]
    Unsupported,

    /// Capture ended without recognizing anything.
    #[error("no speech detected")]
    NoSpeechDetected,

    /// The recognition engine reported a failure.
    #[error("speech capture failed: {0}")]
    Capture(String),

    /// Rejected locally before any network call.
    #[error("cannot request an answer for empty input")]
    EmptyInput,

    /// The answer service was unreachable, errored, or replied with garbage.
    #[error("answer request failed: {0}")]
    Request(String),

    /// The synthesis engine reported a failure.
    #[error("speech playback failed: {0}")]
    Playback(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TurnError::NoSpeechDetected.to_string(),
            "no speech detected"
        );
        assert_eq!(
            TurnError::Request("timeout".to_string()).to_string(),
            "answer request failed: timeout"
        );
        assert_eq!(
            TurnError::Capture("microphone busy".to_string()).to_string(),
            "speech capture failed: microphone busy"
        );
    }
}
