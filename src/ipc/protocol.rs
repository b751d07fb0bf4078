//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::SessionEvent;
use crate::session::SessionState;

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Press the microphone button
    PressMic,

    /// Set the mute flag
    SetMuted { muted: bool },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to session event notifications
    Subscribe,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// The request was handed to the session machine
    Accepted,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A session event occurred
    SessionEvent { event: SessionEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current session state
    pub state: SessionState,

    /// Whether playback is muted
    pub muted: bool,

    /// Transcript of the current turn
    pub transcript: String,

    /// Answer of the current turn
    pub answer: String,

    /// Message of the last failure, if any
    pub error: Option<String>,

    /// Whether a speech recognition engine is wired up
    pub capture_available: bool,

    /// Whether a speech synthesis engine is wired up
    pub playback_available: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: SessionState::default(),
            muted: false,
            transcript: String::new(),
            answer: String::new(),
            error: None,
            capture_available: false,
            playback_available: false,
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::SetMuted { muted: true };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("set_muted"));
        assert!(json.contains("true"));

        let req = Request::PressMic;
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"type":"press_mic"}"#);
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("idle"));
    }

    #[test]
    fn test_notification_serialization() {
        let notification = Notification::SessionEvent {
            event: SessionEvent::StateChanged {
                from: SessionState::Idle,
                to: SessionState::Listening,
            },
        };
        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains(r#""type":"session_event""#));
        assert!(json.contains(r#""type":"state_changed""#));
        assert!(json.contains(r#""to":"listening""#));
    }
}
