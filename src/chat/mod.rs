//! Answer service protocol and clients
//!
//! `POST /api/chat` is the contract between the daemon and whatever produces
//! answers. The daemon side lives in [`client`]; the service side, a
//! pass-through to an OpenAI-compatible completion API, lives in [`gateway`]
//! and is served by the `voicebot-gateway` binary.

mod client;
pub mod gateway;

pub use client::{AnswerBackend, AnswerRequester};

use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`. The message is required and must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Successful answer payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

/// Error payload for rejected or failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatError {
    pub error: String,
}
