//! Daemon-side answer client
//!
//! One attempt per call, no retry, no client-side timeout: the session
//! machine imposes its own deadline and discards late resolutions through the
//! token mechanism, so a hanging request here is harmless.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{TurnError, TurnResult};

use super::{ChatError, ChatReply, ChatRequest};

/// Where answer text comes from. The production implementation is
/// [`AnswerRequester`]; tests substitute scripted backends.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    async fn request(&self, text: &str) -> TurnResult<String>;
}

/// HTTP client for the answer service's `POST /api/chat`.
pub struct AnswerRequester {
    client: reqwest::Client,
    endpoint: String,
}

impl AnswerRequester {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl AnswerBackend for AnswerRequester {
    /// Request an answer for `text`.
    ///
    /// Empty input is rejected locally, before any network traffic. Network
    /// failures, error statuses, and malformed bodies all come back as
    /// [`TurnError::Request`]; when an error status carries an
    /// `{"error": ...}` body, its message is the reason.
    async fn request(&self, text: &str) -> TurnResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyInput);
        }

        debug!(chars = text.len(), "requesting answer");
        let body = ChatRequest {
            message: Some(text.to_string()),
        };
        let res = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| TurnError::Request(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let reason = match res.json::<ChatError>().await {
                Ok(err) => err.error,
                Err(_) => format!("HTTP {}", status),
            };
            return Err(TurnError::Request(reason));
        }

        let reply: ChatReply = res
            .json()
            .await
            .map_err(|e| TurnError::Request(format!("malformed response: {}", e)))?;
        Ok(reply.response)
    }
}
