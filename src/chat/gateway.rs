//! Answer gateway: `POST /api/chat` as an axum service
//!
//! A stateless pass-through: validate the message, forward it with a fixed
//! persona system prompt to an OpenAI-compatible completion API, and map
//! upstream failures to a 500 with the reason in the body. No history, no
//! auth, no rate limiting.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::GatewayConfig;

use super::{ChatError, ChatReply, ChatRequest};

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    client: reqwest::Client,
    config: Arc<GatewayConfig>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }
}

/// Build the gateway router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .with_state(state)
}

// OpenAI-compatible completion types, private to the gateway.
#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<CompletionMessage>,
}

#[derive(Serialize)]
struct CompletionMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionReplyMessage,
}

#[derive(Deserialize)]
struct CompletionReplyMessage {
    content: String,
}

async fn chat(State(state): State<GatewayState>, Json(req): Json<ChatRequest>) -> Response {
    let message = match req.message.as_deref().map(str::trim) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ChatError {
                    error: "Message is required".to_string(),
                }),
            )
                .into_response();
        }
    };

    debug!(chars = message.len(), "forwarding chat message upstream");
    match complete(&state, &message).await {
        Ok(response) => (StatusCode::OK, Json(ChatReply { response })).into_response(),
        Err(reason) => {
            error!(%reason, "upstream completion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatError { error: reason }),
            )
                .into_response()
        }
    }
}

/// Run one completion round-trip against the configured upstream.
async fn complete(state: &GatewayState, message: &str) -> Result<String, String> {
    let config = &state.config;
    let url = format!("{}/chat/completions", config.llm_url.trim_end_matches('/'));
    let body = CompletionRequest {
        model: config.model.clone(),
        messages: vec![
            CompletionMessage {
                role: "system".to_string(),
                content: config.persona.clone(),
            },
            CompletionMessage {
                role: "user".to_string(),
                content: message.to_string(),
            },
        ],
    };

    let mut request = state.client.post(&url).json(&body);
    if let Some(key) = &config.api_key {
        request = request.header("Authorization", format!("Bearer {}", key));
    }

    let res = request
        .send()
        .await
        .map_err(|e| format!("completion request failed: {}", e))?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(format!("completion API error {}: {}", status, body));
    }

    let parsed: CompletionResponse = res
        .json()
        .await
        .map_err(|e| format!("completion response parse failed: {}", e))?;

    parsed
        .choices
        .first()
        .map(|c| c.message.content.trim().to_string())
        .ok_or_else(|| "completion response contained no choices".to_string())
}
