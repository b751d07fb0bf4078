//! voicebot: push-to-talk voice question answering
//!
//! The daemon owns a single interactive session:
//! - Speech capture through a pluggable recognition engine
//! - Answer requests against a chat HTTP endpoint
//! - Speech playback of the answer, with a mute flag
//! - IPC server for UI status queries and session notifications
//!
//! The gateway binary serves the chat endpoint the daemon talks to,
//! forwarding questions to an OpenAI-compatible completion API.

pub mod capture;
pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ipc;
pub mod lifecycle;
pub mod playback;
pub mod session;
