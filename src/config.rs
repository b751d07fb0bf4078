//! Configuration loading and management

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Default timeout for answer requests, in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default system prompt the gateway puts in front of every question
const DEFAULT_PERSONA: &str = "You are a job candidate in a voice interview. \
    Answer questions about yourself in the first person, in two or three short \
    conversational sentences. Plain text only, since the answer is read aloud.";

/// Which speech engine to wire up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineChoice {
    /// Canned engine that needs no audio hardware
    Placeholder,
    /// No engine; the capability is reported as unsupported
    Off,
}

impl EngineChoice {
    fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("placeholder") => Ok(Self::Placeholder),
            Some("off") | Some("none") => Ok(Self::Off),
            Some(other) => bail!("unknown engine choice: {}", other),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Base URL of the answer service
    pub chat_url: String,

    /// Deadline for each answer request; `None` waits forever
    pub request_timeout: Option<Duration>,

    /// Whether the session starts muted
    pub start_muted: bool,

    /// Speech recognition engine to use
    pub stt_engine: EngineChoice,

    /// Speech synthesis engine to use
    pub tts_engine: EngineChoice,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("voicebot");

        let socket_path = match std::env::var("VOICEBOT_SOCKET") {
            Ok(path) => PathBuf::from(path),
            Err(_) => data_dir.join("daemon.sock"),
        };

        let chat_url = std::env::var("VOICEBOT_CHAT_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8787".to_string());

        let request_timeout =
            parse_timeout_secs(std::env::var("VOICEBOT_REQUEST_TIMEOUT_SECS").ok().as_deref())?;

        let start_muted = matches!(
            std::env::var("VOICEBOT_START_MUTED").as_deref(),
            Ok("1") | Ok("true") | Ok("yes")
        );

        let stt_engine = EngineChoice::parse(std::env::var("VOICEBOT_STT").ok().as_deref())
            .context("invalid VOICEBOT_STT")?;
        let tts_engine = EngineChoice::parse(std::env::var("VOICEBOT_TTS").ok().as_deref())
            .context("invalid VOICEBOT_TTS")?;

        Ok(Self {
            socket_path,
            data_dir,
            chat_url,
            request_timeout,
            start_muted,
            stt_engine,
            tts_engine,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// Parse a timeout given in whole seconds; zero disables it
fn parse_timeout_secs(value: Option<&str>) -> Result<Option<Duration>> {
    let Some(raw) = value else {
        return Ok(Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)));
    };
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("invalid timeout: {}", raw))?;
    if secs == 0 {
        Ok(None)
    } else {
        Ok(Some(Duration::from_secs(secs)))
    }
}

/// Answer gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP gateway listens on
    pub listen_addr: SocketAddr,

    /// Base URL of the OpenAI-compatible completion API
    pub llm_url: String,

    /// Bearer token for the completion API, if it needs one
    pub api_key: Option<String>,

    /// Model name passed to the completion API
    pub model: String,

    /// System prompt put in front of every question
    pub persona: String,
}

impl GatewayConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let listen_addr = std::env::var("VOICEBOT_GATEWAY_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()
            .context("invalid VOICEBOT_GATEWAY_ADDR")?;

        let llm_url = std::env::var("VOICEBOT_LLM_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let api_key = std::env::var("VOICEBOT_LLM_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let model = std::env::var("VOICEBOT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let persona =
            std::env::var("VOICEBOT_PERSONA").unwrap_or_else(|_| DEFAULT_PERSONA.to_string());

        Ok(Self {
            listen_addr,
            llm_url,
            api_key,
            model,
            persona,
        })
    }
}
