//! End-to-end voice turns against a real answer stack
//!
//! These tests run the real session machine with placeholder speech engines
//! and a real HTTP answer path: the gateway router in front of a stubbed
//! completion API.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use voicebot_daemon::capture::SpeechCaptureController;
use voicebot_daemon::chat::gateway::{build_router, GatewayState};
use voicebot_daemon::chat::AnswerRequester;
use voicebot_daemon::config::GatewayConfig;
use voicebot_daemon::engine::{PlaceholderRecognizer, PlaceholderSynthesizer};
use voicebot_daemon::events::SessionEvent;
use voicebot_daemon::ipc::{DaemonStatus, Notification, Request, Response, Server};
use voicebot_daemon::playback::SpeechPlaybackController;
use voicebot_daemon::session::{
    SessionInput, SessionMachine, SessionOptions, SessionState,
};

const QUESTION: &str = "What is your biggest strength?";
const ANSWER: &str = "Adaptability.";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// The real gateway router in front of a stub completion API.
async fn start_answer_stack() -> String {
    let upstream = Router::new().route(
        "/chat/completions",
        post(|| async {
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": ANSWER}}]
            }))
        }),
    );
    let upstream_url = serve(upstream).await;

    let config = GatewayConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        llm_url: upstream_url,
        api_key: None,
        model: "test-model".to_string(),
        persona: "You are concise.".to_string(),
    };
    serve(build_router(GatewayState::new(config))).await
}

/// An answer service that rejects everything.
async fn start_failing_answer_service() -> String {
    let router = Router::new().route(
        "/api/chat",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "boom"})),
            )
        }),
    );
    serve(router).await
}

struct Session {
    input_tx: mpsc::Sender<SessionInput>,
    events: broadcast::Receiver<SessionEvent>,
}

fn start_session(chat_url: &str, start_muted: bool) -> Session {
    let (input_tx, input_rx) = mpsc::channel(32);
    let (event_tx, events) = broadcast::channel(64);

    let recognizer = PlaceholderRecognizer::with_transcript(QUESTION)
        .with_delay(Duration::from_millis(10));
    let synthesizer = PlaceholderSynthesizer::with_rate(Duration::from_millis(1));

    let capture = SpeechCaptureController::new(Some(Arc::new(recognizer)), input_tx.clone());
    let playback = SpeechPlaybackController::new(Some(Arc::new(synthesizer)), input_tx.clone());
    let answers = Arc::new(AnswerRequester::new(chat_url));

    let options = SessionOptions {
        start_muted,
        request_timeout: Some(Duration::from_secs(5)),
    };

    let mut machine = SessionMachine::new(
        capture,
        playback,
        answers,
        options,
        input_tx.clone(),
        event_tx,
    );
    tokio::spawn(async move {
        machine.run(input_rx).await;
    });

    Session { input_tx, events }
}

async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

/// Collect events until the turn settles in `Idle` or `Failed`.
async fn collect_turn(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = matches!(
            event,
            SessionEvent::StateChanged {
                to: SessionState::Idle | SessionState::Failed,
                ..
            }
        );
        seen.push(event);
        if done {
            return seen;
        }
    }
}

#[tokio::test]
async fn test_full_voice_turn() {
    let chat_url = start_answer_stack().await;
    let mut session = start_session(&chat_url, false);

    session
        .input_tx
        .send(SessionInput::MicPressed)
        .await
        .unwrap();
    let events = collect_turn(&mut session.events).await;

    assert_eq!(
        events,
        vec![
            SessionEvent::StateChanged {
                from: SessionState::Idle,
                to: SessionState::Listening,
            },
            SessionEvent::TranscriptReady {
                text: QUESTION.to_string(),
            },
            SessionEvent::StateChanged {
                from: SessionState::Listening,
                to: SessionState::Requesting,
            },
            SessionEvent::AnswerReady {
                text: ANSWER.to_string(),
            },
            SessionEvent::StateChanged {
                from: SessionState::Requesting,
                to: SessionState::Speaking,
            },
            SessionEvent::StateChanged {
                from: SessionState::Speaking,
                to: SessionState::Idle,
            },
        ]
    );
}

#[tokio::test]
async fn test_muted_turn_holds_the_answer() {
    let chat_url = start_answer_stack().await;
    let mut session = start_session(&chat_url, true);

    session
        .input_tx
        .send(SessionInput::MicPressed)
        .await
        .unwrap();
    let events = collect_turn(&mut session.events).await;

    assert!(events.contains(&SessionEvent::AnswerReady {
        text: ANSWER.to_string(),
    }));
    assert!(events.iter().all(|e| !matches!(
        e,
        SessionEvent::StateChanged {
            to: SessionState::Speaking,
            ..
        }
    )));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::StateChanged {
            from: SessionState::Requesting,
            to: SessionState::Idle,
        })
    );
}

#[tokio::test]
async fn test_request_error_fails_the_turn() {
    let chat_url = start_failing_answer_service().await;
    let mut session = start_session(&chat_url, false);

    session
        .input_tx
        .send(SessionInput::MicPressed)
        .await
        .unwrap();
    let events = collect_turn(&mut session.events).await;

    assert!(events.contains(&SessionEvent::TurnFailed {
        message: "answer request failed: boom".to_string(),
    }));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::StateChanged {
            from: SessionState::Requesting,
            to: SessionState::Failed,
        })
    );
}

async fn send_request(stream: &mut UnixStream, request: &Request) {
    let bytes = serde_json::to_vec(request).unwrap();
    stream
        .write_all(&(bytes.len() as u32).to_le_bytes())
        .await
        .unwrap();
    stream.write_all(&bytes).await.unwrap();
}

async fn read_frame<T: serde::de::DeserializeOwned>(stream: &mut UnixStream) -> T {
    let mut len_buf = [0u8; 4];
    timeout(Duration::from_secs(5), stream.read_exact(&mut len_buf))
        .await
        .expect("timed out reading frame length")
        .unwrap();
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    serde_json::from_slice(&buf).unwrap()
}

/// Drive a whole turn the way a UI would: over the daemon's Unix socket,
/// with the session machine, IPC server, and status mirror all wired up.
#[tokio::test]
async fn test_turn_driven_over_ipc() {
    let chat_url = start_answer_stack().await;

    let (input_tx, input_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel::<SessionEvent>(64);

    let recognizer = PlaceholderRecognizer::with_transcript(QUESTION)
        .with_delay(Duration::from_millis(10));
    let synthesizer = PlaceholderSynthesizer::with_rate(Duration::from_millis(1));
    let capture = SpeechCaptureController::new(Some(Arc::new(recognizer)), input_tx.clone());
    let playback = SpeechPlaybackController::new(Some(Arc::new(synthesizer)), input_tx.clone());
    let answers = Arc::new(AnswerRequester::new(&chat_url));

    let mut machine = SessionMachine::new(
        capture,
        playback,
        answers,
        SessionOptions {
            start_muted: false,
            request_timeout: Some(Duration::from_secs(5)),
        },
        input_tx.clone(),
        event_tx.clone(),
    );
    tokio::spawn(async move {
        machine.run(input_rx).await;
    });

    let socket_path =
        std::env::temp_dir().join(format!("voicebot-e2e-{}.sock", std::process::id()));
    let server = Arc::new(
        Server::new(
            &socket_path,
            input_tx.clone(),
            event_tx.clone(),
            DaemonStatus::default(),
        )
        .unwrap(),
    );
    let runner = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = runner.run().await;
    });
    let mirror = Arc::clone(&server);
    let mut mirror_rx = event_tx.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = mirror_rx.recv().await {
            mirror.apply_event(&event).await;
        }
    });

    // One connection for notifications, one for requests.
    let mut sub = UnixStream::connect(&socket_path).await.unwrap();
    send_request(&mut sub, &Request::Subscribe).await;
    let resp: Response = read_frame(&mut sub).await;
    assert!(matches!(resp, Response::Subscribed));

    let mut ctl = UnixStream::connect(&socket_path).await.unwrap();
    send_request(&mut ctl, &Request::PressMic).await;
    let resp: Response = read_frame(&mut ctl).await;
    assert!(matches!(resp, Response::Accepted));

    let mut events = Vec::new();
    loop {
        let Notification::SessionEvent { event } = read_frame(&mut sub).await;
        let done = matches!(
            event,
            SessionEvent::StateChanged {
                to: SessionState::Idle,
                ..
            }
        );
        events.push(event);
        if done {
            break;
        }
    }
    assert!(events.contains(&SessionEvent::TranscriptReady {
        text: QUESTION.to_string(),
    }));
    assert!(events.contains(&SessionEvent::AnswerReady {
        text: ANSWER.to_string(),
    }));

    // The status mirror runs on its own subscription; give it a moment.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let status = loop {
        send_request(&mut ctl, &Request::GetStatus).await;
        let resp: Response = read_frame(&mut ctl).await;
        let status = match resp {
            Response::Status(status) => status,
            other => panic!("unexpected response: {:?}", other),
        };
        if status.state == SessionState::Idle && !status.answer.is_empty() {
            break status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "status never settled: {:?}",
            status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert_eq!(status.transcript, QUESTION);
    assert_eq!(status.answer, ANSWER);
    assert_eq!(status.error, None);

    server.shutdown().await;
}
