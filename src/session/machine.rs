//! Core session machine implementation
//!
//! Owns every piece of mutable session state: the current [`SessionState`],
//! the mute flag, transcript, answer, last error, and the single active
//! operation. Inputs are processed one at a time, each handler running to
//! completion before the next input is read, so no two operations can ever
//! race on this state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::capture::SpeechCaptureController;
use crate::chat::AnswerBackend;
use crate::error::{TurnError, TurnResult};
use crate::events::SessionEvent;
use crate::playback::SpeechPlaybackController;

use super::{OpToken, PlaybackOutcome, SessionInput, SessionState};

/// Which collaborator an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Capture,
    Request,
    Playback,
}

/// The operation the session is currently waiting on.
#[derive(Debug, Clone, Copy)]
struct ActiveOp {
    kind: OpKind,
    token: OpToken,
}

/// Tunables the daemon wires in from its configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Initial value of the mute flag.
    pub start_muted: bool,
    /// Deadline imposed on each answer request; `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            start_muted: false,
            request_timeout: None,
        }
    }
}

/// The state machine that sequences capture, answer requests, and playback
/// into one interruptible session.
pub struct SessionMachine {
    /// Current state
    state: SessionState,
    /// Mute flag, independent of state, lives for the whole process
    muted: bool,
    /// Last recognized question; replaced wholesale each turn
    transcript: String,
    /// Last received answer; replaced wholesale each turn
    answer: String,
    /// Message of the last failure, until the next turn clears it
    error: Option<String>,
    /// The one operation allowed to be in flight
    active: Option<ActiveOp>,
    /// Monotonic source of operation tokens
    next_token: u64,
    capture: SpeechCaptureController,
    playback: SpeechPlaybackController,
    answers: Arc<dyn AnswerBackend>,
    request_timeout: Option<Duration>,
    /// Sender side of our own input channel, for operation completions
    input_tx: mpsc::Sender<SessionInput>,
    /// Channel for emitting session events
    event_tx: broadcast::Sender<SessionEvent>,
    /// Time when the current state was entered
    state_entered_at: Instant,
}

impl SessionMachine {
    pub fn new(
        capture: SpeechCaptureController,
        playback: SpeechPlaybackController,
        answers: Arc<dyn AnswerBackend>,
        options: SessionOptions,
        input_tx: mpsc::Sender<SessionInput>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            muted: options.start_muted,
            transcript: String::new(),
            answer: String::new(),
            error: None,
            active: None,
            next_token: 0,
            capture,
            playback,
            answers,
            request_timeout: options.request_timeout,
            input_tx,
            event_tx,
            state_entered_at: Instant::now(),
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the current mute flag
    pub fn muted(&self) -> bool {
        self.muted
    }

    /// The transcript of the current turn, empty until capture completes
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// The answer of the current turn, empty until the request resolves
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Message of the last failure, if the session is in `Failed`
    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Run the session machine, processing inputs until the channel closes
    pub async fn run(&mut self, mut input_rx: mpsc::Receiver<SessionInput>) {
        info!(muted = self.muted, "session machine started in Idle state");

        while let Some(input) = input_rx.recv().await {
            self.handle(input);
        }

        info!("session machine stopped");
    }

    /// Process one input to completion
    fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::MicPressed => self.handle_mic_press(),
            SessionInput::SetMuted(muted) => self.handle_set_muted(muted),
            SessionInput::CaptureDone { token, outcome } => {
                self.handle_capture_done(token, outcome)
            }
            SessionInput::AnswerDone { token, outcome } => self.handle_answer_done(token, outcome),
            SessionInput::PlaybackDone { token, outcome } => {
                self.handle_playback_done(token, outcome)
            }
        }
    }

    /// A mic press in `Listening` stops the turn; in every other state it
    /// starts a fresh one
    fn handle_mic_press(&mut self) {
        if self.state == SessionState::Listening {
            debug!("mic press while listening, stopping capture");
            self.cancel_active();
            self.set_state(SessionState::Idle);
            return;
        }

        self.begin_capture();
    }

    fn handle_set_muted(&mut self, muted: bool) {
        if muted == self.muted {
            return;
        }

        self.muted = muted;
        info!(muted, "mute flag changed");
        self.emit(SessionEvent::MuteChanged { muted });

        if muted {
            if self.state == SessionState::Speaking {
                self.cancel_active();
                self.set_state(SessionState::Idle);
            }
        } else if !self.answer.is_empty() && self.state != SessionState::Speaking {
            // The stored answer was never heard (or was cut off); read it now.
            self.begin_playback();
        }
    }

    fn handle_capture_done(&mut self, token: OpToken, outcome: TurnResult<String>) {
        if !self.is_current(OpKind::Capture, token) {
            debug!(%token, "dropping stale capture completion");
            return;
        }
        self.active = None;

        match outcome {
            Ok(text) => {
                self.transcript = text.clone();
                self.emit(SessionEvent::TranscriptReady { text });
                self.begin_request();
            }
            Err(e) => self.fail(e),
        }
    }

    fn handle_answer_done(&mut self, token: OpToken, outcome: TurnResult<String>) {
        if !self.is_current(OpKind::Request, token) {
            debug!(%token, "dropping stale answer completion");
            return;
        }
        self.active = None;

        match outcome {
            Ok(text) => {
                self.answer = text.clone();
                self.emit(SessionEvent::AnswerReady { text });
                if self.muted {
                    debug!("muted, holding the answer without playback");
                    self.set_state(SessionState::Idle);
                } else {
                    self.begin_playback();
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn handle_playback_done(&mut self, token: OpToken, outcome: PlaybackOutcome) {
        if !self.is_current(OpKind::Playback, token) {
            debug!(%token, "dropping stale playback completion");
            return;
        }
        self.active = None;

        match outcome {
            PlaybackOutcome::Finished | PlaybackOutcome::Canceled => {
                self.set_state(SessionState::Idle)
            }
            PlaybackOutcome::Failed(e) => self.fail(e),
        }
    }

    /// Start a capture turn: cancel whatever is running, clear the previous
    /// turn's data, and hand the microphone to the engine
    fn begin_capture(&mut self) {
        self.cancel_active();
        self.transcript.clear();
        self.answer.clear();
        self.error = None;

        let token = self.mint(OpKind::Capture);
        match self.capture.start(token) {
            Ok(()) => self.set_state(SessionState::Listening),
            Err(e) => {
                self.active = None;
                self.fail(e);
            }
        }
    }

    /// Send the transcript to the answer service, racing the configured
    /// deadline. The late side of the race is discarded by the token check.
    fn begin_request(&mut self) {
        self.cancel_active();
        let token = self.mint(OpKind::Request);

        let text = self.transcript.clone();
        let backend = Arc::clone(&self.answers);
        let deadline = self.request_timeout;
        let input_tx = self.input_tx.clone();
        tokio::spawn(async move {
            let outcome = match deadline {
                Some(limit) => match tokio::time::timeout(limit, backend.request(&text)).await {
                    Ok(result) => result,
                    Err(_) => Err(TurnError::Request("timeout".to_string())),
                },
                None => backend.request(&text).await,
            };
            let _ = input_tx
                .send(SessionInput::AnswerDone { token, outcome })
                .await;
        });

        self.set_state(SessionState::Requesting);
    }

    fn begin_playback(&mut self) {
        self.cancel_active();
        let token = self.mint(OpKind::Playback);

        match self.playback.speak(token, &self.answer) {
            Ok(()) => self.set_state(SessionState::Speaking),
            Err(e) => {
                self.active = None;
                self.fail(e);
            }
        }
    }

    /// Cancel the active operation, if any, and invalidate its token.
    ///
    /// Requests have no transport-level cancel: dropping the token is enough,
    /// since the resolution will arrive stale and be ignored.
    fn cancel_active(&mut self) {
        let Some(op) = self.active.take() else {
            return;
        };
        debug!(kind = ?op.kind, token = %op.token, "canceling active operation");
        match op.kind {
            OpKind::Capture => self.capture.cancel(),
            OpKind::Request => {}
            OpKind::Playback => self.playback.cancel(),
        }
    }

    /// Mint the token for a new operation and make it the active one
    fn mint(&mut self, kind: OpKind) -> OpToken {
        self.next_token += 1;
        let token = OpToken(self.next_token);
        self.active = Some(ActiveOp { kind, token });
        token
    }

    /// Whether a completion belongs to the operation we are waiting on
    fn is_current(&self, kind: OpKind, token: OpToken) -> bool {
        self.active
            .map(|op| op.kind == kind && op.token == token)
            .unwrap_or(false)
    }

    /// End the turn in `Failed` with a user-readable message
    fn fail(&mut self, error: TurnError) {
        let message = error.to_string();
        warn!(%message, "session turn failed");
        self.error = Some(message.clone());
        self.emit(SessionEvent::TurnFailed { message });
        self.set_state(SessionState::Failed);
    }

    /// Perform a state transition
    fn set_state(&mut self, new_state: SessionState) {
        if new_state == self.state {
            return;
        }

        let old_state = self.state;
        let duration_ms = self.state_entered_at.elapsed().as_millis() as u64;
        self.state = new_state;
        self.state_entered_at = Instant::now();

        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.emit(SessionEvent::StateChanged {
            from: old_state,
            to: new_state,
        });
    }

    fn emit(&self, event: SessionEvent) {
        debug!(%event, "emitting session event");
        let _ = self.event_tx.send(event);
    }
}
