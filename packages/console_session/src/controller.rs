//! Session Controller
//!
//! The protocol state machine. Consumes transport events, applies server
//! messages to the render surface, owns the single outstanding prompt and
//! queues client frames for the transport. It performs no I/O itself: the
//! owner drains [`SessionController::take_outgoing`] and hands the frames to
//! the transport.
//!
//! ```text
//! Idle --connect--> AwaitingOpen --open--> Initializing --init sent--> Interactive
//! Interactive --prompt--> AwaitingInput --submit--> Interactive
//! * --close--> Idle          * --stop--> Stopped
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DecodeError, TransportError};
use crate::input_line::{DEFAULT_MASK_CHAR, Focus, InputCapture};
use crate::protocol::{self, ClientMessage, ClientMetadata, ServerMessage};
use crate::surface::RenderSurface;
use crate::transport::{ConnectionId, TransportEvent};

/// Style class of lines the client writes about its own connection.
pub const STATUS_CLASS: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingOpen,
    Initializing,
    Interactive,
    AwaitingInput,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// A client frame bound to the connection it was produced on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub connection: ConnectionId,
    pub message: ClientMessage,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub metadata: ClientMetadata,
    pub mask_char: char,
}

impl ControllerConfig {
    pub fn new(metadata: ClientMetadata) -> Self {
        Self {
            metadata,
            mask_char: DEFAULT_MASK_CHAR,
        }
    }
}

pub struct SessionController {
    id: Uuid,
    span: tracing::Span,
    config: ControllerConfig,
    phase: Phase,
    connection_state: ConnectionState,
    current: Option<ConnectionId>,
    surface: RenderSurface,
    pending: Option<InputCapture>,
    outbox: VecDeque<Outgoing>,
    attempt: u64,
    retry_in: Option<Duration>,
    /// Closes since the last successful open. Status lines are only written
    /// for the first failure of a streak so a dead server does not flood the
    /// surface every few seconds.
    failures: u32,
}

impl SessionController {
    pub fn new(config: ControllerConfig) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("session", session_id = %id);
        Self {
            id,
            span,
            config,
            phase: Phase::Idle,
            connection_state: ConnectionState::Disconnected,
            current: None,
            surface: RenderSurface::new(),
            pending: None,
            outbox: VecDeque::new(),
            attempt: 0,
            retry_in: None,
            failures: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.current
    }

    /// Connect attempts since the last successful open.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Delay before the next connect attempt, while one is scheduled.
    pub fn retry_in(&self) -> Option<Duration> {
        self.retry_in
    }

    pub fn mask_char(&self) -> char {
        self.config.mask_char
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    /// Mutable access for scrolling. Content is only changed by the session.
    pub fn surface_mut(&mut self) -> &mut RenderSurface {
        &mut self.surface
    }

    pub fn pending(&self) -> Option<&InputCapture> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut InputCapture> {
        self.pending.as_mut()
    }

    pub fn focus(&self) -> Focus {
        if self.pending.is_some() {
            Focus::Input
        } else {
            Focus::Surface
        }
    }

    /// Ask to give focus back to the surface. Refused while a prompt is
    /// outstanding.
    pub fn focus_surface(&self) -> bool {
        self.pending.is_none()
    }

    /// Drain frames queued for the transport.
    ///
    /// Taking the `init` frame completes initialization: the protocol has no
    /// acknowledgement, so the session is interactive as soon as it is sent.
    pub fn take_outgoing(&mut self) -> Vec<Outgoing> {
        if self.phase == Phase::Initializing {
            self.phase = Phase::Interactive;
        }
        self.outbox.drain(..).collect()
    }

    pub fn handle(&mut self, event: TransportEvent) {
        if self.phase == Phase::Stopped {
            return;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        match event {
            TransportEvent::Connecting {
                connection,
                attempt,
            } => self.on_connecting(connection, attempt),
            TransportEvent::Open { connection } => self.on_open(connection),
            TransportEvent::Message { connection, raw } => self.on_message(connection, &raw),
            TransportEvent::Error { connection, error } => self.on_error(connection, &error),
            TransportEvent::Closed {
                connection,
                reconnect_in,
            } => self.on_closed(connection, reconnect_in),
        }
    }

    fn on_connecting(&mut self, connection: ConnectionId, attempt: u64) {
        debug!(%connection, attempt, "connecting");
        self.current = Some(connection);
        self.attempt = attempt;
        self.retry_in = None;
        self.connection_state = ConnectionState::Connecting;
        self.phase = Phase::AwaitingOpen;
    }

    fn on_open(&mut self, connection: ConnectionId) {
        if self.current != Some(connection) {
            debug!(%connection, "ignoring open for stale connection");
            return;
        }
        if self.failures > 0 {
            self.status("connected");
        }
        info!(%connection, "session open, sending init");
        self.failures = 0;
        self.attempt = 0;
        self.connection_state = ConnectionState::Open;
        self.phase = Phase::Initializing;
        self.outbox.push_back(Outgoing {
            connection,
            message: ClientMessage::Init(self.config.metadata.clone()),
        });
    }

    fn on_message(&mut self, connection: ConnectionId, raw: &str) {
        if self.current != Some(connection) || self.connection_state != ConnectionState::Open {
            debug!(%connection, "ignoring message from stale connection");
            return;
        }
        if self.phase == Phase::Initializing {
            self.phase = Phase::Interactive;
        }
        match protocol::decode(raw) {
            Ok(Some(msg)) => self.apply(connection, msg),
            Ok(None) => debug!(%connection, "ignoring message of unknown type"),
            Err(e) => self.on_decode_error(&e),
        }
    }

    fn apply(&mut self, connection: ConnectionId, msg: ServerMessage) {
        match msg {
            ServerMessage::Output {
                content,
                class_name,
            } => {
                self.surface.append(content, class_name);
            }
            ServerMessage::Clear => {
                debug!(%connection, pending = self.pending.is_some(), "clear");
                self.surface.clear();
            }
            ServerMessage::Prompt {
                content,
                is_password,
            } => {
                if self.pending.is_some() {
                    warn!(%connection, "prompt received while another is pending, ignoring it");
                    return;
                }
                debug!(%connection, is_password, "prompt");
                self.pending = Some(InputCapture::request(&mut self.surface, content, is_password));
                self.phase = Phase::AwaitingInput;
            }
        }
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        warn!(error = %error, "dropping undecodable frame");
        self.status(&format!("dropped frame: {}", error));
    }

    fn on_error(&mut self, connection: ConnectionId, error: &TransportError) {
        if self.current != Some(connection) {
            return;
        }
        warn!(%connection, error = %error, "transport error");
        if self.failures == 0 {
            self.status(&format!("connection error: {}", error));
        }
    }

    fn on_closed(&mut self, connection: ConnectionId, reconnect_in: Option<Duration>) {
        if self.current != Some(connection) {
            return;
        }
        if self.pending.take().is_some() {
            info!(%connection, "abandoning pending prompt");
        }
        self.outbox.retain(|o| o.connection != connection);
        self.connection_state = ConnectionState::Closed;
        self.current = None;

        match reconnect_in {
            Some(delay) => {
                if self.failures == 0 {
                    self.status(&format!(
                        "connection closed, reconnecting every {}s",
                        delay.as_secs_f32()
                    ));
                }
                self.failures = self.failures.saturating_add(1);
                self.retry_in = Some(delay);
                self.phase = Phase::Idle;
            }
            None => {
                self.retry_in = None;
                self.phase = Phase::Stopped;
            }
        }
    }

    /// Resolve the outstanding prompt with whatever the operator typed.
    ///
    /// Returns `false` when nothing is pending.
    pub fn submit(&mut self) -> bool {
        let Some(capture) = self.pending.take() else {
            return false;
        };
        let span = self.span.clone();
        let _enter = span.enter();

        let content = capture.submit(&mut self.surface, self.config.mask_char);
        self.phase = Phase::Interactive;

        match (self.current, self.connection_state) {
            (Some(connection), ConnectionState::Open) => {
                debug!(%connection, len = content.chars().count(), "submitting input");
                self.outbox.push_back(Outgoing {
                    connection,
                    message: ClientMessage::Input { content },
                });
            }
            _ => warn!("submission without an open connection, dropping it"),
        }
        true
    }

    /// Enter the terminal state. The owner is responsible for stopping the
    /// transport.
    pub fn stop(&mut self) {
        info!(parent: &self.span, "stopping session");
        self.pending = None;
        self.outbox.clear();
        self.retry_in = None;
        self.phase = Phase::Stopped;
    }

    fn status(&mut self, text: &str) {
        self.surface.append(crate::markup::escape(text), STATUS_CLASS);
    }
}
