//! The connection session: one client talking to one server.
//!
//! A [`Session`] owns everything about a single connection:
//!
//! - WHO we are (device id, client version, player id)
//! - WHAT state we're in ([`SessionState`])
//! - the writer task (send path, see [`crate::outbox`])
//! - the reader task (read → assemble → decode → dispatch)
//!
//! ```text
//!   Disconnected ──connect()──→ Connecting ──ok──→ Connected
//!        ↑                          │                  │
//!        └────────── failed ────────┘                  │
//!        └──── disconnect() / EOF / error / violations ┘
//! ```
//!
//! A session is single-use: once it has been connected and disconnected
//! (or disposed without connecting) it stays `Disconnected`. Build a new
//! one to reconnect.

use std::fmt;
use std::sync::Arc;

use multiplay_protocol::{
    Frame, FrameAssembler, HandlerId, InitialPayload, ProtocolError, Response, WireFormat,
    WireMessage,
};
use multiplay_transport::{Connection, TcpConnection};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{DispatchContext, Dispatcher, DispatcherBuilder};
use crate::event::{EventReceiver, EventSender};
use crate::handlers::builtin_handlers;
use crate::outbox::{OutboxParts, SendReceipt, run_writer};
use crate::{
    Clock, DisconnectReason, LatencyState, LatencyTracker, Outbox, SessionConfig, SessionError,
    SessionEvent,
};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// State shared by the session handle and its tasks.
pub(crate) struct Shared {
    pub(crate) state: watch::Sender<SessionState>,
    pub(crate) events: EventSender,
    pub(crate) cancel: CancellationToken,
}

impl Shared {
    pub(crate) fn new(cancel: CancellationToken) -> (Arc<Self>, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Self {
            state: watch::Sender::new(SessionState::Disconnected),
            events,
            cancel,
        });
        (shared, rx)
    }

    /// Moves to `Disconnected` and stops both tasks.
    ///
    /// Only the first call after connecting emits
    /// [`SessionEvent::Disconnected`]. Returns whether this call did the
    /// transition.
    pub(crate) fn close(&self, reason: DisconnectReason) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == SessionState::Disconnected {
                false
            } else {
                *state = SessionState::Disconnected;
                true
            }
        });
        self.cancel.cancel();

        if changed {
            tracing::info!(%reason, "session disconnected");
            let _ = self.events.send(SessionEvent::Disconnected(reason));
        }
        changed
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A client connection to the game server.
///
/// Created with [`Session::new`], which also returns the event stream.
/// `connect`/`disconnect` take `&mut self`; sending works through `&self`
/// or through a cloned [`Outbox`] from any task.
pub struct Session {
    config: SessionConfig,
    shared: Arc<Shared>,
    latency: Arc<LatencyTracker>,
    dispatcher: Option<Dispatcher>,
    outbox: Option<Outbox>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Builds a disconnected session.
    ///
    /// `handlers` are merged over the built-in INIT, LOCATION_UPDATE and
    /// PING handlers; an application handler for one of those ids replaces
    /// the built-in one.
    pub fn new(
        config: SessionConfig,
        handlers: DispatcherBuilder,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, EventReceiver), SessionError> {
        config.validate()?;
        let (shared, events) = Shared::new(CancellationToken::new());
        let dispatcher = builtin_handlers().merge(handlers).build();

        let session = Self {
            config,
            shared,
            latency: Arc::new(LatencyTracker::new(clock)),
            dispatcher: Some(dispatcher),
            outbox: None,
            tasks: Vec::new(),
        };
        Ok((session, events))
    }

    /// Connects over TCP, starts the session, and sends the handshake.
    ///
    /// On failure the session is left `Disconnected` and may try again.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        self.begin_connect()?;
        let addr = format!("{host}:{port}");
        tracing::info!(%addr, "connecting");

        let timeout = self.config.connect_timeout;
        let conn = match tokio::time::timeout(timeout, TcpConnection::connect(host, port)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                self.shared.state.send_replace(SessionState::Disconnected);
                tracing::warn!(%addr, error = %e, "connect failed");
                return Err(e.into());
            }
            Err(_) => {
                self.shared.state.send_replace(SessionState::Disconnected);
                tracing::warn!(%addr, ?timeout, "connect timed out");
                return Err(SessionError::ConnectTimeout { addr, timeout });
            }
        };

        self.start(conn).await
    }

    /// Starts the session over an already established connection.
    pub async fn attach<C: Connection>(&mut self, conn: C) -> Result<(), SessionError> {
        self.begin_connect()?;
        self.start(conn).await
    }

    fn begin_connect(&mut self) -> Result<(), SessionError> {
        match self.shared.state() {
            SessionState::Disconnected
                if self.shared.cancel.is_cancelled() || self.dispatcher.is_none() =>
            {
                Err(SessionError::Closed)
            }
            SessionState::Disconnected => {
                self.shared.state.send_replace(SessionState::Connecting);
                Ok(())
            }
            other => Err(SessionError::InvalidState(other)),
        }
    }

    async fn start<C: Connection>(&mut self, conn: C) -> Result<(), SessionError> {
        let dispatcher = self.dispatcher.take().ok_or(SessionError::Closed)?;
        let conn = Arc::new(conn);
        let conn_id = conn.id();

        let (queue, queue_rx) = mpsc::channel(self.config.outbound_capacity);
        let outbox = Outbox::new(OutboxParts {
            sender_id: self.config.device_id.clone(),
            wire: self.config.wire,
            delay: self.config.send_delay,
            heartbeat: self.config.heartbeat,
            sequencing: self.config.sequencing,
            latency: self.latency.clone(),
            queue,
            shared: self.shared.clone(),
        });

        self.tasks.push(tokio::spawn(run_writer(
            conn.clone(),
            queue_rx,
            self.shared.clone(),
        )));
        self.shared.state.send_replace(SessionState::Connected);
        self.tasks.push(tokio::spawn(run_reader(
            conn,
            dispatcher,
            outbox.clone(),
            self.shared.clone(),
            ReaderConfig {
                wire: self.config.wire,
                max_violations: self.config.max_protocol_violations,
            },
        )));
        self.outbox = Some(outbox.clone());
        tracing::info!(%conn_id, device_id = %self.config.device_id, "session connected");

        let handshake = InitialPayload::new(
            self.config.device_id.clone(),
            self.config.client_version.clone(),
            self.config.player_id,
        );
        // The handshake is fire-and-forget: a failed write surfaces as a
        // Disconnected event.
        drop(outbox.send(HandlerId::INIT, &handshake).await?);
        Ok(())
    }

    /// Closes the session. Idempotent.
    ///
    /// Cancels both tasks (unblocking a pending read), closes the transport,
    /// and makes further sends fail with [`SessionError::NotConnected`]. On
    /// a session that never connected this disposes it.
    pub async fn disconnect(&mut self) {
        self.shared.close(DisconnectReason::Requested);
        self.dispatcher = None;
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "session task failed");
            }
        }
    }

    /// Sends `message` under `handler_id`. See [`Outbox::send`].
    pub async fn send<M: WireMessage>(
        &self,
        handler_id: HandlerId,
        message: &M,
    ) -> Result<SendReceipt, SessionError> {
        self.outbox()?.send(handler_id, message).await
    }

    /// Sends a location update.
    pub async fn send_location(&self, x: f32, y: f32) -> Result<SendReceipt, SessionError> {
        self.outbox()?.send_location(x, y).await
    }

    /// A cloneable send handle, available once connected.
    pub fn outbox(&self) -> Result<&Outbox, SessionError> {
        self.outbox.as_ref().ok_or(SessionError::NotConnected)
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Watches state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn latency(&self) -> LatencyState {
        self.latency.snapshot()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.config.device_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

struct ReaderConfig {
    wire: WireFormat,
    /// `0` disables the limit.
    max_violations: u32,
}

/// Reads chunks until EOF, error, cancellation, or too many violations in
/// a row.
async fn run_reader<C: Connection>(
    conn: Arc<C>,
    dispatcher: Dispatcher,
    outbox: Outbox,
    shared: Arc<Shared>,
    config: ReaderConfig,
) {
    let conn_id = conn.id();
    let mut assembler = FrameAssembler::new(config.wire);
    let ctx = DispatchContext::new(&outbox, &shared.events);
    let mut violations = 0u32;
    tracing::debug!(%conn_id, "reader started");

    loop {
        let chunk = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            result = conn.recv() => result,
        };

        let chunk = match chunk {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                tracing::info!(%conn_id, "server closed the connection");
                shared.close(DisconnectReason::ClosedByPeer);
                break;
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "read failed");
                shared.close(DisconnectReason::Transport(e.to_string()));
                break;
            }
        };
        tracing::trace!(%conn_id, bytes = chunk.len(), "read");

        for frame in assembler.feed(&chunk) {
            // The limit counts consecutive violations.
            let Err(e) = frame.and_then(|frame| process_frame(&frame, &dispatcher, &ctx)) else {
                violations = 0;
                continue;
            };

            violations += 1;
            tracing::warn!(%conn_id, error = %e, violations, "protocol violation");
            ctx.emit(SessionEvent::ProtocolViolation {
                error: e.to_string(),
            });

            if config.max_violations != 0 && violations >= config.max_violations {
                shared.close(DisconnectReason::ProtocolViolations { count: violations });
                tracing::debug!(%conn_id, "reader stopped");
                return;
            }
        }
    }

    tracing::debug!(%conn_id, "reader stopped");
}

/// Decodes one frame body and routes it.
fn process_frame(
    frame: &Frame,
    dispatcher: &Dispatcher,
    ctx: &DispatchContext<'_>,
) -> Result<(), ProtocolError> {
    let response = Response::from_bytes(&frame.body)?;
    if response.handler() != frame.handler_id {
        tracing::debug!(
            header = %frame.handler_id,
            body = %response.handler(),
            "header and response handler ids differ, routing by response"
        );
    }
    dispatcher.route(&response, ctx)?;
    Ok(())
}
