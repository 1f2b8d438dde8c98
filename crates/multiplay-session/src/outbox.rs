//! The send path: encode → envelope → frame → queue → writer task.
//!
//! Every outbound message, from the application or from a handler, goes
//! through an [`Outbox`]. The outbox encodes the message, stamps it with a
//! deadline (now + the configured [`SendDelay`]) and pushes it onto a
//! bounded FIFO queue. A single writer task drains the queue, waits for
//! each deadline, and writes the frame.
//!
//! ```text
//!  send() ──encode──▶ [ queue (FIFO, bounded) ] ──▶ writer task ──▶ socket
//!    │                                                  │
//!    └──────────── SendReceipt ◀──── written / Closed ──┘
//! ```
//!
//! Encoding, sequence assignment and enqueueing happen under one async
//! mutex, so sequence numbers always match the order frames hit the wire.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use multiplay_protocol::{
    Envelope, HandlerId, LocationUpdatePayload, PingPayload, WireFormat, WireMessage,
    encode_frame,
};
use multiplay_transport::Connection;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;

use crate::session::Shared;
use crate::{
    DisconnectReason, HeartbeatConfig, LatencyTracker, SendDelay, SessionError, SessionState,
};

/// One framed message waiting for the writer.
pub(crate) struct Outbound {
    handler_id: HandlerId,
    bytes: Bytes,
    due: Instant,
    done: oneshot::Sender<Result<(), SessionError>>,
}

/// Resolves when the message has been written to the socket.
///
/// Dropping the receipt does not cancel the send.
#[derive(Debug)]
#[must_use = "a receipt does nothing unless awaited; drop it to fire and forget"]
pub struct SendReceipt {
    rx: oneshot::Receiver<Result<(), SessionError>>,
    sequence: Option<u32>,
}

impl SendReceipt {
    /// Sequence number stamped on the envelope, if sequencing is on.
    pub fn sequence(&self) -> Option<u32> {
        self.sequence
    }
}

impl Future for SendReceipt {
    type Output = Result<(), SessionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(SessionError::Closed)))
    }
}

/// Everything an [`Outbox`] is built from.
pub(crate) struct OutboxParts {
    pub(crate) sender_id: String,
    pub(crate) wire: WireFormat,
    pub(crate) delay: SendDelay,
    pub(crate) heartbeat: HeartbeatConfig,
    pub(crate) sequencing: bool,
    pub(crate) latency: Arc<LatencyTracker>,
    pub(crate) queue: mpsc::Sender<Outbound>,
    pub(crate) shared: Arc<Shared>,
}

struct OutboxInner {
    sender_id: String,
    wire: WireFormat,
    delay: SendDelay,
    heartbeat: HeartbeatConfig,
    sequencing: AtomicBool,
    heartbeat_started: AtomicBool,
    next_sequence: AtomicU32,
    latency: Arc<LatencyTracker>,
    order: Mutex<()>,
    queue: mpsc::Sender<Outbound>,
    shared: Arc<Shared>,
}

/// Cloneable handle for sending on a session.
#[derive(Clone)]
pub struct Outbox {
    inner: Arc<OutboxInner>,
}

impl Outbox {
    pub(crate) fn new(parts: OutboxParts) -> Self {
        Self {
            inner: Arc::new(OutboxInner {
                sender_id: parts.sender_id,
                wire: parts.wire,
                delay: parts.delay,
                heartbeat: parts.heartbeat,
                sequencing: AtomicBool::new(parts.sequencing),
                heartbeat_started: AtomicBool::new(false),
                next_sequence: AtomicU32::new(0),
                latency: parts.latency,
                order: Mutex::new(()),
                queue: parts.queue,
                shared: parts.shared,
            }),
        }
    }

    /// Encodes `message`, wraps it in an envelope, frames it, and queues it.
    ///
    /// Returns once the frame is queued. Await the receipt to learn when it
    /// was written.
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`] unless the session is `Connected`.
    /// - [`SessionError::Protocol`] if the message cannot be encoded or
    ///   framed (e.g. it exceeds the maximum frame length).
    /// - [`SessionError::Closed`] if the writer is gone.
    pub async fn send<M: WireMessage>(
        &self,
        handler_id: HandlerId,
        message: &M,
    ) -> Result<SendReceipt, SessionError> {
        self.ensure_connected()?;
        let payload = message.to_bytes()?;

        let _order = self.inner.order.lock().await;
        // Re-check: the session may have closed while we waited.
        self.ensure_connected()?;

        let sequence = self
            .inner
            .sequencing
            .load(Ordering::Acquire)
            .then(|| self.inner.next_sequence.fetch_add(1, Ordering::AcqRel));

        let envelope = Envelope::new(self.inner.sender_id.clone(), sequence, payload);
        let body = envelope.to_bytes()?;
        let mut buf = BytesMut::with_capacity(self.inner.wire.header_size() + body.len());
        encode_frame(handler_id, &body, &self.inner.wire, &mut buf)?;

        let delay = self.inner.delay.resolve(&self.inner.latency);
        let (done, rx) = oneshot::channel();
        let item = Outbound {
            handler_id,
            bytes: buf.freeze(),
            due: Instant::now() + delay,
            done,
        };

        self.inner
            .queue
            .send(item)
            .await
            .map_err(|_| SessionError::Closed)?;

        tracing::trace!(handler = %handler_id, ?sequence, ?delay, "queued");
        Ok(SendReceipt { rx, sequence })
    }

    /// Sends a LOCATION_UPDATE_PAYLOAD.
    pub async fn send_location(&self, x: f32, y: f32) -> Result<SendReceipt, SessionError> {
        self.send(
            HandlerId::LOCATION_UPDATE_PAYLOAD,
            &LocationUpdatePayload::new(x, y),
        )
        .await
    }

    /// Stamps and sends a ping.
    pub async fn send_ping(&self) -> Result<SendReceipt, SessionError> {
        let t0 = self.inner.latency.stamp_ping();
        self.send(HandlerId::PING, &PingPayload::new(t0)).await
    }

    /// Sends a ping after `after`, unless the session closes first.
    ///
    /// Spawns a task, so it can be called from synchronous handlers.
    pub fn schedule_ping(&self, after: Duration) {
        let outbox = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = outbox.inner.shared.cancel.cancelled() => return,
                _ = tokio::time::sleep(after) => {}
            }
            if let Err(e) = outbox.send_ping().await {
                tracing::debug!(error = %e, "ping not sent");
            }
        });
    }

    /// Sends the first ping of the heartbeat chain.
    ///
    /// Each pong schedules the next ping, so only the first call starts a
    /// chain; later calls return `false` and do nothing.
    pub fn start_heartbeat(&self) -> bool {
        if self.inner.heartbeat_started.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.schedule_ping(Duration::ZERO);
        true
    }

    /// Turns envelope sequence numbers on or off.
    pub fn set_sequencing(&self, enabled: bool) {
        self.inner.sequencing.store(enabled, Ordering::Release);
    }

    pub fn sequencing(&self) -> bool {
        self.inner.sequencing.load(Ordering::Acquire)
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        self.inner.heartbeat
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.inner.latency
    }

    /// Device id stamped on every envelope.
    pub fn sender_id(&self) -> &str {
        &self.inner.sender_id
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.inner.shared
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        match *self.inner.shared.state.borrow() {
            SessionState::Connected => Ok(()),
            _ => Err(SessionError::NotConnected),
        }
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("sender_id", &self.inner.sender_id)
            .field("sequencing", &self.sequencing())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Writer task
// ---------------------------------------------------------------------------

/// Drains the queue in order, honouring each message's deadline.
///
/// Exits when the session is cancelled or a write fails. Messages still
/// queued at exit are dropped and their receipts resolve to `Closed`.
/// Always closes the connection on the way out.
pub(crate) async fn run_writer<C: Connection>(
    conn: Arc<C>,
    mut queue: mpsc::Receiver<Outbound>,
    shared: Arc<Shared>,
) {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "writer started");

    loop {
        let item = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            item = queue.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => {
                let _ = item.done.send(Err(SessionError::Closed));
                break;
            }
            _ = tokio::time::sleep_until(item.due) => {}
        }

        match conn.send(&item.bytes).await {
            Ok(()) => {
                tracing::trace!(
                    %conn_id,
                    handler = %item.handler_id,
                    bytes = item.bytes.len(),
                    "sent"
                );
                let _ = item.done.send(Ok(()));
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "write failed");
                let reason = DisconnectReason::Transport(e.to_string());
                let _ = item.done.send(Err(SessionError::Transport(e)));
                shared.close(reason);
                break;
            }
        }
    }

    queue.close();
    while let Ok(item) = queue.try_recv() {
        let _ = item.done.send(Err(SessionError::Closed));
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    tracing::debug!(%conn_id, "writer stopped");
}
