//! `ClientBuilder`: the one-stop way to configure and open a session.

use std::sync::Arc;
use std::time::Duration;

use multiplay_protocol::{HandlerId, IdWidth, ProtocolError, Response};
use multiplay_session::{
    Clock, DispatchContext, DispatcherBuilder, EventReceiver, Handler, HeartbeatConfig,
    SendDelay, Session, SessionConfig, SystemClock,
};

use crate::MultiplayError;

/// Builder for configuring and connecting a client session.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use multiplay::prelude::*;
///
/// # async fn run() -> Result<(), MultiplayError> {
/// let (mut session, mut events) = ClientBuilder::new("device-1234")
///     .player_id(2)
///     .send_delay(SendDelay::Fixed(Duration::from_millis(50)))
///     .connect("127.0.0.1", 5555)
///     .await?;
///
/// session.send_location(1.0, 2.0).await?.await?;
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: SessionConfig,
    handlers: DispatcherBuilder,
    clock: Arc<dyn Clock>,
}

impl ClientBuilder {
    /// Creates a builder with default settings for `device_id`.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            config: SessionConfig::new(device_id),
            handlers: DispatcherBuilder::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the whole session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Client version reported in the handshake.
    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.config.client_version = version.into();
        self
    }

    /// Avatar selection reported in the handshake.
    pub fn player_id(mut self, player_id: u32) -> Self {
        self.config.player_id = player_id;
        self
    }

    /// Width of the handler id in frame headers.
    pub fn id_width(mut self, width: IdWidth) -> Self {
        self.config.wire.id_width = width;
        self
    }

    /// Largest accepted frame, header included.
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.wire.max_frame_len = len;
        self
    }

    pub fn send_delay(mut self, delay: SendDelay) -> Self {
        self.config.send_delay = delay;
        self
    }

    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.config.heartbeat = heartbeat;
        self
    }

    /// Pings every `interval` after each pong.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat = HeartbeatConfig {
            enabled: true,
            interval,
        };
        self
    }

    /// Stamps sequence numbers on requests from the start.
    pub fn sequencing(mut self, enabled: bool) -> Self {
        self.config.sequencing = enabled;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_capacity = capacity;
        self
    }

    /// Violations tolerated before disconnecting (`0` = unlimited).
    pub fn max_protocol_violations(mut self, max: u32) -> Self {
        self.config.max_protocol_violations = max;
        self
    }

    /// Routes responses for `id` to `handler`, replacing any built-in one.
    pub fn handler(mut self, id: HandlerId, handler: impl Handler) -> Self {
        self.handlers = self.handlers.register(id, handler);
        self
    }

    /// Routes responses for `id` to a closure.
    pub fn handler_fn<F>(mut self, id: HandlerId, f: F) -> Self
    where
        F: Fn(&Response, &DispatchContext<'_>) -> Result<(), ProtocolError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers = self.handlers.register_fn(id, f);
        self
    }

    /// Clock used for ping timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds a disconnected session and its event stream.
    pub fn build(self) -> Result<(Session, EventReceiver), MultiplayError> {
        Ok(Session::new(self.config, self.handlers, self.clock)?)
    }

    /// Builds a session and connects it to `host:port`.
    pub async fn connect(
        self,
        host: &str,
        port: u16,
    ) -> Result<(Session, EventReceiver), MultiplayError> {
        let (mut session, events) = self.build()?;
        tracing::debug!(host, port, device_id = %session.config().device_id, "connecting");
        session.connect(host, port).await?;
        Ok((session, events))
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}
