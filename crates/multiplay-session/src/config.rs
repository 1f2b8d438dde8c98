//! Session configuration.
//!
//! Plain structs with sensible defaults. Create one with
//! `SessionConfig::new("device-id")` and override only the fields you care
//! about; [`SessionConfig::validate`] runs when the session is built.

use std::time::Duration;

use multiplay_protocol::WireFormat;

use crate::{LatencyTracker, SessionError};

/// Artificial delay applied to every outbound write.
///
/// The delay is a per-message deadline honoured by the writer task; it
/// never blocks the caller or the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendDelay {
    /// Write as soon as the writer reaches the message.
    #[default]
    None,
    /// Hold every message for a fixed duration.
    Fixed(Duration),
    /// Hold every message for the last measured one-way latency
    /// (zero until the first pong arrives).
    MeasuredLatency,
}

impl SendDelay {
    /// The delay to apply to a message enqueued now.
    pub fn resolve(&self, latency: &LatencyTracker) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => *delay,
            Self::MeasuredLatency => latency.current_latency(),
        }
    }
}

/// Ping/pong scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Whether the session pings at all.
    pub enabled: bool,
    /// Time between a pong and the next ping. `Duration::ZERO` pings again
    /// as soon as each pong arrives.
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(1),
        }
    }
}

impl HeartbeatConfig {
    /// No pings.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identity sent in every envelope and in the handshake.
    pub device_id: String,

    /// Client version reported in the handshake.
    pub client_version: String,

    /// Avatar selection reported in the handshake.
    pub player_id: u32,

    /// Frame layout shared with the server.
    pub wire: WireFormat,

    /// Artificial outbound delay.
    pub send_delay: SendDelay,

    /// Ping/pong scheduling.
    pub heartbeat: HeartbeatConfig,

    /// Whether to put sequence numbers on requests before the server has
    /// answered the handshake. The server's answer overrides this.
    pub sequencing: bool,

    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,

    /// Capacity of the outbound queue. A full queue makes `send` wait.
    pub outbound_capacity: usize,

    /// Protocol violations tolerated before the session disconnects.
    /// `0` never disconnects for violations.
    pub max_protocol_violations: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            player_id: 0,
            wire: WireFormat::default(),
            send_delay: SendDelay::default(),
            heartbeat: HeartbeatConfig::default(),
            sequencing: false,
            connect_timeout: Duration::from_secs(5),
            outbound_capacity: 256,
            max_protocol_violations: 3,
        }
    }
}

impl SessionConfig {
    /// Default settings for the given device id.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    /// Checks the settings a session cannot run without.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.device_id.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "device_id must not be empty".into(),
            ));
        }
        if self.outbound_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "outbound_capacity must be at least 1".into(),
            ));
        }
        if self.wire.max_frame_len < self.wire.header_size() {
            return Err(SessionError::InvalidConfig(format!(
                "max_frame_len {} is smaller than the {}-byte header",
                self.wire.max_frame_len,
                self.wire.header_size()
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "connect_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
