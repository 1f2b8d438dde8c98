//! Error types for the session layer.

use std::time::Duration;

use multiplay_protocol::ProtocolError;
use multiplay_transport::TransportError;

use crate::SessionState;

/// Errors returned by [`Session`](crate::Session) and
/// [`Outbox`](crate::Outbox) operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The underlying connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or framed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A send was attempted while the session is not `Connected`.
    #[error("session is not connected")]
    NotConnected,

    /// The operation is not allowed in the current state
    /// (e.g. `connect` on a session that is already connected).
    #[error("operation not allowed while {0}")]
    InvalidState(SessionState),

    /// The session was disconnected before the operation completed.
    /// Pending sends resolve to this when their write is abandoned.
    #[error("session closed")]
    Closed,

    /// No TCP connection could be established within the configured time.
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// `host:port` that was dialled.
        addr: String,
        /// The configured limit.
        timeout: Duration,
    },

    /// The [`SessionConfig`](crate::SessionConfig) failed validation.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}
