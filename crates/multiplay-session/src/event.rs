//! Notifications from a session to the application.

use multiplay_protocol::{HandlerId, InitialResponse, UserLocation};
use tokio::sync::mpsc;

use crate::LatencySample;

/// Something the application may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The server answered the handshake.
    HandshakeComplete(InitialResponse),

    /// The server broadcast everyone's position. May be empty.
    LocationUpdated(Vec<UserLocation>),

    /// A pong arrived.
    LatencyUpdated(LatencySample),

    /// The server answered with a non-zero response code. The connection
    /// stays open.
    ApplicationError {
        handler_id: HandlerId,
        response_code: u32,
        timestamp: i64,
    },

    /// A frame was dropped because it could not be decoded or handled.
    ProtocolViolation {
        /// Rendered [`ProtocolError`](multiplay_protocol::ProtocolError).
        error: String,
    },

    /// The session reached `Disconnected`. Sent once per connection.
    Disconnected(DisconnectReason),
}

/// Why a session disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called.
    Requested,
    /// The server closed the stream.
    ClosedByPeer,
    /// A read or write failed.
    Transport(String),
    /// Too many undecodable frames.
    ProtocolViolations { count: u32 },
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => f.write_str("disconnect requested"),
            Self::ClosedByPeer => f.write_str("closed by peer"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::ProtocolViolations { count } => {
                write!(f, "{count} protocol violations")
            }
        }
    }
}

/// Sending half of the event stream.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiving half of the event stream, handed to the application.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;
