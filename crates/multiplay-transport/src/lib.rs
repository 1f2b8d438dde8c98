//! Transport abstraction layer for Multiplay.
//!
//! Provides the [`Connection`] trait that the session layer drives, and
//! [`TcpConnection`], the stream transport the game server speaks.
//!
//! A connection moves *bytes*, not messages: one `recv` may return half a
//! frame or several frames glued together. Turning that stream back into
//! frames is the protocol layer's job (`FrameAssembler`).

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{READ_CHUNK_SIZE, TcpConnection};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single stream connection that can send and receive bytes.
///
/// Methods take `&self` so that one task can sit in [`recv`](Self::recv)
/// while another task writes. Implementations serialise access to each
/// direction internally.
///
/// The futures are declared `Send` so the session can drive a generic
/// connection from spawned Tokio tasks.
pub trait Connection: Send + Sync + 'static {
    /// Writes all of `data` to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next chunk of bytes from the remote peer.
    ///
    /// Chunk boundaries carry no meaning. Returns `Ok(None)` when the peer
    /// closed the stream cleanly.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the sending side of the connection.
    ///
    /// Closing an already closed connection is not an error.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
