//! # Multiplay
//!
//! Client side of a length-prefixed binary protocol for multiplayer game
//! servers, over a single TCP connection.
//!
//! Every frame is `totalLength (u32 BE) | handlerId | body`. Requests are
//! protobuf envelopes; responses carry a handler id, a response code, and a
//! body decoded with the codec that handler's schema declares. The
//! [`Session`] keeps the connection, reassembles frames, dispatches
//! responses, and measures latency with ping/pong.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use multiplay::prelude::*;
//!
//! # async fn run() -> Result<(), MultiplayError> {
//! multiplay::logging::init();
//!
//! let (mut session, mut events) = ClientBuilder::new("device-1234")
//!     .connect("127.0.0.1", 5555)
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::HandshakeComplete(init) = event {
//!         println!("spawned at ({}, {})", init.x, init.y);
//!         break;
//!     }
//! }
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod logging;

pub use client::ClientBuilder;
pub use error::MultiplayError;

pub use multiplay_protocol as protocol;
pub use multiplay_session as session;
pub use multiplay_transport as transport;

pub use multiplay_session::Session;

/// Everything a typical client needs.
pub mod prelude {
    pub use crate::{ClientBuilder, MultiplayError};
    pub use multiplay_protocol::{
        HandlerId, IdWidth, InitialResponse, ProtocolError, Response, UserLocation, WireFormat,
        WireMessage,
    };
    pub use multiplay_session::{
        DisconnectReason, DispatchContext, Handler, HeartbeatConfig, LatencySample, SendDelay,
        Session, SessionConfig, SessionError, SessionEvent, SessionState,
    };
    pub use multiplay_transport::TransportError;
}
