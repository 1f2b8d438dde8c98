//! Client session for Multiplay.
//!
//! This crate drives one connection to the game server:
//!
//! 1. **Session** ([`Session`]) — connect, handshake, disconnect, and the
//!    state machine in between.
//! 2. **Send path** ([`Outbox`]) — ordered, optionally delayed writes with a
//!    [`SendReceipt`] per message.
//! 3. **Dispatch** ([`Dispatcher`], [`Handler`]) — a fixed table routing
//!    each decoded response to its handler.
//! 4. **Latency** ([`LatencyTracker`]) — ping/pong round-trip time.
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  ← consumes SessionEvents, calls send/disconnect
//!     ↕
//! Session Layer (this crate)  ← owns the connection and its two tasks
//!     ↕
//! Protocol Layer (below)  ← frames, codecs, schemas
//!     ↕
//! Transport Layer  ← TCP bytes
//! ```

mod config;
mod dispatcher;
mod error;
mod event;
mod handlers;
mod latency;
mod outbox;
mod session;

pub use config::{HeartbeatConfig, SendDelay, SessionConfig};
pub use dispatcher::{DispatchContext, Dispatcher, DispatcherBuilder, Handler, Routed};
pub use error::SessionError;
pub use event::{DisconnectReason, EventReceiver, EventSender, SessionEvent};
pub use handlers::{InitHandler, LocationHandler, PingHandler, builtin_handlers};
pub use latency::{Clock, LatencySample, LatencyState, LatencyTracker, SystemClock};
pub use outbox::{Outbox, SendReceipt};
pub use session::{Session, SessionState};
