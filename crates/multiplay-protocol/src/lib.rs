//! Wire protocol for Multiplay.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Wire format** ([`WireFormat`], [`encode_frame`], [`decode_header`]) —
//!   the length-prefixed byte layout of a frame.
//! - **Reassembly** ([`FrameAssembler`]) — turning arbitrary TCP chunks
//!   back into whole frames.
//! - **Codecs** ([`Codec`], [`ProtoCodec`], [`JsonCodec`], [`WireMessage`]) —
//!   how message schemas become bytes, chosen per message type.
//! - **Schemas** ([`Envelope`], [`Response`], [`InitialPayload`], ...).
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (connection state and handlers). It doesn't know about sockets or tasks.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame → Response) → Session (dispatch)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod assembler;
mod codec;
mod error;
mod handler_id;
mod types;
mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use assembler::{FrameAssembler, Frames};
pub use codec::{Codec, CodecKind, JsonCodec, ProtoCodec, Validate, WireMessage};
pub use error::ProtocolError;
pub use handler_id::HandlerId;
pub use types::{
    Envelope, InitialPayload, InitialResponse, LocationUpdate, LocationUpdatePayload, PingData,
    PingPayload, Response, UserLocation,
};
pub use wire::{
    DEFAULT_MAX_FRAME_LEN, Frame, Header, IdWidth, LENGTH_FIELD_SIZE, WireFormat, decode_header,
    encode_frame, encode_header,
};
