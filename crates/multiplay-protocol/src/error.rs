//! Error types for the protocol layer.
//!
//! Everything that can go wrong between "bytes arrived" and "typed message
//! in hand" lands here: malformed headers, oversized frames, and payloads
//! that fail to decode with their schema's codec.

use crate::{HandlerId, IdWidth};

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A header declared a total length smaller than the header itself.
    ///
    /// The stream can no longer be trusted to be frame-aligned.
    #[error("invalid frame length {declared} (header alone is {header_size} bytes)")]
    InvalidLength {
        /// The `totalLength` read from the wire.
        declared: u32,
        /// The header size of the active wire format.
        header_size: usize,
    },

    /// A frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge {
        /// Declared or computed total frame size.
        size: usize,
        /// The configured limit.
        max: usize,
    },

    /// A handler id does not fit the configured header field.
    #[error("handler id {id} does not fit a {width:?} header field")]
    HandlerIdOutOfRange {
        /// The offending id.
        id: HandlerId,
        /// The configured width.
        width: IdWidth,
    },

    /// A binary payload could not be decoded (truncated, wrong wire type).
    #[error("binary decode failed: {0}")]
    BinaryDecode(#[from] prost::DecodeError),

    /// A textual payload could not be serialized.
    #[error("text encode failed: {0}")]
    TextEncode(#[source] serde_json::Error),

    /// A textual payload could not be parsed (bad UTF-8, bad JSON, wrong shape).
    #[error("text decode failed: {0}")]
    TextDecode(#[source] serde_json::Error),

    /// A binary payload decoded but a required field was never set.
    #[error("{message} is missing required field `{field}`")]
    MissingField {
        /// Schema name.
        message: &'static str,
        /// Field name.
        field: &'static str,
    },

    /// The message is well-formed but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
