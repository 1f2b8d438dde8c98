//! Byte layout of a frame on the wire.
//!
//! ```text
//! ┌────────────────────────┬──────────────────────┬──────────────────────┐
//! │ totalLength (4B, BE)   │ handlerId (1B or 4B) │ body                 │
//! │ counts all three parts │ big-endian           │ totalLength − header │
//! └────────────────────────┴──────────────────────┴──────────────────────┘
//! ```
//!
//! Multi-byte integers are always written big-endian (`BufMut::put_u32`),
//! so the host's byte order never leaks onto the wire.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{HandlerId, ProtocolError};

/// Size of the `totalLength` field.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Default upper bound on a single frame: 1 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Width of the handler id field in the header.
///
/// Early protocol revisions used a single byte; later revisions
/// widened it to a full `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdWidth {
    /// One byte (ids 0–255).
    #[default]
    U8,
    /// Four bytes, big-endian.
    U32,
}

impl IdWidth {
    /// Number of bytes the field occupies.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U32 => 4,
        }
    }

    /// Largest id representable at this width.
    pub const fn max_id(self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }
}

/// The framing parameters both peers must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFormat {
    /// Width of the handler id field.
    pub id_width: IdWidth,
    /// Largest accepted `totalLength`, header included.
    pub max_frame_len: usize,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self {
            id_width: IdWidth::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl WireFormat {
    /// Default limits with the given id width.
    pub fn with_id_width(id_width: IdWidth) -> Self {
        Self {
            id_width,
            ..Self::default()
        }
    }

    /// Bytes before the body: length field plus handler id.
    pub const fn header_size(&self) -> usize {
        LENGTH_FIELD_SIZE + self.id_width.size()
    }
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Total frame length, header included.
    pub total_len: u32,
    /// Handler id from the header.
    pub handler_id: HandlerId,
}

impl Header {
    /// Length of the body that follows this header.
    pub fn body_len(&self, format: &WireFormat) -> usize {
        (self.total_len as usize).saturating_sub(format.header_size())
    }
}

/// One length-prefixed unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Handler id from the header.
    pub handler_id: HandlerId,
    /// The opaque body bytes.
    pub body: Bytes,
}

impl Frame {
    /// Creates a frame.
    pub fn new(handler_id: HandlerId, body: impl Into<Bytes>) -> Self {
        Self {
            handler_id,
            body: body.into(),
        }
    }

    /// Size of this frame on the wire (header + body).
    pub fn wire_len(&self, format: &WireFormat) -> usize {
        format.header_size() + self.body.len()
    }
}

/// Appends the header for a body of `body_len` bytes to `dst`.
pub fn encode_header(
    body_len: usize,
    handler_id: HandlerId,
    format: &WireFormat,
    dst: &mut BytesMut,
) -> Result<(), ProtocolError> {
    if handler_id.0 > format.id_width.max_id() {
        return Err(ProtocolError::HandlerIdOutOfRange {
            id: handler_id,
            width: format.id_width,
        });
    }

    let total = format
        .header_size()
        .checked_add(body_len)
        .ok_or(ProtocolError::FrameTooLarge {
            size: usize::MAX,
            max: format.max_frame_len,
        })?;
    if total > format.max_frame_len {
        return Err(ProtocolError::FrameTooLarge {
            size: total,
            max: format.max_frame_len,
        });
    }
    let total_len = u32::try_from(total).map_err(|_| ProtocolError::FrameTooLarge {
        size: total,
        max: u32::MAX as usize,
    })?;

    dst.reserve(format.header_size());
    dst.put_u32(total_len);
    match format.id_width {
        IdWidth::U8 => dst.put_u8(handler_id.0 as u8),
        IdWidth::U32 => dst.put_u32(handler_id.0),
    }
    Ok(())
}

/// Reads a header from the front of `src` without consuming anything.
///
/// Returns `Ok(None)` when fewer than `header_size` bytes are available.
pub fn decode_header(
    src: &[u8],
    format: &WireFormat,
) -> Result<Option<Header>, ProtocolError> {
    let header_size = format.header_size();
    if src.len() < header_size {
        return Ok(None);
    }

    let mut cursor = &src[..header_size];
    let total_len = cursor.get_u32();
    let handler_id = HandlerId(match format.id_width {
        IdWidth::U8 => u32::from(cursor.get_u8()),
        IdWidth::U32 => cursor.get_u32(),
    });

    if (total_len as usize) < header_size {
        return Err(ProtocolError::InvalidLength {
            declared: total_len,
            header_size,
        });
    }
    if total_len as usize > format.max_frame_len {
        return Err(ProtocolError::FrameTooLarge {
            size: total_len as usize,
            max: format.max_frame_len,
        });
    }

    Ok(Some(Header {
        total_len,
        handler_id,
    }))
}

/// Appends a complete frame (header + body) to `dst`.
pub fn encode_frame(
    handler_id: HandlerId,
    body: &[u8],
    format: &WireFormat,
    dst: &mut BytesMut,
) -> Result<(), ProtocolError> {
    encode_header(body.len(), handler_id, format, dst)?;
    dst.put_slice(body);
    Ok(())
}
