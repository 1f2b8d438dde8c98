//! Codec trait and the two payload encodings the server speaks.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The game server answers some messages with a compact binary tagged
//! schema and others with a JSON document, so both encodings sit behind
//! one interface and each message type declares which one it uses (see
//! [`WireMessage`]). Nothing ever switches codecs globally.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// The family of a codec, for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// Protobuf-compatible tagged binary.
    Binary,
    /// UTF-8 JSON.
    Text,
}

/// Encodes values of type `T` to bytes and decodes them back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → a codec is shared by the reader and writer tasks,
///   which Tokio may run on different threads.
/// - `'static` → the codec owns everything it needs, so it can live
///   inside spawned tasks.
///
/// Unlike a serde-style codec, the value type is a parameter of the
/// trait rather than of each method. That lets one codec type
/// ([`ProtoCodec`]) require `prost::Message` while the other
/// ([`JsonCodec`]) requires `Serialize`.
pub trait Codec<T>: Send + Sync + 'static {
    /// Which family this codec belongs to.
    const KIND: CodecKind;

    /// Serializes a value into bytes.
    fn encode(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Truncated input, mismatched field types, invalid UTF-8 and missing
    /// required fields all come back as a [`ProtocolError`]; decoding never
    /// panics on hostile input.
    fn decode(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// Post-decode check for schemas with required fields.
///
/// Protobuf decoding accepts a message with any field missing. Schemas
/// whose fields are mandatory implement this to turn an absent field into
/// [`ProtocolError::MissingField`].
pub trait Validate {
    /// Returns an error if a required field is absent.
    fn validate(&self) -> Result<(), ProtocolError>;
}

// ---------------------------------------------------------------------------
// ProtoCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] for the binary tagged schema (via `prost`).
///
/// Field tags and wire types follow protobuf, so the bytes interoperate
/// with any protobuf implementation the server uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoCodec;

impl<T> Codec<T> for ProtoCodec
where
    T: prost::Message + Default + Validate,
{
    const KIND: CodecKind = CodecKind::Binary;

    fn encode(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        // Encoding into a Vec cannot run out of space.
        Ok(prost::Message::encode_to_vec(value))
    }

    fn decode(&self, data: &[u8]) -> Result<T, ProtocolError> {
        let value = <T as prost::Message>::decode(data)?;
        value.validate()?;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] for UTF-8 JSON documents (via `serde_json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    const KIND: CodecKind = CodecKind::Text;

    fn encode(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::TextEncode)
    }

    fn decode(&self, data: &[u8]) -> Result<T, ProtocolError> {
        // `from_slice` validates UTF-8 itself and reports it as a
        // syntax error.
        serde_json::from_slice(data).map_err(ProtocolError::TextDecode)
    }
}

// ---------------------------------------------------------------------------
// WireMessage
// ---------------------------------------------------------------------------

/// A schema type that knows its own codec.
///
/// ```rust
/// use multiplay_protocol::{CodecKind, LocationUpdatePayload, PingData, WireMessage};
///
/// assert_eq!(LocationUpdatePayload::codec_kind(), CodecKind::Binary);
/// assert_eq!(PingData::codec_kind(), CodecKind::Text);
///
/// let bytes = LocationUpdatePayload::new(1.5, -2.0).to_bytes().unwrap();
/// let back = LocationUpdatePayload::from_bytes(&bytes).unwrap();
/// assert_eq!(back.x, Some(1.5));
/// ```
pub trait WireMessage: Sized {
    /// The codec this schema is encoded with.
    type Codec: Codec<Self> + Default;

    /// Encodes `self` with its codec.
    fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Self::Codec::default().encode(self)
    }

    /// Decodes a value of this type with its codec.
    fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        Self::Codec::default().decode(data)
    }

    /// Binary or text.
    fn codec_kind() -> CodecKind {
        <Self::Codec as Codec<Self>>::KIND
    }
}
