//! Message schemas exchanged with the game server.
//!
//! Requests travel as an [`Envelope`] whose `payload` holds one of the
//! request schemas; every reply arrives as a [`Response`] whose `data`
//! holds a handler-specific document. Which codec decodes that document
//! is a property of its type ([`WireMessage::Codec`]):
//!
//! - binary (protobuf): [`Envelope`], [`Response`], [`InitialPayload`],
//!   [`LocationUpdatePayload`], [`PingPayload`], [`LocationUpdate`]
//! - JSON: [`InitialResponse`], [`PingData`]
//!
//! Binary schemas use explicit protobuf tags. Fields the server treats as
//! required are `Option`s checked by [`Validate`], so a peer that omits
//! one gets [`ProtocolError::MissingField`] instead of a silent zero.

use serde::{Deserialize, Serialize};

use crate::codec::{JsonCodec, ProtoCodec, Validate, WireMessage};
use crate::{HandlerId, ProtocolError};

/// Returns `MissingField` when `field` is `None`.
fn require<T>(
    value: &Option<T>,
    message: &'static str,
    field: &'static str,
) -> Result<(), ProtocolError> {
    match value {
        Some(_) => Ok(()),
        None => Err(ProtocolError::MissingField { message, field }),
    }
}

// ---------------------------------------------------------------------------
// Envelope / Response
// ---------------------------------------------------------------------------

/// The wrapper around every outbound request body.
///
/// `prost::Message` derives `Default` and `Debug` on its own, so only
/// `Clone` and `PartialEq` are listed.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    /// Device id of the sender.
    #[prost(string, optional, tag = "1")]
    pub user_id: Option<String>,
    /// Per-session sequence number, present only when negotiated.
    #[prost(uint32, optional, tag = "2")]
    pub sequence: Option<u32>,
    /// The encoded request schema.
    #[prost(bytes = "vec", tag = "3")]
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Wraps already-encoded payload bytes.
    pub fn new(user_id: impl Into<String>, sequence: Option<u32>, payload: Vec<u8>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            sequence,
            payload,
        }
    }

    /// Encodes `message` with its own codec and wraps it.
    pub fn wrap<M: WireMessage>(
        user_id: impl Into<String>,
        sequence: Option<u32>,
        message: &M,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(user_id, sequence, message.to_bytes()?))
    }
}

impl Validate for Envelope {
    fn validate(&self) -> Result<(), ProtocolError> {
        require(&self.user_id, "Envelope", "userId")
    }
}

impl WireMessage for Envelope {
    type Codec = ProtoCodec;
}

/// The wrapper around every inbound message.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    /// Which handler the body is for.
    #[prost(uint32, tag = "1")]
    pub handler_id: u32,
    /// 0 on success; anything else is an application error.
    #[prost(uint32, tag = "2")]
    pub response_code: u32,
    /// Server time in milliseconds.
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    /// Handler-specific document.
    #[prost(bytes = "vec", tag = "4")]
    pub data: Vec<u8>,
    /// Echo of the request's sequence number, if any.
    #[prost(uint32, optional, tag = "5")]
    pub sequence: Option<u32>,
}

impl Response {
    /// A successful response carrying `data`.
    pub fn success(handler_id: HandlerId, timestamp: i64, data: Vec<u8>) -> Self {
        Self {
            handler_id: handler_id.0,
            response_code: 0,
            timestamp,
            data,
            sequence: None,
        }
    }

    /// An error response with an empty body.
    pub fn failure(handler_id: HandlerId, response_code: u32, timestamp: i64) -> Self {
        Self {
            handler_id: handler_id.0,
            response_code,
            timestamp,
            data: Vec::new(),
            sequence: None,
        }
    }

    /// The handler id as a typed value.
    pub fn handler(&self) -> HandlerId {
        HandlerId(self.handler_id)
    }

    /// Whether `response_code` signals success.
    pub fn is_success(&self) -> bool {
        self.response_code == 0
    }

    /// Decodes `data` as `M`.
    pub fn decode_data<M: WireMessage>(&self) -> Result<M, ProtocolError> {
        M::from_bytes(&self.data)
    }
}

impl Validate for Response {
    fn validate(&self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

impl WireMessage for Response {
    type Codec = ProtoCodec;
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Handshake request (INIT): who this client is.
#[derive(Clone, PartialEq, prost::Message)]
pub struct InitialPayload {
    #[prost(string, optional, tag = "1")]
    pub device_id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub client_version: Option<String>,
    #[prost(uint32, optional, tag = "3")]
    pub player_id: Option<u32>,
}

impl InitialPayload {
    /// Builds a handshake with every required field set.
    pub fn new(
        device_id: impl Into<String>,
        client_version: impl Into<String>,
        player_id: u32,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            client_version: Some(client_version.into()),
            player_id: Some(player_id),
        }
    }
}

impl Validate for InitialPayload {
    fn validate(&self) -> Result<(), ProtocolError> {
        require(&self.device_id, "InitialPayload", "deviceId")?;
        require(&self.client_version, "InitialPayload", "clientVersion")?;
        require(&self.player_id, "InitialPayload", "playerId")
    }
}

impl WireMessage for InitialPayload {
    type Codec = ProtoCodec;
}

/// "I moved to (x, y)" (LOCATION_UPDATE_PAYLOAD).
#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationUpdatePayload {
    #[prost(float, optional, tag = "1")]
    pub x: Option<f32>,
    #[prost(float, optional, tag = "2")]
    pub y: Option<f32>,
}

impl LocationUpdatePayload {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }
}

impl Validate for LocationUpdatePayload {
    fn validate(&self) -> Result<(), ProtocolError> {
        require(&self.x, "LocationUpdatePayload", "x")?;
        require(&self.y, "LocationUpdatePayload", "y")
    }
}

impl WireMessage for LocationUpdatePayload {
    type Codec = ProtoCodec;
}

/// Ping request carrying the client's send time in milliseconds.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PingPayload {
    #[prost(int64, optional, tag = "1")]
    pub timestamp: Option<i64>,
}

impl PingPayload {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
        }
    }
}

impl Validate for PingPayload {
    fn validate(&self) -> Result<(), ProtocolError> {
        require(&self.timestamp, "PingPayload", "timestamp")
    }
}

impl WireMessage for PingPayload {
    type Codec = ProtoCodec;
}

// ---------------------------------------------------------------------------
// Response documents
// ---------------------------------------------------------------------------

/// Positions of every user in the world (LOCATION_UPDATE).
#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationUpdate {
    #[prost(message, repeated, tag = "1")]
    pub users: Vec<UserLocation>,
}

impl Validate for LocationUpdate {
    fn validate(&self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

impl WireMessage for LocationUpdate {
    type Codec = ProtoCodec;
}

/// One entry of a [`LocationUpdate`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct UserLocation {
    /// The user's device id.
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(uint32, tag = "2")]
    pub player_id: u32,
    #[prost(float, tag = "3")]
    pub x: f32,
    #[prost(float, tag = "4")]
    pub y: f32,
}

/// Handshake answer (INIT), sent as JSON.
///
/// `#[serde(rename_all = "camelCase")]` maps `user_id` to the server's
/// `userId` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user_id: String,
    pub x: f32,
    pub y: f32,
    /// Whether the server wants sequence numbers on requests. Absent
    /// means the server did not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequencing: Option<bool>,
}

impl WireMessage for InitialResponse {
    type Codec = JsonCodec;
}

/// Pong document (PING), sent as JSON. Carries the ping's timestamp back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: i64,
}

impl WireMessage for PingData {
    type Codec = JsonCodec;
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::CodecKind;
    use crate::wire::{IdWidth, WireFormat, encode_frame};
    use crate::FrameAssembler;

    #[test]
    fn test_envelope_handshake_through_frame_preserves_sender() {
        for format in [WireFormat::default(), WireFormat::with_id_width(IdWidth::U32)] {
            let handshake = InitialPayload::new("abc12", "1.0.0", 3);
            let envelope = Envelope::wrap("abc12", None, &handshake).unwrap();
            let mut buf = BytesMut::new();
            encode_frame(HandlerId::INIT, &envelope.to_bytes().unwrap(), &format, &mut buf)
                .unwrap();

            let mut assembler = FrameAssembler::new(format);
            let frame = assembler.feed(&buf).next().unwrap().unwrap();
            let decoded = Envelope::from_bytes(&frame.body).unwrap();

            assert_eq!(frame.handler_id, HandlerId::INIT);
            assert_eq!(decoded.user_id.as_deref(), Some("abc12"));
            assert_eq!(decoded.sequence, None);
            let inner = InitialPayload::from_bytes(&decoded.payload).unwrap();
            assert_eq!(inner, handshake);
        }
    }

    #[test]
    fn test_envelope_sequence_present_only_when_set() {
        let without = Envelope::new("dev", None, vec![1]).to_bytes().unwrap();
        let with = Envelope::new("dev", Some(7), vec![1]).to_bytes().unwrap();

        assert!(with.len() > without.len());
        assert_eq!(Envelope::from_bytes(&with).unwrap().sequence, Some(7));
    }

    #[test]
    fn test_envelope_decode_without_user_id_is_missing_field() {
        let bytes = Envelope {
            user_id: None,
            sequence: None,
            payload: vec![9],
        }
        .to_bytes()
        .unwrap();

        let result = Envelope::from_bytes(&bytes);

        assert!(matches!(
            result,
            Err(ProtocolError::MissingField {
                message: "Envelope",
                field: "userId"
            })
        ));
    }

    #[test]
    fn test_location_payload_missing_y_is_missing_field() {
        let partial = LocationUpdatePayload {
            x: Some(1.0),
            y: None,
        };
        let bytes = partial.to_bytes().unwrap();

        let result = LocationUpdatePayload::from_bytes(&bytes);

        assert!(matches!(
            result,
            Err(ProtocolError::MissingField { field: "y", .. })
        ));
    }

    #[test]
    fn test_location_payload_zero_coordinates_still_present() {
        // Explicit optional fields keep 0.0 on the wire.
        let bytes = LocationUpdatePayload::new(0.0, 0.0).to_bytes().unwrap();
        let back = LocationUpdatePayload::from_bytes(&bytes).unwrap();
        assert_eq!(back, LocationUpdatePayload::new(0.0, 0.0));
    }

    #[test]
    fn test_response_truncated_bytes_is_binary_decode_error() {
        let mut bytes = Response::success(HandlerId::PING, 5, b"{\"timestamp\":5}".to_vec())
            .to_bytes()
            .unwrap();
        bytes.truncate(bytes.len() - 3);

        let result = Response::from_bytes(&bytes);

        assert!(matches!(result, Err(ProtocolError::BinaryDecode(_))));
    }

    #[test]
    fn test_response_helpers() {
        let ok = Response::success(HandlerId::LOCATION_UPDATE, 10, Vec::new());
        let err = Response::failure(HandlerId::INIT, 42, 10);

        assert!(ok.is_success());
        assert_eq!(ok.handler(), HandlerId::LOCATION_UPDATE);
        assert!(!err.is_success());
        assert_eq!(err.response_code, 42);
    }

    #[test]
    fn test_location_update_decodes_users() {
        let update = LocationUpdate {
            users: vec![
                UserLocation {
                    id: "a".into(),
                    player_id: 1,
                    x: 1.0,
                    y: 2.0,
                },
                UserLocation {
                    id: "b".into(),
                    player_id: 2,
                    x: -3.5,
                    y: 4.25,
                },
            ],
        };
        let response =
            Response::success(HandlerId::LOCATION_UPDATE, 0, update.to_bytes().unwrap());

        let decoded: LocationUpdate = response.decode_data().unwrap();

        assert_eq!(decoded, update);
    }

    #[test]
    fn test_location_update_empty_bytes_is_empty_list() {
        let decoded = LocationUpdate::from_bytes(&[]).unwrap();
        assert!(decoded.users.is_empty());
    }

    #[test]
    fn test_initial_response_parses_camel_case_json() {
        let json = br#"{"message":"welcome","userId":"abc12","x":1.5,"y":-2}"#;

        let decoded = InitialResponse::from_bytes(json).unwrap();

        assert_eq!(decoded.user_id, "abc12");
        assert_eq!(decoded.x, 1.5);
        assert_eq!(decoded.y, -2.0);
        assert_eq!(decoded.message.as_deref(), Some("welcome"));
        assert_eq!(decoded.sequencing, None);
    }

    #[test]
    fn test_ping_data_parses_json() {
        let decoded = PingData::from_bytes(br#"{"timestamp":1700000000123}"#).unwrap();
        assert_eq!(decoded.timestamp, 1_700_000_000_123);
        assert!(decoded.message.is_none());
    }

    #[test]
    fn test_json_invalid_utf8_is_text_decode_error() {
        let result = PingData::from_bytes(&[b'{', 0xFF, 0xFE, b'}']);
        assert!(matches!(result, Err(ProtocolError::TextDecode(_))));
    }

    #[test]
    fn test_json_missing_user_id_is_text_decode_error() {
        let result = InitialResponse::from_bytes(br#"{"x":1,"y":2}"#);
        assert!(matches!(result, Err(ProtocolError::TextDecode(_))));
    }

    #[test]
    fn test_codec_kind_is_per_message_type() {
        assert_eq!(Envelope::codec_kind(), CodecKind::Binary);
        assert_eq!(Response::codec_kind(), CodecKind::Binary);
        assert_eq!(InitialPayload::codec_kind(), CodecKind::Binary);
        assert_eq!(PingPayload::codec_kind(), CodecKind::Binary);
        assert_eq!(LocationUpdate::codec_kind(), CodecKind::Binary);
        assert_eq!(InitialResponse::codec_kind(), CodecKind::Text);
        assert_eq!(PingData::codec_kind(), CodecKind::Text);
    }
}
