//! Unified error type for the Multiplay client.

use multiplay_protocol::ProtocolError;
use multiplay_session::SessionError;
use multiplay_transport::TransportError;

/// Any error a client application can get back from this crate.
///
/// Session operations already fold transport and protocol failures into
/// [`SessionError`], so a failed `connect` surfaces as
/// `Session(Transport(..))`. The other two variants cover code that uses
/// the lower crates directly (e.g. decoding a frame body by hand).
#[derive(Debug, thiserror::Error)]
pub enum MultiplayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Framing or payload codec failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use multiplay_protocol::{HandlerId, Response, WireMessage};

    use super::*;
    use crate::ClientBuilder;

    #[tokio::test]
    async fn test_connect_refused_is_session_transport_connect_failed() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = ClientBuilder::new("dev")
            .connect("127.0.0.1", port)
            .await
            .unwrap_err();

        let MultiplayError::Session(SessionError::Transport(TransportError::ConnectFailed {
            addr,
            ..
        })) = &err
        else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(addr, &format!("127.0.0.1:{port}"));
        // Transparent wrappers keep the io error reachable.
        assert!(err.source().is_some());
    }

    #[test]
    fn test_truncated_response_body_converts_to_protocol_error() {
        fn decode(bytes: &[u8]) -> Result<Response, MultiplayError> {
            Ok(Response::from_bytes(bytes)?)
        }
        let bytes = Response::success(HandlerId::PING, 7, b"{}".to_vec())
            .to_bytes()
            .unwrap();

        let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();

        assert!(matches!(
            err,
            MultiplayError::Protocol(ProtocolError::BinaryDecode(_))
        ));
    }

    #[test]
    fn test_session_error_display_passes_through() {
        let err = MultiplayError::from(SessionError::NotConnected);
        assert_eq!(err.to_string(), "session is not connected");
    }
}
