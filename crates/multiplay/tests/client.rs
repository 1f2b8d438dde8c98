//! Integration tests for the full client flow against an in-process server.
//!
//! The fake server speaks the real wire format over loopback TCP: it reads
//! framed envelopes from the client and answers with framed responses.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use multiplay::prelude::*;
use multiplay::protocol::{
    Envelope, FrameAssembler, InitialPayload, LocationUpdate, LocationUpdatePayload, PingData,
    PingPayload, encode_frame,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Fake server
// =========================================================================

/// The server side of one accepted connection.
struct ServerConn {
    stream: TcpStream,
    assembler: FrameAssembler,
    pending: VecDeque<(HandlerId, Envelope)>,
    format: WireFormat,
}

impl ServerConn {
    /// Reads until one complete request is available.
    async fn next_request(&mut self) -> (HandlerId, Envelope) {
        loop {
            if let Some(request) = self.pending.pop_front() {
                return request;
            }
            let mut buf = [0u8; 1024];
            let n = self.stream.read(&mut buf).await.expect("server read");
            assert!(n > 0, "client closed the connection");
            for frame in self.assembler.feed(&buf[..n]) {
                let frame = frame.expect("client sent a valid frame");
                let envelope = Envelope::from_bytes(&frame.body).expect("valid envelope");
                self.pending.push_back((frame.handler_id, envelope));
            }
        }
    }

    /// Reads requests until one for `id` arrives, skipping pings.
    async fn next_request_for(&mut self, id: HandlerId) -> Envelope {
        loop {
            let (handler_id, envelope) = self.next_request().await;
            if handler_id == id {
                return envelope;
            }
        }
    }

    async fn respond(&mut self, response: &Response) {
        self.write_frame(response.handler(), &response.to_bytes().unwrap())
            .await;
    }

    async fn write_frame(&mut self, id: HandlerId, body: &[u8]) {
        let mut buf = BytesMut::new();
        encode_frame(id, body, &self.format, &mut buf).unwrap();
        self.stream.write_all(&buf).await.expect("server write");
    }

    /// Answers the client's handshake.
    async fn complete_handshake(&mut self, sequencing: Option<bool>) -> InitialPayload {
        let envelope = self.next_request_for(HandlerId::INIT).await;
        let handshake = InitialPayload::from_bytes(&envelope.payload).unwrap();
        let init = InitialResponse {
            message: Some("welcome".into()),
            user_id: handshake.device_id.clone().unwrap_or_default(),
            x: 0.5,
            y: -0.5,
            sequencing,
        };
        self.respond(&Response::success(
            HandlerId::INIT,
            0,
            init.to_bytes().unwrap(),
        ))
        .await;
        handshake
    }
}

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn accept(listener: &TcpListener, format: WireFormat) -> ServerConn {
    let (stream, _) = listener.accept().await.unwrap();
    ServerConn {
        stream,
        assembler: FrameAssembler::new(format),
        pending: VecDeque::new(),
        format,
    }
}

/// Connects a client built from `builder` and accepts it on the server.
async fn connect_pair(
    builder: ClientBuilder,
    format: WireFormat,
) -> (Session, UnboundedReceiver<SessionEvent>, ServerConn) {
    let (listener, port) = listen().await;
    let (client, server) = tokio::join!(
        builder.connect("127.0.0.1", port),
        accept(&listener, format)
    );
    let (session, events) = client.expect("client should connect");
    (session, events, server)
}

async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

fn quiet_client(device_id: &str) -> ClientBuilder {
    ClientBuilder::new(device_id)
        .client_version("1.2.3")
        .player_id(4)
        .heartbeat(HeartbeatConfig::disabled())
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connect_sends_handshake_and_receives_initial_response() {
    let (mut session, mut events, mut server) =
        connect_pair(quiet_client("abc12"), WireFormat::default()).await;
    assert_eq!(session.state(), SessionState::Connected);

    let handshake = server.complete_handshake(None).await;

    assert_eq!(handshake, InitialPayload::new("abc12", "1.2.3", 4));
    match next_event(&mut events).await {
        SessionEvent::HandshakeComplete(init) => {
            assert_eq!(init.user_id, "abc12");
            assert_eq!(init.x, 0.5);
            assert_eq!(init.y, -0.5);
        }
        other => panic!("expected handshake, got {other:?}"),
    }
    session.disconnect().await;
}

#[tokio::test]
async fn test_location_update_round_trip() {
    let (mut session, mut events, mut server) =
        connect_pair(quiet_client("abc12"), WireFormat::default()).await;
    server.complete_handshake(None).await;
    next_event(&mut events).await;

    session.send_location(3.25, -7.5).await.unwrap().await.unwrap();
    let request = server
        .next_request_for(HandlerId::LOCATION_UPDATE_PAYLOAD)
        .await;
    let payload = LocationUpdatePayload::from_bytes(&request.payload).unwrap();
    assert_eq!(request.user_id.as_deref(), Some("abc12"));
    assert_eq!(payload, LocationUpdatePayload::new(3.25, -7.5));

    let users = vec![UserLocation {
        id: "abc12".into(),
        player_id: 4,
        x: 3.25,
        y: -7.5,
    }];
    let update = LocationUpdate {
        users: users.clone(),
    };
    server
        .respond(&Response::success(
            HandlerId::LOCATION_UPDATE,
            0,
            update.to_bytes().unwrap(),
        ))
        .await;

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::LocationUpdated(users)
    );
    session.disconnect().await;
}

#[tokio::test]
async fn test_application_error_keeps_connection_open() {
    let (mut session, mut events, mut server) =
        connect_pair(quiet_client("abc12"), WireFormat::default()).await;
    server.complete_handshake(None).await;
    next_event(&mut events).await;

    server
        .respond(&Response::failure(HandlerId::LOCATION_UPDATE, 3, 99))
        .await;

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::ApplicationError {
            handler_id: HandlerId::LOCATION_UPDATE,
            response_code: 3,
            timestamp: 99,
        }
    );
    assert_eq!(session.state(), SessionState::Connected);

    session.send_location(1.0, 1.0).await.unwrap().await.unwrap();
    server
        .next_request_for(HandlerId::LOCATION_UPDATE_PAYLOAD)
        .await;
    session.disconnect().await;
}

#[tokio::test]
async fn test_unknown_handler_id_is_ignored() {
    let (mut session, mut events, mut server) =
        connect_pair(quiet_client("abc12"), WireFormat::default()).await;
    server.complete_handshake(None).await;
    next_event(&mut events).await;

    server
        .respond(&Response::success(HandlerId(42), 0, b"mystery".to_vec()))
        .await;
    server
        .respond(&Response::success(
            HandlerId::LOCATION_UPDATE,
            0,
            Vec::new(),
        ))
        .await;

    // The next event is the location update: nothing came from id 42.
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::LocationUpdated(Vec::new())
    );
    assert_eq!(session.state(), SessionState::Connected);
    session.disconnect().await;
}

#[tokio::test]
async fn test_application_handler_receives_custom_id() {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = hits.clone();
    let builder = quiet_client("abc12").handler_fn(HandlerId(42), move |response, _ctx| {
        assert_eq!(response.data, b"mystery");
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let (mut session, mut events, mut server) =
        connect_pair(builder, WireFormat::default()).await;
    server.complete_handshake(None).await;
    next_event(&mut events).await;

    server
        .respond(&Response::success(HandlerId(42), 0, b"mystery".to_vec()))
        .await;
    server
        .respond(&Response::success(HandlerId::LOCATION_UPDATE, 0, Vec::new()))
        .await;
    next_event(&mut events).await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    session.disconnect().await;
}

#[tokio::test]
async fn test_ping_pong_updates_latency() {
    let builder = quiet_client("abc12").heartbeat_interval(Duration::from_secs(3600));
    let (mut session, mut events, mut server) =
        connect_pair(builder, WireFormat::default()).await;
    server.complete_handshake(None).await;
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::HandshakeComplete(_)
    ));

    // The first ping follows the handshake answer.
    let request = server.next_request_for(HandlerId::PING).await;
    let ping = PingPayload::from_bytes(&request.payload).unwrap();
    let t0 = ping.timestamp.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let pong = PingData {
        message: None,
        timestamp: t0,
    };
    server
        .respond(&Response::success(HandlerId::PING, t0, pong.to_bytes().unwrap()))
        .await;

    match next_event(&mut events).await {
        SessionEvent::LatencyUpdated(sample) => {
            assert!(sample.rtt_millis >= 20, "rtt {}", sample.rtt_millis);
            assert_eq!(sample.latency_millis, sample.rtt_millis / 2);
        }
        other => panic!("expected latency, got {other:?}"),
    }
    let latency = session.latency();
    assert_eq!(latency.last_ping_sent_at_millis, Some(t0));
    assert!(latency.last_rtt_millis.is_some());
    session.disconnect().await;
}

#[tokio::test]
async fn test_server_hang_up_disconnects_session() {
    let (session, mut events, mut server) =
        connect_pair(quiet_client("abc12"), WireFormat::default()).await;
    server.complete_handshake(None).await;
    next_event(&mut events).await;

    drop(server);

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Disconnected(DisconnectReason::ClosedByPeer)
    );
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(
        session.send_location(0.0, 0.0).await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn test_wide_handler_ids_and_negotiated_sequencing() {
    let format = WireFormat::with_id_width(IdWidth::U32);
    let builder = quiet_client("abc12").id_width(IdWidth::U32);
    let (mut session, mut events, mut server) = connect_pair(builder, format).await;

    server.complete_handshake(Some(true)).await;
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::HandshakeComplete(_)
    ));

    session.send_location(1.0, 2.0).await.unwrap().await.unwrap();
    session.send_location(3.0, 4.0).await.unwrap().await.unwrap();

    let first = server
        .next_request_for(HandlerId::LOCATION_UPDATE_PAYLOAD)
        .await;
    let second = server
        .next_request_for(HandlerId::LOCATION_UPDATE_PAYLOAD)
        .await;
    assert_eq!(first.sequence, Some(0));
    assert_eq!(second.sequence, Some(1));
    session.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_closes_socket_for_server() {
    let (mut session, _events, mut server) =
        connect_pair(quiet_client("abc12"), WireFormat::default()).await;
    server.next_request_for(HandlerId::INIT).await;

    session.disconnect().await;

    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(5), server.stream.read(&mut buf))
        .await
        .expect("server should see EOF")
        .expect("read");
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_connect_refused_returns_transport_error() {
    let (listener, port) = listen().await;
    drop(listener);

    let result = quiet_client("abc12").connect("127.0.0.1", port).await;

    assert!(matches!(
        result,
        Err(MultiplayError::Session(SessionError::Transport(
            TransportError::ConnectFailed { .. }
        )))
    ));
}
