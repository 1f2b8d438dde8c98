//! Integration tests for the TCP transport.
//!
//! These tests open real loopback sockets so that we exercise the actual
//! split read/write halves, not a mock.

use multiplay_transport::{Connection, TcpConnection, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Binds a listener on a random port and returns it with its port.
async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

#[tokio::test]
async fn test_tcp_connect_send_and_receive() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("should accept");
        let mut buf = [0u8; 17];
        stream.read_exact(&mut buf).await.expect("read");
        assert_eq!(&buf, b"hello from client");
        stream.write_all(b"hello from server").await.expect("write");
        stream
    });

    let conn = TcpConnection::connect("127.0.0.1", port)
        .await
        .expect("should connect");
    assert!(conn.id().into_inner() > 0);

    conn.send(b"hello from client").await.expect("send");

    // TCP may split the reply; collect until we have all of it.
    let mut received = Vec::new();
    while received.len() < 17 {
        let chunk = conn.recv().await.expect("recv").expect("data");
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, b"hello from server");

    drop(server.await.expect("server task"));
}

#[tokio::test]
async fn test_tcp_recv_returns_none_when_peer_closes() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("should accept");
        drop(stream);
    });

    let conn = TcpConnection::connect("127.0.0.1", port)
        .await
        .expect("should connect");
    server.await.expect("server task");

    let result = conn.recv().await.expect("recv should not error");
    assert!(result.is_none(), "should return None on peer close");
}

#[tokio::test]
async fn test_tcp_close_sends_eof_and_is_idempotent() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("should accept");
        let mut buf = Vec::new();
        // read_to_end only returns once the client half-closes.
        stream.read_to_end(&mut buf).await.expect("read");
        buf
    });

    let conn = TcpConnection::connect("127.0.0.1", port)
        .await
        .expect("should connect");
    conn.send(b"bye").await.expect("send");
    conn.close().await.expect("first close");
    conn.close().await.expect("second close is harmless");

    let seen = server.await.expect("server task");
    assert_eq!(seen, b"bye");
}

#[tokio::test]
async fn test_tcp_connect_refused_returns_connect_failed() {
    // Grab a free port, then release it so nothing is listening there.
    let (listener, port) = listen().await;
    drop(listener);

    let result = TcpConnection::connect("127.0.0.1", port).await;

    match result {
        Err(TransportError::ConnectFailed { addr, .. }) => {
            assert_eq!(addr, format!("127.0.0.1:{port}"));
        }
        Err(other) => panic!("expected ConnectFailed, got {other:?}"),
        Ok(_) => panic!("connect should fail"),
    }
}
