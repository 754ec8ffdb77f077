//! End-to-end tests for the bridge over real sockets.
//!
//! Each test binds the bridge on an ephemeral loopback port with
//! [`serve`], points it at a backend `TcpListener` owned by the test, and
//! talks to it with a `tokio-tungstenite` client:
//!
//! ```text
//! test client ──ws──► bridge (serve) ──tcp──► test backend listener
//! ```
//!
//! The bridge connects to the backend only after the WebSocket handshake, so
//! a test can `connect_async` first and then `accept()` on the backend
//! listener to get the matching backend socket.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ws_line_bridge::domain::BridgeConfig;
use ws_line_bridge::infrastructure::serve;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(5);

// ── Harness ───────────────────────────────────────────────────────────────────

struct Bridge {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    task: JoinHandle<anyhow::Result<()>>,
}

async fn start_bridge(backend_addr: SocketAddr) -> Bridge {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = BridgeConfig {
        listen_addr: addr,
        backend_addr,
        ..BridgeConfig::default()
    };
    let running = Arc::new(AtomicBool::new(true));
    let task = tokio::spawn(serve(listener, config, Arc::clone(&running)));
    Bridge {
        addr,
        running,
        task,
    }
}

async fn connect(bridge: &Bridge) -> Client {
    let (client, _response) = timeout(STEP, connect_async(format!("ws://{}", bridge.addr)))
        .await
        .expect("handshake timed out")
        .expect("handshake failed");
    client
}

async fn accept_backend(listener: &TcpListener) -> TcpStream {
    let (stream, _) = timeout(STEP, listener.accept())
        .await
        .expect("bridge never connected to the backend")
        .unwrap();
    stream
}

async fn next_text(client: &mut Client) -> String {
    match timeout(STEP, client.next()).await.expect("no message") {
        Some(Ok(Message::Text(text))) => text,
        other => panic!("expected text frame, got {other:?}"),
    }
}

/// Spawns a backend that echoes every line it receives, padded with spaces.
async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply = format!("  {line}  \n");
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

// ── Relay behaviour ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_round_trip_through_echo_backend_returns_trimmed_message() {
    // Arrange
    let backend_addr = start_echo_backend().await;
    let bridge = start_bridge(backend_addr).await;
    let mut client = connect(&bridge).await;

    // Act
    client
        .send(Message::Text(" hello world ".to_string()))
        .await
        .unwrap();

    // Assert: padding added by the backend and by us is stripped on return
    assert_eq!(next_text(&mut client).await, "hello world");
}

#[tokio::test]
async fn test_client_message_arrives_as_exact_bytes_with_newline() {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = start_bridge(backend.local_addr().unwrap()).await;
    let mut client = connect(&bridge).await;
    let mut backend_stream = accept_backend(&backend).await;

    client.send(Message::Text("hello".to_string())).await.unwrap();

    let mut buf = [0u8; 6];
    timeout(STEP, backend_stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"hello\n");
}

#[tokio::test]
async fn test_backend_chunk_with_partial_line_yields_complete_lines_only() {
    // Arrange
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = start_bridge(backend.local_addr().unwrap()).await;
    let mut client = connect(&bridge).await;
    let mut backend_stream = accept_backend(&backend).await;

    // Act
    backend_stream.write_all(b"a\nb\nc").await.unwrap();

    // Assert
    assert_eq!(next_text(&mut client).await, "a");
    assert_eq!(next_text(&mut client).await, "b");

    // "c" was held back until its delimiter arrives.
    backend_stream.write_all(b"\n\n").await.unwrap();
    assert_eq!(next_text(&mut client).await, "c");
    assert_eq!(next_text(&mut client).await, "");
}

// ── Closure propagation ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_client_close_tears_down_backend_connection() {
    // Arrange
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = start_bridge(backend.local_addr().unwrap()).await;
    let mut client = connect(&bridge).await;
    let mut backend_stream = accept_backend(&backend).await;

    // Act
    client.close(None).await.unwrap();

    // Assert: the backend observes the abort (EOF or reset)
    let mut buf = [0u8; 16];
    match timeout(STEP, backend_stream.read(&mut buf)).await.unwrap() {
        Ok(n) => assert_eq!(n, 0, "no data expected after the client left"),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }
}

#[tokio::test]
async fn test_client_close_with_unread_backlog_still_aborts_backend_promptly() {
    // Arrange: flood the client until its socket is full, without reading
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = start_bridge(backend.local_addr().unwrap()).await;
    let mut client = connect(&bridge).await;
    let (mut backend_read, mut backend_write) = accept_backend(&backend).await.into_split();

    let line = format!("{}\n", "x".repeat(1023));
    let flood = line.repeat(32 * 1024).into_bytes();
    tokio::spawn(async move {
        let _ = backend_write.write_all(&flood).await;
    });
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Act
    client.close(None).await.unwrap();

    // Assert: the backend goes away well before the browser close could flush
    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_secs(2), backend_read.read(&mut buf))
        .await
        .expect("backend was held open by the stalled browser");
    match read {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }
}

#[tokio::test]
async fn test_backend_close_sends_normal_close_to_client() {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = start_bridge(backend.local_addr().unwrap()).await;
    let mut client = connect(&bridge).await;
    let backend_stream = accept_backend(&backend).await;

    drop(backend_stream);

    match timeout(STEP, client.next()).await.unwrap() {
        Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Normal),
        other => panic!("expected Close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_closes_client_with_1011_and_server_survives() {
    // Arrange: a port nobody listens on
    let vacant = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = vacant.local_addr().unwrap();
    drop(vacant);
    let bridge = start_bridge(backend_addr).await;

    // Act
    let mut client = connect(&bridge).await;

    // Assert
    match timeout(STEP, client.next()).await.unwrap() {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(frame.code, CloseCode::Error);
            assert_eq!(frame.reason, "backend unavailable");
        }
        other => panic!("expected Close frame, got {other:?}"),
    }

    // The accept loop is unaffected and still takes new clients.
    assert!(!bridge.task.is_finished());
    let _second = connect(&bridge).await;
}

// ── Isolation and shutdown ────────────────────────────────────────────────────

#[tokio::test]
async fn test_sessions_are_independent() {
    // Arrange: two clients, each with its own backend socket
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = start_bridge(backend.local_addr().unwrap()).await;
    let mut client_a = connect(&bridge).await;
    let mut backend_a = accept_backend(&backend).await;
    let mut client_b = connect(&bridge).await;
    let mut backend_b = accept_backend(&backend).await;

    // Act
    backend_a.write_all(b"for-a\n").await.unwrap();
    backend_b.write_all(b"for-b\n").await.unwrap();

    // Assert
    assert_eq!(next_text(&mut client_a).await, "for-a");
    assert_eq!(next_text(&mut client_b).await, "for-b");

    // Closing A leaves B relaying.
    client_a.close(None).await.unwrap();
    let mut buf = [0u8; 1];
    let _ = timeout(STEP, backend_a.read(&mut buf)).await.unwrap();

    backend_b.write_all(b"still here\n").await.unwrap();
    assert_eq!(next_text(&mut client_b).await, "still here");
}

#[tokio::test]
async fn test_shutdown_stops_server_and_drops_sessions() {
    // Arrange
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = start_bridge(backend.local_addr().unwrap()).await;
    let mut client = connect(&bridge).await;
    let _backend_stream = accept_backend(&backend).await;

    // Act
    bridge.running.store(false, Ordering::Relaxed);

    // Assert: serve returns, and the client's connection goes away
    let result = timeout(STEP, bridge.task).await.unwrap().unwrap();
    assert!(result.is_ok());
    let after = timeout(STEP, client.next()).await.unwrap();
    assert!(
        !matches!(after, Some(Ok(Message::Text(_)))),
        "unexpected text after shutdown: {after:?}"
    );
}
