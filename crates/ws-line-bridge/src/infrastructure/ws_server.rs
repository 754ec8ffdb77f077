//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from browsers.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Opening a corresponding TCP connection to the backend.
//! 5. Running the relay loop for the session (see [`relay`]).
//! 6. Propagating closure: aborting the backend when the browser leaves,
//!    then finishing the browser's close handshake under a timeout.
//! 7. Stopping when the `running` flag is cleared, aborting live sessions.
//!
//! # Scalability
//!
//! Each browser session runs in its own Tokio task, tracked in a `JoinSet`.
//! Sessions share nothing but the read-only `Arc<BridgeConfig>`, so a failure
//! in one never affects another.
//!
//! [`relay`]: crate::infrastructure::relay::relay

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame},
};
use tracing::{debug, error, info, warn};

use crate::application::BridgeSession;
use crate::domain::config::BridgeConfig;
use crate::domain::session::{HalfState, SessionId};
use crate::infrastructure::backend_conn::BackendConnection;
use crate::infrastructure::relay::{relay, RelayEnd, CLOSE_FLUSH_TIMEOUT};

/// How long `accept()` may block before the shutdown flag is re-checked.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.listen_addr` and serves until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: BridgeConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket listener on {}",
                config.listen_addr
            )
        })?;

    serve(listener, config, running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// Each accepted connection is handed to its own task so that one slow
/// client never blocks others.  When `running` is cleared the loop stops
/// accepting and aborts every session still in flight.
///
/// # Errors
///
/// Returns an error only if the listener's local address cannot be read.
/// Per-connection failures are logged and never end the loop.
pub async fn serve(
    listener: TcpListener,
    config: BridgeConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to read listener address")?;
    info!(
        "WebSocket bridge listening on {local_addr}, backend {}",
        config.backend_addr
    );

    let config = Arc::new(config);
    let mut sessions = JoinSet::new();

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Reap sessions that already finished so the set does not grow.
        while sessions.try_join_next().is_some() {}

        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new browser connection from {peer_addr}");
                let cfg = Arc::clone(&config);
                sessions.spawn(handle_browser_session(stream, peer_addr, cfg));
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {
                // No new connection this interval; re-check the flag.
            }
        }
    }

    if !sessions.is_empty() {
        info!("aborting {} active session(s)", sessions.len());
    }
    sessions.shutdown().await;

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-session task: runs the session and logs the outcome.
async fn handle_browser_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<BridgeConfig>,
) {
    let session_id = SessionId::new();
    match run_session(raw_stream, peer_addr, session_id, config).await {
        Ok(()) => info!("session {session_id} ({peer_addr}) closed"),
        Err(e) => warn!("session {session_id} ({peer_addr}) closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of a single browser session.
///
/// 1. Completes the WebSocket handshake.
/// 2. Connects to the backend; on failure closes the WebSocket with 1011.
/// 3. Relays until one side closes.
/// 4. Aborts the backend socket if the browser side closed first, then
///    flushes the WebSocket close.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails or the backend cannot be
/// reached.  Either way the browser connection is gone when this returns.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    session_id: SessionId,
    config: Arc<BridgeConfig>,
) -> anyhow::Result<()> {
    // ── Step 1: WebSocket handshake ───────────────────────────────────────────
    let mut ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    debug!("session {session_id}: WebSocket established with {peer_addr}");
    let mut session = BridgeSession::new(session_id);

    // ── Step 2: Connect to the backend ────────────────────────────────────────
    let mut backend =
        match BackendConnection::connect(config.backend_addr, config.connect_timeout).await {
            Ok(conn) => conn,
            Err(e) => {
                if session.on_stream_closed() {
                    let frame = CloseFrame {
                        code: CloseCode::Error,
                        reason: "backend unavailable".into(),
                    };
                    if let Err(close_err) = ws_stream.close(Some(frame)).await {
                        debug!("session {session_id}: close after connect failure: {close_err}");
                    }
                    session.on_framed_close_sent();
                }
                return Err(anyhow::Error::new(e).context("could not open backend connection"));
            }
        };

    session.on_stream_connected();
    info!(
        "session {session_id}: relaying {peer_addr} <-> {}",
        backend.peer_addr
    );

    // ── Step 3: Relay ─────────────────────────────────────────────────────────
    let end = relay(
        &mut session,
        &mut ws_stream,
        &mut backend.stream,
        config.read_buffer_size,
    )
    .await;
    debug!("session {session_id}: relay ended: {end:?}");

    // ── Step 4: Propagate closure ─────────────────────────────────────────────
    // The backend is torn down before the browser is touched again, so a
    // stalled browser cannot hold it open.
    if session.stream_state() == HalfState::Closing {
        backend.abort();
        session.on_stream_aborted();
    }
    if end == RelayEnd::FramedClosed {
        // Flushes our reply if the browser started the close handshake.
        match timeout(CLOSE_FLUSH_TIMEOUT, SinkExt::close(&mut ws_stream)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("session {session_id}: WebSocket close after browser left: {e}");
            }
            Err(_) => {
                debug!("session {session_id}: close not flushed within {CLOSE_FLUSH_TIMEOUT:?}");
            }
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_server_fails_when_port_is_taken() {
        // Arrange: occupy a port
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = BridgeConfig {
            listen_addr: occupied.local_addr().unwrap(),
            ..BridgeConfig::default()
        };
        let running = Arc::new(AtomicBool::new(true));

        // Act
        let result = run_server(config, running).await;

        // Assert
        let err = result.expect_err("bind must fail on an occupied port");
        assert!(format!("{err:#}").contains("failed to bind"));
    }

    #[tokio::test]
    async fn test_serve_returns_once_running_is_cleared() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let running = Arc::new(AtomicBool::new(false));

        // Act
        let result = timeout(
            Duration::from_secs(2),
            serve(listener, BridgeConfig::default(), running),
        )
        .await;

        // Assert
        assert!(matches!(result, Ok(Ok(()))));
    }
}
