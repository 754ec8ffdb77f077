//! The per-session relay loop.
//!
//! One Tokio task runs [`relay`] for each browser session.  It owns the
//! session's [`BridgeSession`] state exclusively and waits on four event
//! sources at once with `tokio::select!`:
//!
//! - **Browser → Backend**: the next WebSocket message.  Data messages get the
//!   delimiter appended and are queued for the backend writer.
//! - **Backend → Browser**: the next backend `read()`.  Bytes go through the
//!   line accumulator and every completed line is queued as a text frame.
//! - **Backend writer** and **browser writer**: drain their queues.  They only
//!   complete when a write fails.
//!
//! Reads never wait for writes, so a peer that is slow to read (or that only
//! reads after it finished writing) cannot stall the opposite direction.
//! Both connections are split, but everything runs inside the one task, so
//! events are still processed in arrival order and the accumulator needs no
//! lock.
//!
//! The loop is generic over the WebSocket and the backend stream so that
//! tests can drive it with in-memory pipes instead of real sockets.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{
    protocol::{frame::coding::CloseCode, CloseFrame},
    Error as WsError, Message as WsMessage,
};
use tracing::debug;

use crate::application::BridgeSession;

/// Upper bound on flushing queued frames and the close handshake to a browser.
pub const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Which side ended the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The browser closed, errored, or stopped accepting frames.  The caller
    /// must abort the backend socket and then finish the WebSocket close.
    FramedClosed,
    /// The backend reached EOF or failed.  Lines already read have been
    /// flushed to the browser, followed by a Close frame.
    StreamClosed,
}

/// Relays one session until either side closes.
///
/// `session` must have its stream half open (see
/// [`BridgeSession::on_stream_connected`]).  On return the session's half
/// states describe what the caller still has to do: if the stream half is
/// `Closing`, the backend socket must be aborted.
pub async fn relay<S, B>(
    session: &mut BridgeSession,
    ws: &mut S,
    backend: &mut B,
    read_buffer_size: usize,
) -> RelayEnd
where
    S: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let id = session.id();
    let mut read_buf = vec![0u8; read_buffer_size.max(1)];

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (mut backend_rx, mut backend_tx) = tokio::io::split(backend);

    let (backend_queue, mut backend_pending) = mpsc::unbounded_channel::<Vec<u8>>();
    let (browser_queue, mut browser_pending) = mpsc::unbounded_channel::<WsMessage>();

    let backend_writer = async {
        while let Some(bytes) = backend_pending.recv().await {
            backend_tx.write_all(&bytes).await?;
        }
        Ok::<(), std::io::Error>(())
    };
    let browser_writer = async {
        while let Some(message) = browser_pending.recv().await {
            ws_tx.send(message).await?;
        }
        Ok::<(), WsError>(())
    };
    tokio::pin!(backend_writer, browser_writer);

    // The receivers live as long as the writers, so queueing cannot fail
    // inside the loop.
    let end = loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let payload = match frame {
                    Some(Ok(WsMessage::Text(text))) => text.into_bytes(),
                    Some(Ok(WsMessage::Binary(data))) => data,
                    Some(Ok(WsMessage::Close(close))) => {
                        debug!("session {id}: browser sent Close ({close:?})");
                        break RelayEnd::FramedClosed;
                    }
                    // Control frames; tungstenite answers pings itself.
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
                        continue;
                    }
                    Some(Err(e)) => {
                        debug!("session {id}: browser WebSocket error: {e}");
                        break RelayEnd::FramedClosed;
                    }
                    None => {
                        debug!("session {id}: browser stream ended");
                        break RelayEnd::FramedClosed;
                    }
                };

                if let Some(bytes) = session.on_framed_message(&payload) {
                    debug!("session {id}: browser → backend: {} bytes", bytes.len());
                    let _ = backend_queue.send(bytes);
                }
            }

            read = backend_rx.read(&mut read_buf) => {
                let n = match read {
                    Ok(0) => {
                        debug!("session {id}: backend closed the connection (EOF)");
                        break RelayEnd::StreamClosed;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        debug!("session {id}: read from backend failed: {e}");
                        break RelayEnd::StreamClosed;
                    }
                };

                for line in session.on_stream_data(&read_buf[..n]) {
                    let _ = browser_queue.send(WsMessage::Text(line));
                }
            }

            written = &mut backend_writer => {
                if let Err(e) = written {
                    debug!("session {id}: write to backend failed: {e}");
                }
                break RelayEnd::StreamClosed;
            }

            sent = &mut browser_writer => {
                if let Err(e) = sent {
                    debug!("session {id}: WebSocket send failed (browser disconnected): {e}");
                }
                break RelayEnd::FramedClosed;
            }
        }
    };

    match end {
        RelayEnd::FramedClosed => {
            session.on_framed_closed();
        }
        RelayEnd::StreamClosed => {
            if session.on_stream_closed() {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "backend closed".into(),
                };
                let _ = browser_queue.send(WsMessage::Close(Some(frame)));
                drop(browser_queue);

                // Lines read before the backend left go out ahead of the Close.
                match timeout(CLOSE_FLUSH_TIMEOUT, &mut browser_writer).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!("session {id}: failed to send Close to browser: {e}"),
                    Err(_) => {
                        debug!("session {id}: browser did not drain within {CLOSE_FLUSH_TIMEOUT:?}");
                    }
                }
                session.on_framed_close_sent();
            }
        }
    }

    end
}

// ── Tests ─────────────────────────────────────────────────────────────────────
