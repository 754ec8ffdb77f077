//! Per-session bridge state machine.
//!
//! [`BridgeSession`] holds everything one browser session needs to decide
//! *what* to relay: the line accumulator and the lifecycle state of both
//! halves.  It performs no I/O.  The infrastructure relay loop feeds it events
//! (backend bytes, browser messages, closures) and carries out the actions it
//! returns.
//!
//! # Event → action table
//!
//! ```text
//! on_stream_data(chunk)      → browser messages to send (maybe none)
//! on_framed_message(payload) → backend bytes to write (or None: discard)
//! on_framed_closed()         → true: abort the backend socket
//! on_stream_closed()         → true: close the WebSocket gracefully
//! ```
//!
//! Both close events are idempotent: once a half is closing, asking again
//! returns `false` so the caller never closes twice.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::domain::framing::{frame_outbound, LineAccumulator};
use crate::domain::session::{HalfState, SessionId};

// ── Error type ────────────────────────────────────────────────────────────────

/// Failures that end a single session before relaying starts.
///
/// These never propagate beyond the session's own task.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The backend refused or could not be reached.
    #[error("backend {addr} unavailable: {source}")]
    BackendUnavailable {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The backend connect attempt exceeded the configured timeout.
    #[error("backend {addr} did not accept the connection within {after:?}")]
    BackendTimeout { addr: SocketAddr, after: Duration },
}

// ── Session state ─────────────────────────────────────────────────────────────

/// State of one browser ⇄ backend bridge.
///
/// The framed (WebSocket) half starts `Open` because the session is created
/// after the upgrade handshake; the stream (TCP) half starts `Connecting`.
#[derive(Debug)]
pub struct BridgeSession {
    id: SessionId,
    accumulator: LineAccumulator,
    framed: HalfState,
    stream: HalfState,
}

impl BridgeSession {
    /// Creates a session for a freshly accepted WebSocket connection.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            accumulator: LineAccumulator::new(),
            framed: HalfState::Open,
            stream: HalfState::Connecting,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn framed_state(&self) -> HalfState {
        self.framed
    }

    pub fn stream_state(&self) -> HalfState {
        self.stream
    }

    /// Bytes received from the backend that do not yet form a full line.
    pub fn pending(&self) -> &[u8] {
        self.accumulator.pending()
    }

    /// Records that the backend connection is established.
    pub fn on_stream_connected(&mut self) {
        self.stream.open();
    }

    /// Handles bytes read from the backend.
    ///
    /// Returns the trimmed lines to send to the browser, in order.  Lines are
    /// only returned while the browser side is open; otherwise they are
    /// consumed and dropped.  Chunks arriving after the backend half left
    /// `Open` are discarded without touching the accumulator.
    pub fn on_stream_data(&mut self, chunk: &[u8]) -> Vec<String> {
        if !self.stream.is_open() {
            return Vec::new();
        }
        let lines = self.accumulator.push(chunk);
        if self.framed.is_open() {
            lines
        } else {
            Vec::new()
        }
    }

    /// Handles one data message from the browser.
    ///
    /// Returns the bytes to write to the backend (payload plus delimiter), or
    /// `None` if the backend half is not open and the message must be dropped.
    pub fn on_framed_message(&self, payload: &[u8]) -> Option<Vec<u8>> {
        if self.stream.is_open() && self.framed.is_open() {
            Some(frame_outbound(payload))
        } else {
            None
        }
    }

    /// Handles the browser side going away.
    ///
    /// Returns `true` if the caller must now abort the backend connection.
    pub fn on_framed_closed(&mut self) -> bool {
        self.framed.finish_close();
        self.stream.begin_close()
    }

    /// Handles the backend side going away (EOF, read or write error).
    ///
    /// Returns `true` if the caller must now close the WebSocket.  Any partial
    /// line still buffered is discarded.
    pub fn on_stream_closed(&mut self) -> bool {
        self.stream.finish_close();
        self.accumulator.clear();
        self.framed.begin_close()
    }

    /// Records that the browser-side close handshake has been sent.
    pub fn on_framed_close_sent(&mut self) {
        self.framed.finish_close();
    }

    /// Records that the backend socket has been torn down.
    pub fn on_stream_aborted(&mut self) {
        self.stream.finish_close();
        self.accumulator.clear();
    }

    /// Returns `true` once both halves are closed.
    pub fn is_finished(&self) -> bool {
        self.framed.is_closed() && self.stream.is_closed()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
