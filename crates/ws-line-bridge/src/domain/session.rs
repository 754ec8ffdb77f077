//! Session identity and per-half connection lifecycle.
//!
//! A bridge session has two halves: the browser-facing WebSocket (the
//! *framed* side) and the backend TCP socket (the *stream* side).  Each half
//! moves through the same states:
//!
//! ```text
//! Connecting ──► Open ──► Closing ──► Closed
//!      └──────────────────────┘
//!         (connect failure)
//! ```
//!
//! Data is only relayed while a half is `Open`.

use std::fmt;

use uuid::Uuid;

/// Unique identifier of one bridge session, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generates a fresh random (v4) session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of one half of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HalfState {
    /// The connection is being established.
    #[default]
    Connecting,
    /// Data may be relayed.
    Open,
    /// A close has been initiated; incoming data is discarded.
    Closing,
    /// Fully closed.
    Closed,
}

impl HalfState {
    /// Returns `true` if data may be relayed through this half.
    pub fn is_open(self) -> bool {
        self == HalfState::Open
    }

    /// Returns `true` once the half is fully closed.
    pub fn is_closed(self) -> bool {
        self == HalfState::Closed
    }

    /// Marks a successful connect.  Has no effect unless `Connecting`.
    pub fn open(&mut self) {
        if *self == HalfState::Connecting {
            *self = HalfState::Open;
        }
    }

    /// Requests a close.
    ///
    /// Returns `true` only for the first request, i.e. when the caller must
    /// actually perform the close.  Later requests are no-ops.
    pub fn begin_close(&mut self) -> bool {
        match *self {
            HalfState::Connecting | HalfState::Open => {
                *self = HalfState::Closing;
                true
            }
            HalfState::Closing | HalfState::Closed => false,
        }
    }

    /// Records that the underlying connection is gone.
    pub fn finish_close(&mut self) {
        *self = HalfState::Closed;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
