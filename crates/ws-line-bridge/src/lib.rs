//! ws-line-bridge library crate.
//!
//! Bridges WebSocket clients to a line-oriented TCP backend.  Every browser
//! connection gets its own backend connection; backend bytes are split on
//! `\n` into one WebSocket text message per line, and every WebSocket message
//! is written to the backend with `\n` appended.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (WebSocket messages)
//!         ↕
//! [ws-line-bridge]
//!   ├── domain/           Pure types: LineAccumulator, HalfState, BridgeConfig
//!   ├── application/      BridgeSession: relay and closure decisions
//!   └── infrastructure/
//!         ├── ws_server/   Accept loop, per-session tasks (tokio-tungstenite)
//!         ├── relay/       One select! loop per session, queued writers
//!         ├── backend_conn/ TCP connection to the backend
//!         └── config_file/ Optional TOML config
//!         ↕
//! Backend (newline-delimited text over TCP)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O, no async, no frameworks.
//! - `application` depends on `domain` only.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: pure framing, session and config types (no I/O).
pub mod domain;

/// Application layer: per-session state machine.
pub mod application;

/// Infrastructure layer: WebSocket server, relay loop and backend connection.
pub mod infrastructure;
