//! Application layer for ws-line-bridge.
//!
//! Knows *what* to relay and *when* to close, but delegates *how* to the
//! infrastructure layer.
//!
//! # Responsibilities
//!
//! - Turning backend bytes into browser messages and browser messages into
//!   backend bytes, via the domain framing types
//! - Tracking both halves of a session and deciding closure propagation
//! - Defining the `BridgeError` type for session-level failures
//!
//! Opening sockets, spawning tasks and WebSocket framing live elsewhere.

pub mod bridge_service;

pub use bridge_service::{BridgeError, BridgeSession};
