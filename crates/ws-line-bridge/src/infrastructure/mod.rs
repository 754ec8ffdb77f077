//! Infrastructure layer for ws-line-bridge.
//!
//! Handles all I/O: accepting WebSocket connections from browsers, opening
//! TCP connections to the backend, and reading the config file.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade handshake
//! - Opening and aborting backend TCP connections
//! - Running the per-session relay loop
//! - Spawning per-session Tokio tasks and handling shutdown
//! - Loading the optional TOML config file
//!
//! Framing and closure decisions belong to the domain and application layers.

pub mod backend_conn;
pub mod config_file;
pub mod relay;
pub mod ws_server;

pub use ws_server::{run_server, serve};
