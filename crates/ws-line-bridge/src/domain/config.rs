//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from defaults, an optional TOML file and CLI
//! arguments (see `main.rs`), then shared read-only across session tasks.
//!
//! Reading files or environment variables is the infrastructure layer's job;
//! this module only holds the values.

use std::net::SocketAddr;
use std::time::Duration;

/// Default WebSocket listener port.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Default backend TCP port.
pub const DEFAULT_BACKEND_PORT: u16 = 12345;

/// Default size of the per-read backend buffer, in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use ws_line_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.listen_addr.port(), 8080);
/// assert_eq!(cfg.backend_addr.to_string(), "127.0.0.1:12345");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Address the WebSocket server binds to.
    pub listen_addr: SocketAddr,

    /// The fixed backend every session connects to.
    pub backend_addr: SocketAddr,

    /// Bytes requested per backend `read()`.  Must be non-zero.
    ///
    /// This only bounds a single read; the line accumulator itself is
    /// unbounded.
    pub read_buffer_size: usize,

    /// Upper bound on the backend connect attempt.  `None` waits for the
    /// operating system's own connect timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    /// | Field            | Default           |
    /// |------------------|-------------------|
    /// | listen_addr      | `0.0.0.0:8080`    |
    /// | backend_addr     | `127.0.0.1:12345` |
    /// | read_buffer_size | 4096              |
    /// | connect_timeout  | none              |
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
            backend_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_BACKEND_PORT)),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            connect_timeout: None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
