//! ws-line-bridge: WebSocket-to-TCP line bridge, entry point.
//!
//! Accepts WebSocket connections and gives each one its own TCP connection to
//! a fixed backend.  Backend output is split on newlines into one WebSocket
//! text message per line; WebSocket messages are written to the backend with
//! a trailing newline.
//!
//! # Usage
//!
//! ```text
//! ws-line-bridge [OPTIONS]
//!
//! Options:
//!   --config           <PATH>  TOML config file
//!   --listen-bind      <IP>    WebSocket bind address   [default: 0.0.0.0]
//!   --listen-port      <PORT>  WebSocket listener port  [default: 8080]
//!   --backend-host     <IP>    Backend IP address       [default: 127.0.0.1]
//!   --backend-port     <PORT>  Backend TCP port         [default: 12345]
//!   --read-buffer-size <BYTES> Bytes per backend read   [default: 4096]
//!   --connect-timeout  <SECS>  Backend connect timeout  [default: none]
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the config file, then CLI flags / environment
//! variables (highest).
//!
//! | Variable                    | Flag                 |
//! |-----------------------------|----------------------|
//! | `WS_BRIDGE_CONFIG`          | `--config`           |
//! | `WS_BRIDGE_LISTEN_BIND`     | `--listen-bind`      |
//! | `WS_BRIDGE_LISTEN_PORT`     | `--listen-port`      |
//! | `WS_BRIDGE_BACKEND_HOST`    | `--backend-host`     |
//! | `WS_BRIDGE_BACKEND_PORT`    | `--backend-port`     |
//! | `WS_BRIDGE_READ_BUFFER`     | `--read-buffer-size` |
//! | `WS_BRIDGE_CONNECT_TIMEOUT` | `--connect-timeout`  |

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ws_line_bridge::domain::BridgeConfig;
use ws_line_bridge::infrastructure::config_file::FileConfig;
use ws_line_bridge::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket-to-TCP line bridge.
///
/// Every option is optional; unset options fall back to the config file and
/// then to built-in defaults.
#[derive(Debug, Default, Parser)]
#[command(
    name = "ws-line-bridge",
    about = "Bridge WebSocket clients to a newline-delimited TCP backend",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "WS_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// IP address for the WebSocket listener to bind to.
    ///
    /// `0.0.0.0` accepts connections on every interface; `127.0.0.1` only
    /// local ones.
    #[arg(long, env = "WS_BRIDGE_LISTEN_BIND")]
    listen_bind: Option<IpAddr>,

    /// TCP port for the WebSocket listener.
    #[arg(long, env = "WS_BRIDGE_LISTEN_PORT")]
    listen_port: Option<u16>,

    /// IP address of the backend.
    #[arg(long, env = "WS_BRIDGE_BACKEND_HOST")]
    backend_host: Option<IpAddr>,

    /// TCP port of the backend.
    #[arg(long, env = "WS_BRIDGE_BACKEND_PORT")]
    backend_port: Option<u16>,

    /// Bytes requested per backend read.
    #[arg(long, env = "WS_BRIDGE_READ_BUFFER")]
    read_buffer_size: Option<usize>,

    /// Give up on a backend connect after this many seconds.
    #[arg(long, env = "WS_BRIDGE_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,
}

impl Cli {
    /// Builds the effective [`BridgeConfig`]: defaults, then the config file
    /// (if `--config` was given), then the CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the resulting
    /// read buffer size is zero.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = BridgeConfig::default();

        if let Some(path) = &self.config {
            let file = FileConfig::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?;
            file.apply_to(&mut config);
        }

        if let Some(ip) = self.listen_bind {
            config.listen_addr.set_ip(ip);
        }
        if let Some(port) = self.listen_port {
            config.listen_addr.set_port(port);
        }
        if let Some(ip) = self.backend_host {
            config.backend_addr.set_ip(ip);
        }
        if let Some(port) = self.backend_port {
            config.backend_addr.set_port(port);
        }
        if let Some(size) = self.read_buffer_size {
            config.read_buffer_size = size;
        }
        if let Some(secs) = self.connect_timeout {
            config.connect_timeout = Some(Duration::from_secs(secs));
        }

        anyhow::ensure!(
            config.read_buffer_size > 0,
            "read buffer size must be greater than zero"
        );

        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Initialise `tracing_subscriber` (level from `RUST_LOG`, default `info`).
/// 2. Parse CLI arguments and build the [`BridgeConfig`].
/// 3. Spawn a Ctrl+C handler that clears the shared `running` flag.
/// 4. Run the accept loop until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_bridge_config()?;

    info!(
        "ws-line-bridge starting: listen={}, backend={}",
        config.listen_addr, config.backend_addr
    );

    // The accept loop polls this flag between accept timeouts.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("ws-line-bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
