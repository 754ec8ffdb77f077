//! Optional TOML configuration file.
//!
//! Every key is optional; anything missing keeps the value from the layer
//! below (built-in defaults).  CLI flags and environment variables are applied
//! on top of the file by `main.rs`.
//!
//! ```toml
//! [listen]
//! bind = "0.0.0.0"
//! port = 8080
//!
//! [backend]
//! host = "127.0.0.1"
//! port = 12345
//! read_buffer_size = 4096
//! connect_timeout_secs = 5
//! ```
//!
//! Hosts must be IP literals; no DNS lookups are performed.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::config::BridgeConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Contents of the config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub listen: ListenSection,
    #[serde(default)]
    pub backend: BackendSection,
}

/// `[listen]` table: where browsers connect.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ListenSection {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
}

/// `[backend]` table: the fixed TCP endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub read_buffer_size: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parses config file contents.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML, unknown keys, or
    /// values of the wrong type (including non-IP hosts).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its contents are invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Overwrites the fields of `config` that this file sets.
    pub fn apply_to(&self, config: &mut BridgeConfig) {
        if let Some(bind) = self.listen.bind {
            config.listen_addr.set_ip(bind);
        }
        if let Some(port) = self.listen.port {
            config.listen_addr.set_port(port);
        }
        if let Some(host) = self.backend.host {
            config.backend_addr.set_ip(host);
        }
        if let Some(port) = self.backend.port {
            config.backend_addr.set_port(port);
        }
        if let Some(size) = self.backend.read_buffer_size {
            config.read_buffer_size = size;
        }
        if let Some(secs) = self.backend.connect_timeout_secs {
            config.connect_timeout = Some(Duration::from_secs(secs));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
