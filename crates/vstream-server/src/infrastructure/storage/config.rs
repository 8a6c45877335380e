//! TOML-based configuration for the streaming server.
//!
//! Example file:
//!
//! ```toml
//! bind_address = "0.0.0.0"
//! control_port = 8554
//! media_root = "/srv/media"
//! send_interval_ms = 50
//! payload_type = 26
//! ssrc = 0
//! log_level = "info"
//! ```
//!
//! # Missing keys
//!
//! Every field carries `#[serde(default = "...")]`, so a partial file (or an
//! empty one) yields a working configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::sender::SendSettings;

/// Failures while reading or writing `vstream-server.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading, writing, or creating the parent directory failed.
    #[error("cannot access server config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`ServerConfig`].
    #[error("invalid server config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode server config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` and `control_port` do not form a socket address.
    #[error("invalid control address '{0}'")]
    InvalidAddress(String),
}

/// Server settings stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address the control listener binds to.  `"0.0.0.0"` binds all
    /// interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port for the control channel.
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// Directory that SETUP targets are resolved against.
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    /// Delay between two data packets while playing.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    /// Payload type stamped on every data packet.
    #[serde(default = "default_payload_type")]
    pub payload_type: u8,
    /// Synchronization source identifier stamped on every data packet.
    #[serde(default = "default_ssrc")]
    pub ssrc: u32,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_control_port() -> u16 {
    8554
}
fn default_media_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_send_interval_ms() -> u64 {
    50
}
fn default_payload_type() -> u8 {
    vstream_core::protocol::packet::PAYLOAD_TYPE_MJPEG
}
fn default_ssrc() -> u32 {
    0
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            control_port: default_control_port(),
            media_root: default_media_root(),
            send_interval_ms: default_send_interval_ms(),
            payload_type: default_payload_type(),
            ssrc: default_ssrc(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// The socket address of the control listener.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` is not an IP
    /// address.
    pub fn control_addr(&self) -> Result<SocketAddr, ConfigError> {
        let text = format!("{}:{}", self.bind_address, self.control_port);
        text.parse().map_err(|_| ConfigError::InvalidAddress(text))
    }

    /// Packetization and pacing parameters for the data send loop.
    pub fn send_settings(&self) -> SendSettings {
        SendSettings {
            interval: Duration::from_millis(self.send_interval_ms),
            payload_type: self.payload_type,
            ssrc: self.ssrc,
        }
    }
}

// ── Load / save ───────────────────────────────────────────────────────────────

/// Loads a [`ServerConfig`] from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// [`ConfigError::Parse`] for malformed TOML; [`ConfigError::Io`] for any
/// read failure except a missing file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// [`ConfigError::Io`] if the directory or file cannot be written.
pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
