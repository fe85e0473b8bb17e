//! Daemon configuration
//!
//! Loaded from `~/.config/haul/haul.toml` unless a path is given on the
//! command line. A missing file means defaults; a present file must parse
//! cleanly and may not contain unknown keys.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haul")
}

fn default_listen_addr() -> String {
    "127.0.0.1:58846".to_string()
}

fn default_cert_path() -> PathBuf {
    config_dir().join("ssl/daemon.cert")
}

fn default_key_path() -> PathBuf {
    config_dir().join("ssl/daemon.key")
}

fn default_auth_file() -> PathBuf {
    config_dir().join("auth.toml")
}

fn default_plugin_dir() -> PathBuf {
    config_dir().join("plugins")
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_handler_timeout_secs() -> u64 {
    60
}

fn default_outbound_queue_capacity() -> usize {
    64
}

fn default_id_reuse_grace_secs() -> u64 {
    60
}

fn default_max_frame_bytes() -> usize {
    haul_proto::DEFAULT_MAX_FRAME_BYTES
}

/// Everything the daemon reads from its TOML config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,

    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    #[serde(default = "default_auth_file")]
    pub auth_file: PathBuf,

    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: PathBuf,

    /// Sessions with no inbound traffic for this long are closed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Handlers running longer than this return a timeout fault.
    /// Zero disables the limit.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,

    /// Bound on each session's outbound queue; events overflowing it are
    /// dropped for that session.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// How long a closed session's id stays retired before reuse.
    #[serde(default = "default_id_reuse_grace_secs")]
    pub id_reuse_grace_secs: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            cert_path: default_cert_path(),
            key_path: default_key_path(),
            auth_file: default_auth_file(),
            plugin_dir: default_plugin_dir(),
            idle_timeout_secs: default_idle_timeout_secs(),
            handler_timeout_secs: default_handler_timeout_secs(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            id_reuse_grace_secs: default_id_reuse_grace_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl DaemonConfig {
    /// Load from the given path, or the default location when `None`.
    /// A missing file yields the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_dir().join("haul.toml"),
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }
}
