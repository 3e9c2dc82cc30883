//! TOML-based configuration for the server and client applications.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file
//! unless an explicit path is given:
//! - Windows:  `%APPDATA%\lanpeer\config.toml`
//! - Linux:    `~/.config/lanpeer/config.toml`
//! - macOS:    `~/Library/Application Support/lanpeer/config.toml`
//!
//! Example:
//!
//! ```toml
//! [network]
//! key = "TestKey"
//! port = 9055
//!
//! [client]
//! broadcast_until_connected = true
//! auto_connect_on_discovery_reply = true
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a missing file, a
//! missing section or a missing key all fall back to the documented default.
//! The configuration is read once at startup and handed to the endpoint by
//! reference; nothing in lanpeer mutates it afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admission::AdmissionKey;

/// Failures while reading or writing the lanpeer config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither the OS config directory nor a home directory is known.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// Reading, writing or creating the config path failed.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`AppConfig`].
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// [`AppConfig`] could not be rendered as TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Logging settings shared by both roles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log session lifecycle events at `info` instead of `debug`.
    #[serde(default = "default_true")]
    pub log_events: bool,
}

/// Settings shared by both roles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Pre-shared admission key.  Empty accepts every connection attempt.
    #[serde(default = "default_key")]
    pub key: AdmissionKey,
    /// UDP port the server listens on and the client probes.
    #[serde(default = "default_port")]
    pub port: u16,
    /// IP address to bind the socket to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Destination address for discovery probes.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: String,
    /// Host tick period in milliseconds.
    #[serde(default = "default_update_time_ms")]
    pub update_time_ms: u64,
    /// Silence after which a session (or an unanswered attempt) is dropped.
    #[serde(default = "default_disconnect_timeout_ms")]
    pub disconnect_timeout_ms: u64,
    /// Deliver direct datagrams that arrive outside any session.
    #[serde(default = "default_true")]
    pub unconnected_messages_enabled: bool,
}

/// Client role settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Start the transport as soon as the endpoint is created.
    #[serde(default = "default_true")]
    pub start_immediately: bool,
    /// Keep broadcasting discovery probes while no session exists.
    #[serde(default = "default_true")]
    pub broadcast_until_connected: bool,
    /// Connect to whoever answers a discovery probe, if not yet connected.
    #[serde(default = "default_true")]
    pub auto_connect_on_discovery_reply: bool,
    /// Deliver datagrams sent to the broadcast address.
    #[serde(default = "default_false")]
    pub broadcast_receive_enabled: bool,
    /// Minimum gap between probes.  Absent means one probe per tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_interval_ms: Option<u64>,
}

/// Server role settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Start the transport as soon as the endpoint is created.
    #[serde(default = "default_true")]
    pub start_immediately: bool,
    /// Answer discovery probes so clients can find this server.
    #[serde(default = "default_true")]
    pub reply_to_discovery: bool,
    /// Deliver datagrams sent to the broadcast address.
    #[serde(default = "default_true")]
    pub broadcast_receive_enabled: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_key() -> AdmissionKey {
    AdmissionKey::new("TestKey")
}
fn default_port() -> u16 {
    9055
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_broadcast_address() -> String {
    "255.255.255.255".to_string()
}
fn default_update_time_ms() -> u64 {
    15
}
fn default_disconnect_timeout_ms() -> u64 {
    5000
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_events: default_true(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            port: default_port(),
            bind_address: default_bind_address(),
            broadcast_address: default_broadcast_address(),
            update_time_ms: default_update_time_ms(),
            disconnect_timeout_ms: default_disconnect_timeout_ms(),
            unconnected_messages_enabled: default_true(),
        }
    }
}

impl NetworkConfig {
    /// Host tick period.
    pub fn update_time(&self) -> Duration {
        Duration::from_millis(self.update_time_ms.max(1))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            start_immediately: default_true(),
            broadcast_until_connected: default_true(),
            auto_connect_on_discovery_reply: default_true(),
            broadcast_receive_enabled: default_false(),
            broadcast_interval_ms: None,
        }
    }
}

impl ClientConfig {
    /// Probe rate limit, if one is configured.
    pub fn broadcast_interval(&self) -> Option<Duration> {
        self.broadcast_interval_ms.map(Duration::from_millis)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            start_immediately: default_true(),
            reply_to_discovery: default_true(),
            broadcast_receive_enabled: default_true(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────────────────

/// The `lanpeer` directory under the OS config location.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`AppConfig`] from `path`, or from the platform default path when
/// `path` is `None`.  Returns `AppConfig::default()` if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
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
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the `lanpeer` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("lanpeer"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lanpeer"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("lanpeer")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
