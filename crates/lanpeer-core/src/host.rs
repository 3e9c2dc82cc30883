//! Pieces both host binaries share: logging setup, the common command-line
//! flags and a payload formatter for log lines.
//!
//! Flags override values from the config file, which overrides the built-in
//! defaults.  Every flag can also be set through a `LANPEER_*` environment
//! variable; an explicit flag wins over the variable.

use std::path::PathBuf;

use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::admission::AdmissionKey;
use crate::config::{load_config, AppConfig, ConfigError};
use crate::protocol::PayloadReader;

/// Initialises `tracing` output.  `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

/// Renders a payload for the log: a quoted string if the whole payload is one
/// length-prefixed string, otherwise its size.
pub fn describe_payload(mut reader: PayloadReader<'_>) -> String {
    let total = reader.remaining();
    match reader.read_string() {
        Ok(text) if reader.is_empty() => format!("{text:?}"),
        _ => format!("{total} bytes"),
    }
}

/// Flags accepted by every lanpeer binary.  Flattened into each binary's
/// `Cli`.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Path to the TOML config file.  Defaults to the platform config directory.
    #[arg(long, env = "LANPEER_CONFIG")]
    pub config: Option<PathBuf>,

    /// UDP port the server listens on and the client probes.
    #[arg(long, env = "LANPEER_PORT")]
    pub port: Option<u16>,

    /// Pre-shared admission key.  An empty string admits every client.
    #[arg(long, env = "LANPEER_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Default log level when `RUST_LOG` is not set.
    #[arg(long, env = "LANPEER_LOG")]
    pub log_level: Option<String>,
}

impl CommonArgs {
    /// Loads the config file and applies the flag overrides.
    ///
    /// Without `--config`, a missing platform config directory is not an
    /// error; the built-in defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from reading or parsing the file.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match load_config(self.config.as_deref()) {
            Ok(config) => config,
            Err(ConfigError::NoPlatformConfigDir) if self.config.is_none() => AppConfig::default(),
            Err(e) => return Err(e),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(key) = &self.key {
            config.network.key = AdmissionKey::new(key.clone());
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
