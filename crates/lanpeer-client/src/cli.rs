//! Command-line arguments for `lanpeer-client`.

use std::net::IpAddr;

use anyhow::Context;
use clap::Parser;
use lanpeer_core::host::CommonArgs;
use lanpeer_core::AppConfig;

/// lanpeer client: finds a lanpeer server on the LAN and connects to it.
#[derive(Debug, Parser)]
#[command(name = "lanpeer-client", version)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Connect straight to this server IP instead of waiting for discovery.
    #[arg(long, value_name = "IP")]
    pub connect: Option<IpAddr>,

    /// Minimum milliseconds between discovery probes.  Probes every tick when unset.
    #[arg(long, value_name = "MS", env = "LANPEER_BROADCAST_INTERVAL_MS")]
    pub broadcast_interval_ms: Option<u64>,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = self
            .common
            .load_config()
            .context("failed to load configuration")?;
        self.apply_client_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_client_overrides(&self, config: &mut AppConfig) {
        if self.broadcast_interval_ms.is_some() {
            config.client.broadcast_interval_ms = self.broadcast_interval_ms;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
