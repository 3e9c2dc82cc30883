//! Command-line arguments for `lanpeer-server`.

use anyhow::Context;
use clap::Parser;
use lanpeer_core::host::CommonArgs;
use lanpeer_core::AppConfig;

/// lanpeer server: answers LAN discovery probes and admits clients holding
/// the shared key.
#[derive(Debug, Parser)]
#[command(name = "lanpeer-server", version)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        self.common
            .load_config()
            .context("failed to load configuration")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
