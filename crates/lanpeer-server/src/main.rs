//! lanpeer server – entry point.
//!
//! # Usage
//!
//! ```text
//! lanpeer-server [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   TOML config file [default: platform config dir]
//!   --port      <PORT>   UDP listen port [default: 9055]
//!   --key       <KEY>    Pre-shared admission key [default: TestKey]
//!   --log-level <LEVEL>  Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! # What happens at startup
//!
//! 1. The config file is loaded and the command-line overrides applied.
//! 2. Logging is initialised from `RUST_LOG` or the configured level.
//! 3. A server [`Endpoint`] over [`UdpTransport`] is started on the port,
//!    unless `start_immediately` is off.
//! 4. The endpoint is ticked every `update_time_ms` until Ctrl+C, then
//!    stopped so connected clients see a clean disconnect.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use lanpeer_core::host::init_logging;
use lanpeer_core::transport::udp::{UdpTransport, UdpTransportConfig};
use lanpeer_core::Endpoint;
use tracing::{info, warn};

use lanpeer_server::cli::Cli;
use lanpeer_server::host;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(&config.general.log_level);

    let transport = UdpTransport::new(
        UdpTransportConfig::from_network(&config.network).context("invalid [network] settings")?,
    );
    let mut endpoint = Endpoint::server(transport, &config);
    host::install_logging_listeners(endpoint.events());

    // Shutdown flag cleared by the Ctrl+C handler.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    match endpoint.start_if_configured()? {
        Some(local) => info!("lanpeer server listening on {local}"),
        None => {
            warn!("server.start_immediately is false; nothing to do until Ctrl+C");
            while running.load(Ordering::Relaxed) {
                tokio::time::sleep(config.network.update_time()).await;
            }
            return Ok(());
        }
    }

    host::run(&mut endpoint, config.network.update_time(), &running).await?;

    info!("lanpeer server stopped");
    Ok(())
}
