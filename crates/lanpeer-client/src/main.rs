//! lanpeer client – entry point.
//!
//! # Usage
//!
//! ```text
//! lanpeer-client [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   TOML config file [default: platform config dir]
//!   --port      <PORT>   Server port probes are broadcast to [default: 9055]
//!   --key       <KEY>    Pre-shared admission key [default: TestKey]
//!   --log-level <LEVEL>  Log level when RUST_LOG is unset [default: info]
//!   --connect   <IP>     Connect to this server directly, skipping discovery
//!   --broadcast-interval-ms <MS>  Minimum spacing between probes
//! ```
//!
//! Without `--connect`, the client broadcasts a discovery probe every tick
//! until a server answers, then connects to it.  Every new session receives a
//! short greeting on channel 0.

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

use lanpeer_client::cli::Cli;
use lanpeer_client::host::{self, Greeter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(&config.general.log_level);

    let transport = UdpTransport::new(
        UdpTransportConfig::from_network(&config.network).context("invalid [network] settings")?,
    );
    let mut endpoint = Endpoint::client(transport, &config);
    host::install_logging_listeners(&mut endpoint);
    let greeter = Greeter::install(&mut endpoint)?;

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

    // An explicit --connect implies starting now.
    let started = if cli.connect.is_some() {
        Some(endpoint.start()?)
    } else {
        endpoint.start_if_configured()?
    };
    match started {
        Some(local) => info!(
            "lanpeer client bound to {local}, looking for a server on port {}",
            config.network.port
        ),
        None => {
            warn!("client.start_immediately is false; nothing to do until Ctrl+C");
            while running.load(Ordering::Relaxed) {
                tokio::time::sleep(config.network.update_time()).await;
            }
            return Ok(());
        }
    }

    if let Some(ip) = cli.connect {
        endpoint
            .connect(ip)
            .with_context(|| format!("failed to start connecting to {ip}"))?;
    }

    host::run(&mut endpoint, &greeter, config.network.update_time(), &running).await?;

    info!("lanpeer client stopped");
    Ok(())
}
