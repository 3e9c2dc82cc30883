//! Host loop for the server binary.
//!
//! lanpeer-core never spawns threads or timers; something has to call
//! [`Endpoint::tick`] regularly.  Here that is a `tokio::time::interval`
//! firing every `update_time_ms`.  The loop runs on the task that calls
//! [`run`], so the endpoint and its listeners never cross threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use lanpeer_core::host::describe_payload;
use lanpeer_core::{Endpoint, EventRouter, Transport};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Registers listeners that log received payloads and socket errors.
pub fn install_logging_listeners(events: &mut EventRouter) {
    events.on_receive(|e| {
        info!(
            "received from {} on channel {} ({:?}): {}",
            e.session,
            e.channel,
            e.delivery,
            describe_payload(e.reader())
        );
        Ok(())
    });
    events.on_error(|e| {
        warn!("socket error with {}: {}", e.address, e.code);
        Ok(())
    });
}

/// Ticks `endpoint` every `update` until `running` is cleared, then stops it.
///
/// # Errors
///
/// Returns the first tick or stop failure.
pub async fn run<T: Transport>(
    endpoint: &mut Endpoint<T>,
    update: Duration,
    running: &AtomicBool,
) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(update);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while running.load(Ordering::Relaxed) {
        interval.tick().await;
        endpoint.tick(Instant::now()).context("server tick failed")?;
    }

    endpoint.stop().context("server stop failed")?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::net::SocketAddr;
    use std::rc::Rc;
    use std::sync::Arc;

    use lanpeer_core::transport::scripted::ScriptedTransport;
    use lanpeer_core::{AppConfig, DisconnectReason, UnconnectedMessageType};

    use super::*;

    fn peer() -> SocketAddr {
        "192.168.1.33:50200".parse().unwrap()
    }

    #[tokio::test]
    async fn test_run_answers_probe_and_stops_when_flag_cleared() {
        // Arrange
        let mut endpoint = Endpoint::server(
            ScriptedTransport::new("0.0.0.0:0".parse().unwrap()),
            &AppConfig::default(),
        );
        endpoint.start().unwrap();
        install_logging_listeners(endpoint.events());
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        endpoint.events().on_connect(move |_| {
            flag.store(false, Ordering::Relaxed);
            Ok(())
        });
        let reasons: Rc<RefCell<Vec<DisconnectReason>>> = Rc::default();
        let r = Rc::clone(&reasons);
        endpoint.events().on_disconnect(move |e| {
            r.borrow_mut().push(e.reason);
            Ok(())
        });
        endpoint
            .transport_mut()
            .raise_unconnected(peer(), UnconnectedMessageType::Broadcast, &[0x01]);
        endpoint.transport_mut().raise_connection_request(peer(), b"TestKey");

        // Act
        run(&mut endpoint, Duration::from_millis(1), &running)
            .await
            .unwrap();

        // Assert
        assert_eq!(endpoint.transport().unconnected_sends().len(), 1);
        assert!(!endpoint.is_running());
        assert_eq!(*reasons.borrow(), vec![DisconnectReason::LocalShutdown]);
    }

    #[tokio::test]
    async fn test_run_with_cleared_flag_only_stops() {
        let mut endpoint = Endpoint::server(
            ScriptedTransport::new("0.0.0.0:0".parse().unwrap()),
            &AppConfig::default(),
        );
        endpoint.start().unwrap();
        let running = AtomicBool::new(false);

        run(&mut endpoint, Duration::from_millis(1), &running)
            .await
            .unwrap();

        assert!(!endpoint.is_running());
    }
}
