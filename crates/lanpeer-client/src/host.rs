//! Host loop for the client binary.
//!
//! # Greeting new sessions
//!
//! Listeners cannot call back into the endpoint that is dispatching to them,
//! so the connect listener only records the new session.  After each tick,
//! [`Greeter::flush`] sends the greeting to every session recorded during
//! that tick.
//!
//! ```text
//! tick ──► on_connect listener ──► pending: [#0]
//! flush ─► send(#0, channel 0, "hello from lanpeer-client")
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use lanpeer_core::host::describe_payload;
use lanpeer_core::protocol::encode_string;
use lanpeer_core::{
    DeliveryMethod, DisconnectReason, Endpoint, ListenerError, SessionHandle, Transport,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Text sent to every server the client connects to.
pub const GREETING: &str = "hello from lanpeer-client";

/// Channel the greeting is sent on.
pub const GREETING_CHANNEL: u8 = 0;

/// Sends [`GREETING`] to sessions connected during the last tick.
#[derive(Debug, Clone)]
pub struct Greeter {
    pending: Rc<RefCell<Vec<SessionHandle>>>,
    payload: Vec<u8>,
}

impl Greeter {
    /// Registers the connect listener on `endpoint` and returns the greeter
    /// that drains what it records.
    pub fn install<T: Transport>(endpoint: &mut Endpoint<T>) -> anyhow::Result<Self> {
        let pending: Rc<RefCell<Vec<SessionHandle>>> = Rc::default();
        let recorder = Rc::clone(&pending);
        endpoint.events().on_connect(move |e| {
            recorder
                .try_borrow_mut()
                .map_err(ListenerError::other)?
                .push(e.session);
            Ok(())
        });
        Ok(Self {
            pending,
            payload: encode_string(GREETING).context("greeting does not fit a payload string")?,
        })
    }

    /// Sends the greeting to every recorded session.  Returns how many were sent.
    ///
    /// A session that ended before its greeting went out is skipped.
    pub fn flush<T: Transport>(&self, endpoint: &mut Endpoint<T>) -> usize {
        let sessions = std::mem::take(&mut *self.pending.borrow_mut());
        let mut sent = 0;
        for session in sessions {
            let result = endpoint.send(
                session.id,
                GREETING_CHANNEL,
                DeliveryMethod::ReliableOrdered,
                &self.payload,
            );
            match result {
                Ok(()) => {
                    debug!("greeted {session}");
                    sent += 1;
                }
                Err(e) => warn!("could not greet {session}: {e}"),
            }
        }
        sent
    }
}

/// Registers listeners that log received payloads, socket errors and
/// disconnects.
pub fn install_logging_listeners<T: Transport>(endpoint: &mut Endpoint<T>) {
    let events = endpoint.events();
    events.on_receive(|e| {
        info!("{} says {}", e.session, describe_payload(e.reader()));
        Ok(())
    });
    events.on_error(|e| {
        warn!("socket error with {}: {}", e.address, e.code);
        Ok(())
    });
    events.on_disconnect(|e| {
        if e.reason != DisconnectReason::LocalShutdown {
            info!("lost {} ({}), probing for a server again", e.session, e.reason);
        }
        Ok(())
    });
}

/// Ticks `endpoint` every `update` until `running` is cleared, greeting new
/// sessions after each tick, then stops it.
pub async fn run<T: Transport>(
    endpoint: &mut Endpoint<T>,
    greeter: &Greeter,
    update: Duration,
    running: &AtomicBool,
) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(update);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while running.load(Ordering::Relaxed) {
        interval.tick().await;
        endpoint.tick(Instant::now()).context("client tick failed")?;
        greeter.flush(endpoint);
    }

    endpoint.stop().context("client stop failed")?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
