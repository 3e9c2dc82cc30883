//! Discovery beacon: the client half of LAN discovery.
//!
//! # States
//!
//! ```text
//!            session count drops to 0
//!   ┌──────┐ ─────────────────────────► ┌─────────┐
//!   │ Idle │                            │ Probing │
//!   └──────┘ ◄───────────────────────── └─────────┘
//!             a session exists again
//! ```
//!
//! The state is re-derived from the transport on every tick, so the beacon
//! never needs to be told about connects or disconnects.  A session that is
//! still being set up counts as existing: while an attempt is in flight the
//! beacon stays quiet and lets the attempt finish or fail.
//!
//! While Probing, each tick broadcasts one probe to the configured port.  An
//! optional probe interval decouples the broadcast rate from the tick rate;
//! without one the beacon probes on every tick.
//!
//! # Auto-connect
//!
//! A direct (non-broadcast) datagram whose payload starts with the reply
//! value triggers one connect attempt to its sender, as long as no session
//! exists.  A second reply arriving while that attempt is in flight is
//! ignored, so two servers answering the same probe yield one session.
//! Anything else is traffic from some other program on the same
//! broadcast domain and is ignored without complaint.

use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::admission::AdmissionKey;
use crate::config::AppConfig;
use crate::domain::events::ReceiveUnconnectedEvent;
use crate::domain::session::{SessionHandle, UnconnectedMessageType};
use crate::protocol::payload::{decode_discovery_reply, encode_discovery_probe, DISCOVERY_REPLY_VALUE};
use crate::transport::Transport;

/// Beacon lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconState {
    /// At least one session exists; no probes are sent.
    Idle,
    /// No session exists; probes go out on every eligible tick.
    Probing,
}

/// Read-only settings for a [`DiscoveryBeacon`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconConfig {
    /// Port the probe is broadcast to.  Servers listen here.
    pub port: u16,
    /// Key offered when auto-connecting.
    pub key: AdmissionKey,
    pub broadcast_until_connected: bool,
    pub auto_connect_on_reply: bool,
    /// Minimum spacing between probes.  `None` probes on every tick.
    pub probe_interval: Option<Duration>,
    /// Log state changes at `info` instead of `debug`.
    pub log_events: bool,
}

impl BeaconConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            port: config.network.port,
            key: config.network.key.clone(),
            broadcast_until_connected: config.client.broadcast_until_connected,
            auto_connect_on_reply: config.client.auto_connect_on_discovery_reply,
            probe_interval: config.client.broadcast_interval(),
            log_events: config.general.log_events,
        }
    }
}

/// Client-side discovery: probes while alone, connects on reply.
#[derive(Debug)]
pub struct DiscoveryBeacon {
    config: BeaconConfig,
    state: BeaconState,
    last_probe: Option<Instant>,
}

impl DiscoveryBeacon {
    /// Creates a beacon in the `Probing` state; a fresh endpoint has no sessions.
    pub fn new(config: BeaconConfig) -> Self {
        Self {
            config,
            state: BeaconState::Probing,
            last_probe: None,
        }
    }

    pub fn state(&self) -> BeaconState {
        self.state
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    /// Runs the per-tick probe step.
    ///
    /// Returns `true` if a probe was handed to the transport.
    pub fn on_tick<T: Transport + ?Sized>(&mut self, transport: &mut T, now: Instant) -> bool {
        self.refresh_state(transport.session_count());

        if self.state != BeaconState::Probing
            || !self.config.broadcast_until_connected
            || !transport.is_running()
        {
            return false;
        }

        if let (Some(interval), Some(last)) = (self.config.probe_interval, self.last_probe) {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }

        match transport.send_broadcast(&encode_discovery_probe(), self.config.port) {
            Ok(()) => {
                trace!("discovery probe broadcast to port {}", self.config.port);
                self.last_probe = Some(now);
                true
            }
            Err(e) => {
                warn!("discovery probe not sent: {e}");
                false
            }
        }
    }

    /// Reacts to an unconnected datagram, connecting to its sender if it is
    /// a discovery reply and no session exists yet.
    ///
    /// Returns the handle of the attempt that was started, if any.
    pub fn on_unconnected<T: Transport + ?Sized>(
        &mut self,
        event: &ReceiveUnconnectedEvent,
        transport: &mut T,
    ) -> Option<SessionHandle> {
        if !self.config.auto_connect_on_reply
            || event.message_type != UnconnectedMessageType::Basic
            || transport.session_count() != 0
        {
            return None;
        }

        if decode_discovery_reply(event.reader().read_remaining()) != Some(DISCOVERY_REPLY_VALUE) {
            trace!("ignoring unconnected datagram from {} ({} bytes)", event.address, event.len());
            return None;
        }

        match transport.connect(event.address, self.config.key.as_str()) {
            Ok(handle) => {
                lifecycle!(
                    self.config.log_events,
                    "discovery reply from {}, connecting as session {}",
                    event.address,
                    handle.id
                );
                Some(handle)
            }
            Err(e) => {
                warn!("auto-connect to {} failed: {e}", event.address);
                None
            }
        }
    }

    fn refresh_state(&mut self, session_count: usize) {
        let next = if session_count == 0 {
            BeaconState::Probing
        } else {
            BeaconState::Idle
        };
        if next == self.state {
            return;
        }
        match next {
            BeaconState::Probing => {
                lifecycle!(self.config.log_events, "no sessions left, discovery probing resumed");
                self.last_probe = None;
            }
            BeaconState::Idle => {
                lifecycle!(self.config.log_events, "session present, discovery probing paused");
            }
        }
        self.state = next;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
