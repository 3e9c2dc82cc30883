//! Endpoint: the tick driver that wires transport, admission, discovery and
//! the event router together.
//!
//! # One tick (for beginners)
//!
//! ```text
//! tick(now)
//!   ├─ poll_events()  ──► for each event, in order:
//!   │                      ConnectionRequest ─► AdmissionPolicy ─► accept / reject
//!   │                      everything else   ─► EventRouter::route
//!   │                                           └─ ReceiveUnconnected ─► beacon / responder
//!   ├─ poll again while the previous batch produced follow-up events
//!   └─ client only: DiscoveryBeacon::on_tick (probe if alone)
//! ```
//!
//! Accepting a request makes the transport queue a `PeerConnected` event, so
//! the endpoint keeps polling until a batch comes back empty.  The connect
//! notification for an admitted session therefore arrives in the same tick
//! as the request.  The loop is capped at [`MAX_DRAIN_ROUNDS`] so a transport
//! that keeps producing events cannot hold the tick forever.
//!
//! Nothing here blocks.  The endpoint owns no thread and no timer; the host
//! decides how often to call [`Endpoint::tick`].

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::admission::{AdmissionDecision, AdmissionPolicy};
use crate::config::AppConfig;
use crate::discovery::{BeaconConfig, BeaconState, DiscoveryBeacon, DiscoveryResponder};
use crate::domain::events::{
    ConnectEvent, DisconnectEvent, ErrorEvent, ReceiveEvent, ReceiveUnconnectedEvent, SessionEvent,
};
use crate::domain::session::{DeliveryMethod, SessionHandle, SessionId, SessionState};
use crate::router::{DispatchError, EventRouter};
use crate::transport::{ConnectionRequest, Transport, TransportError, TransportEvent, TransportOptions};

/// Upper bound on `poll_events` calls within one tick.
pub const MAX_DRAIN_ROUNDS: usize = 8;

/// Error type for endpoint operations.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// A subscriber failed while handling an event.  Events after it in the
    /// same tick were not dispatched.
    #[error(transparent)]
    Listener(#[from] DispatchError),
    /// The transport refused an operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Which side of discovery this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Probes for servers and connects to the first one that answers.
    Client,
    /// Listens on the configured port and answers probes.
    Server,
}

/// What one [`Endpoint::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events delivered through the router.
    pub events_dispatched: usize,
    pub requests_accepted: usize,
    pub requests_rejected: usize,
    /// Discovery probes broadcast (client).
    pub probes_sent: usize,
    /// Discovery replies sent (server).
    pub replies_sent: usize,
    /// Auto-connect attempts started (client).
    pub connects_started: usize,
}

#[derive(Debug)]
enum Discovery {
    Beacon(DiscoveryBeacon),
    Responder(DiscoveryResponder),
}

/// A discovery-capable endpoint over some [`Transport`].
#[derive(Debug)]
pub struct Endpoint<T: Transport> {
    transport: T,
    router: EventRouter,
    admission: AdmissionPolicy,
    discovery: Discovery,
    options: TransportOptions,
    port: u16,
    start_immediately: bool,
    log_events: bool,
}

impl<T: Transport> Endpoint<T> {
    /// Builds a client endpoint from the `[network]`, `[client]` and
    /// `[general]` config sections.
    pub fn client(transport: T, config: &AppConfig) -> Self {
        Self {
            transport,
            router: EventRouter::new(),
            admission: AdmissionPolicy::new(config.network.key.clone()),
            discovery: Discovery::Beacon(DiscoveryBeacon::new(BeaconConfig::from_app(config))),
            options: TransportOptions {
                broadcast_receive_enabled: config.client.broadcast_receive_enabled,
                unconnected_messages_enabled: config.network.unconnected_messages_enabled,
            },
            port: config.network.port,
            start_immediately: config.client.start_immediately,
            log_events: config.general.log_events,
        }
    }

    /// Builds a server endpoint from the `[network]`, `[server]` and
    /// `[general]` config sections.
    pub fn server(transport: T, config: &AppConfig) -> Self {
        Self {
            transport,
            router: EventRouter::new(),
            admission: AdmissionPolicy::new(config.network.key.clone()),
            discovery: Discovery::Responder(DiscoveryResponder::new(
                config.server.reply_to_discovery,
            )),
            options: TransportOptions {
                broadcast_receive_enabled: config.server.broadcast_receive_enabled,
                unconnected_messages_enabled: config.network.unconnected_messages_enabled,
            },
            port: config.network.port,
            start_immediately: config.server.start_immediately,
            log_events: config.general.log_events,
        }
    }

    pub fn role(&self) -> Role {
        match self.discovery {
            Discovery::Beacon(_) => Role::Client,
            Discovery::Responder(_) => Role::Server,
        }
    }

    /// Subscriber registry.  Register listeners here before the first tick.
    pub fn events(&mut self) -> &mut EventRouter {
        &mut self.router
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The beacon's state, for client endpoints.
    pub fn beacon_state(&self) -> Option<BeaconState> {
        match &self.discovery {
            Discovery::Beacon(beacon) => Some(beacon.state()),
            Discovery::Responder(_) => None,
        }
    }

    /// Applies the socket options and starts the transport.
    ///
    /// A server binds the configured port; a client binds an ephemeral one.
    pub fn start(&mut self) -> Result<SocketAddr, EndpointError> {
        self.transport.set_options(self.options);
        let port = match self.role() {
            Role::Server => Some(self.port),
            Role::Client => None,
        };
        let local = self.transport.start(port)?;
        lifecycle!(self.log_events, "{:?} endpoint started on {local}", self.role());
        Ok(local)
    }

    /// Starts the endpoint if its role's `start_immediately` flag is set.
    pub fn start_if_configured(&mut self) -> Result<Option<SocketAddr>, EndpointError> {
        if self.start_immediately {
            self.start().map(Some)
        } else {
            debug!("start_immediately is off, waiting for an explicit start");
            Ok(None)
        }
    }

    /// Stops the transport and dispatches the resulting disconnect events.
    pub fn stop(&mut self) -> Result<TickReport, EndpointError> {
        let was_running = self.transport.is_running();
        self.transport.stop();
        let mut report = TickReport::default();
        self.drain(&mut report)?;
        if was_running {
            lifecycle!(self.log_events, "{:?} endpoint stopped", self.role());
        }
        Ok(report)
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    /// Starts a connection attempt to `ip` on the configured port, offering
    /// the configured key.
    pub fn connect(&mut self, ip: IpAddr) -> Result<SessionHandle, EndpointError> {
        let address = SocketAddr::new(ip, self.port);
        let handle = self.transport.connect(address, self.admission.key().as_str())?;
        lifecycle!(self.log_events, "connecting to {address} as session {}", handle.id);
        Ok(handle)
    }

    pub fn send(
        &mut self,
        session: SessionId,
        channel: u8,
        delivery: DeliveryMethod,
        payload: &[u8],
    ) -> Result<(), EndpointError> {
        self.transport.send(session, channel, delivery, payload)?;
        Ok(())
    }

    /// Number of connected sessions; zero while stopped.
    pub fn connection_count(&self) -> usize {
        if self.transport.is_running() {
            self.transport.connected_count()
        } else {
            0
        }
    }

    pub fn session_state(&self, session: SessionId) -> SessionState {
        self.transport.session_state(session)
    }

    /// Runs one non-blocking network step.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Listener`] if a subscriber fails.  The rest of
    /// the tick, including the beacon step, is skipped.
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, EndpointError> {
        let mut report = TickReport::default();
        self.drain(&mut report)?;

        if let Discovery::Beacon(beacon) = &mut self.discovery {
            if beacon.on_tick(&mut self.transport, now) {
                report.probes_sent += 1;
            }
        }
        Ok(report)
    }

    fn drain(&mut self, report: &mut TickReport) -> Result<(), EndpointError> {
        for _ in 0..MAX_DRAIN_ROUNDS {
            let batch = self.transport.poll_events();
            if batch.is_empty() {
                return Ok(());
            }
            for event in batch {
                self.handle(event, report)?;
            }
        }
        trace!("drain round limit reached, remaining events wait for the next tick");
        Ok(())
    }

    fn handle(&mut self, event: TransportEvent, report: &mut TickReport) -> Result<(), EndpointError> {
        let routed = match event {
            TransportEvent::ConnectionRequest(request) => {
                self.admit(&request, report);
                return Ok(());
            }
            TransportEvent::NetworkError { address, code } => {
                warn!("network error with {address}: {code}");
                SessionEvent::Error(ErrorEvent { address, code })
            }
            TransportEvent::Receive {
                session,
                channel,
                delivery,
                payload,
            } => {
                trace!("{} bytes from {session} on channel {channel}", payload.len());
                SessionEvent::Receive(ReceiveEvent::new(session, channel, delivery, payload))
            }
            TransportEvent::ReceiveUnconnected {
                address,
                message_type,
                payload,
            } => {
                lifecycle!(self.log_events, "unconnected {message_type:?} datagram from {address}");
                SessionEvent::ReceiveUnconnected(ReceiveUnconnectedEvent::new(
                    address,
                    message_type,
                    payload,
                ))
            }
            TransportEvent::PeerConnected(session) => {
                lifecycle!(self.log_events, "connected: {session}");
                SessionEvent::Connect(ConnectEvent { session })
            }
            TransportEvent::PeerDisconnected { session, reason } => {
                lifecycle!(self.log_events, "disconnected: {session} ({reason})");
                SessionEvent::Disconnect(DisconnectEvent { session, reason })
            }
        };

        self.router.route(&routed)?;
        report.events_dispatched += 1;

        if let SessionEvent::ReceiveUnconnected(event) = &routed {
            self.react_to_unconnected(event, report);
        }
        Ok(())
    }

    fn admit(&mut self, request: &ConnectionRequest, report: &mut TickReport) {
        match self.admission.evaluate(request) {
            AdmissionDecision::Accept => match self.transport.accept(request.id) {
                Ok(handle) => {
                    report.requests_accepted += 1;
                    lifecycle!(self.log_events, "admitted {} as session {}", request.address, handle.id);
                }
                Err(e) => warn!("could not accept {}: {e}", request.address),
            },
            AdmissionDecision::Reject => match self.transport.reject(request.id) {
                Ok(()) => {
                    report.requests_rejected += 1;
                    lifecycle!(self.log_events, "rejected connection attempt from {}", request.address);
                }
                Err(e) => warn!("could not reject {}: {e}", request.address),
            },
        }
    }

    fn react_to_unconnected(&mut self, event: &ReceiveUnconnectedEvent, report: &mut TickReport) {
        match &mut self.discovery {
            Discovery::Beacon(beacon) => {
                if beacon.on_unconnected(event, &mut self.transport).is_some() {
                    report.connects_started += 1;
                }
            }
            Discovery::Responder(responder) => {
                if responder.on_unconnected(event, &mut self.transport) {
                    report.replies_sent += 1;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
