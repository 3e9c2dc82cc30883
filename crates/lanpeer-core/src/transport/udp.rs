//! Reference transport engine over a non-blocking `std::net::UdpSocket`.
//!
//! This engine is deliberately small: it establishes sessions with a
//! request/accept handshake, keeps them alive with pings, and times them out.
//! It does **not** provide reliability, ordering or fragmentation; the
//! delivery method is carried as a tag so the receiving side can see what was
//! asked for.  See [`crate::protocol::packet`] for the datagram layout.
//!
//! # Session handshake
//!
//! ```text
//! Initiator                              Listener
//! ─────────                              ────────
//! connect(addr, key)
//!   ConnectRequest(key) ───────────────►  ConnectionRequest event
//!   (resent every 500 ms)                 accept(id) / reject(id)
//!   ◄────────────────────── ConnectAccept  PeerConnected event
//! PeerConnected event
//!                or
//!   ◄────────────────────── ConnectReject
//! PeerDisconnected(ConnectionRejected)
//! ```
//!
//! # Timers
//!
//! Timers are checked on every `poll_events` call, so their resolution is the
//! host's tick rate.  An outgoing attempt fails after `disconnect_timeout`
//! without an answer; an established session times out after
//! `disconnect_timeout` without any datagram from the peer, and sends a ping
//! whenever it has been silent for `ping_interval`.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::{ConnectionRequest, RequestId, Transport, TransportError, TransportEvent, TransportOptions};
use crate::config::NetworkConfig;
use crate::domain::session::{
    DeliveryMethod, DisconnectReason, SessionHandle, SessionId, SessionState, SocketErrorCode,
    UnconnectedMessageType,
};
use crate::protocol::packet::{decode_packet, encode_packet, Packet};

/// Largest datagram the engine will read.
const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Upper bound on datagrams read per `poll_events`, so a flood cannot stall a tick.
const MAX_DATAGRAMS_PER_POLL: usize = 1024;

/// Settings for [`UdpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpTransportConfig {
    pub bind_address: IpAddr,
    pub broadcast_address: IpAddr,
    pub disconnect_timeout: Duration,
    pub ping_interval: Duration,
    pub connect_retry_interval: Duration,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            broadcast_address: IpAddr::from([255, 255, 255, 255]),
            disconnect_timeout: Duration::from_millis(5000),
            ping_interval: Duration::from_millis(1000),
            connect_retry_interval: Duration::from_millis(500),
        }
    }
}

impl UdpTransportConfig {
    /// Builds the engine settings from the `[network]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidAddress`] if either address string
    /// does not parse.
    pub fn from_network(network: &NetworkConfig) -> Result<Self, TransportError> {
        let bind_address = network
            .bind_address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(network.bind_address.clone()))?;
        let broadcast_address = network
            .broadcast_address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(network.broadcast_address.clone()))?;
        Ok(Self {
            bind_address,
            broadcast_address,
            disconnect_timeout: Duration::from_millis(network.disconnect_timeout_ms),
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerState {
    Outgoing,
    Connected,
}

#[derive(Debug)]
struct Peer {
    id: SessionId,
    state: PeerState,
    /// Connect data resent with every retry of an outgoing attempt.
    connect_data: Vec<u8>,
    /// Connect data of the request this session was admitted with.  `None`
    /// for sessions we dialled.
    admitted_with: Option<Vec<u8>>,
    started_at: Instant,
    last_received: Instant,
    last_sent: Instant,
}

impl Peer {
    fn handle(&self, address: SocketAddr) -> SessionHandle {
        SessionHandle::new(self.id, address)
    }
}

#[derive(Debug)]
struct PendingRequest {
    address: SocketAddr,
    connect_data: Vec<u8>,
    received_at: Instant,
}

/// UDP implementation of [`Transport`].
pub struct UdpTransport {
    config: UdpTransportConfig,
    options: TransportOptions,
    socket: Option<UdpSocket>,
    peers: HashMap<SocketAddr, Peer>,
    pending: HashMap<RequestId, PendingRequest>,
    /// Events raised outside `poll_events` (accept, stop, send failures).
    events: Vec<TransportEvent>,
    next_session: u64,
    next_request: u64,
    recv_buf: Vec<u8>,
}

impl UdpTransport {
    /// Creates a stopped transport.
    pub fn new(config: UdpTransportConfig) -> Self {
        Self {
            config,
            options: TransportOptions::default(),
            socket: None,
            peers: HashMap::new(),
            pending: HashMap::new(),
            events: Vec::new(),
            next_session: 0,
            next_request: 0,
            recv_buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    /// The bound local address, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn allocate_session(&mut self) -> SessionId {
        let id = SessionId(self.next_session);
        self.next_session += 1;
        id
    }

    /// Sends one datagram.  Socket failures become `NetworkError` events.
    fn send_packet(&mut self, packet: &Packet<'_>, to: SocketAddr) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotRunning)?;
        let bytes = encode_packet(packet);
        match socket.send_to(&bytes, to) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                trace!("send buffer full, dropped {:?} to {to}", packet.kind());
            }
            Err(e) => {
                debug!("send to {to} failed: {e}");
                self.events.push(TransportEvent::NetworkError {
                    address: to,
                    code: SocketErrorCode::from(&e),
                });
            }
        }
        if let Some(peer) = self.peers.get_mut(&to) {
            peer.last_sent = Instant::now();
        }
        Ok(())
    }

    /// Sends a datagram whose failure has no caller to report to.
    fn send_or_log(&mut self, packet: &Packet<'_>, to: SocketAddr) {
        if let Err(e) = self.send_packet(packet, to) {
            debug!("{:?} to {to} not sent: {e}", packet.kind());
        }
    }

    fn receive_datagrams(&mut self, now: Instant) {
        let mut buf = std::mem::take(&mut self.recv_buf);
        for _ in 0..MAX_DATAGRAMS_PER_POLL {
            let Some(socket) = self.socket.as_ref() else {
                break;
            };
            match socket.recv_from(&mut buf) {
                Ok((len, from)) => self.handle_datagram(&buf[..len], from, now),
                Err(e) if is_would_block(&e) => break,
                Err(e) => {
                    let address = socket
                        .local_addr()
                        .unwrap_or_else(|_| SocketAddr::new(self.config.bind_address, 0));
                    debug!("recv error: {e}");
                    self.events.push(TransportEvent::NetworkError {
                        address,
                        code: SocketErrorCode::from(&e),
                    });
                    break;
                }
            }
        }
        self.recv_buf = buf;
    }

    fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr, now: Instant) {
        let packet = match decode_packet(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                trace!("ignoring datagram from {from}: {e}");
                return;
            }
        };

        if let Some(peer) = self.peers.get_mut(&from) {
            if peer.state == PeerState::Connected {
                peer.last_received = now;
            }
        }

        match packet {
            Packet::Unconnected(body) => {
                if self.options.unconnected_messages_enabled {
                    self.events.push(TransportEvent::ReceiveUnconnected {
                        address: from,
                        message_type: UnconnectedMessageType::Basic,
                        payload: body.to_vec(),
                    });
                }
            }
            Packet::Broadcast(body) => {
                if self.options.broadcast_receive_enabled {
                    self.events.push(TransportEvent::ReceiveUnconnected {
                        address: from,
                        message_type: UnconnectedMessageType::Broadcast,
                        payload: body.to_vec(),
                    });
                }
            }
            Packet::ConnectRequest { connect_data } => {
                self.handle_connect_request(connect_data, from, now);
            }
            Packet::ConnectAccept => {
                if let Some(peer) = self.peers.get_mut(&from) {
                    if peer.state == PeerState::Outgoing {
                        peer.state = PeerState::Connected;
                        peer.last_received = now;
                        peer.connect_data.clear();
                        let handle = peer.handle(from);
                        self.events.push(TransportEvent::PeerConnected(handle));
                    }
                }
            }
            Packet::ConnectReject => {
                if self.peers.get(&from).map(|p| p.state) == Some(PeerState::Outgoing) {
                    if let Some(peer) = self.peers.remove(&from) {
                        self.events.push(TransportEvent::PeerDisconnected {
                            session: peer.handle(from),
                            reason: DisconnectReason::ConnectionRejected,
                        });
                    }
                }
            }
            Packet::Data {
                channel,
                delivery,
                payload,
            } => {
                if let Some(peer) = self.peers.get(&from) {
                    if peer.state == PeerState::Connected {
                        self.events.push(TransportEvent::Receive {
                            session: peer.handle(from),
                            channel,
                            delivery,
                            payload: payload.to_vec(),
                        });
                    }
                }
            }
            Packet::Disconnect => {
                if let Some(peer) = self.peers.remove(&from) {
                    self.events.push(TransportEvent::PeerDisconnected {
                        session: peer.handle(from),
                        reason: DisconnectReason::RemoteConnectionClose,
                    });
                }
            }
            Packet::Ping => {
                if self.peers.get(&from).map(|p| p.state) == Some(PeerState::Connected) {
                    self.send_or_log(&Packet::Pong, from);
                }
            }
            Packet::Pong => {}
        }
    }

    fn handle_connect_request(&mut self, connect_data: &[u8], from: SocketAddr, now: Instant) {
        match self.peers.get(&from).map(|p| (p.state, p.admitted_with.as_deref())) {
            // Our accept was lost; the initiator is still retrying the same request.
            Some((PeerState::Connected, Some(admitted))) if admitted == connect_data => {
                self.send_or_log(&Packet::ConnectAccept, from);
                return;
            }
            // A new attempt from a connected address ends the old session and
            // goes through admission again.
            Some((PeerState::Connected, _)) => {
                if let Some(peer) = self.peers.remove(&from) {
                    debug!("new connect request from {from}, dropping {}", peer.id);
                    self.events.push(TransportEvent::PeerDisconnected {
                        session: peer.handle(from),
                        reason: DisconnectReason::RemoteConnectionClose,
                    });
                }
            }
            // Both sides dialled each other; our own attempt wins.
            Some((PeerState::Outgoing, _)) => return,
            None => {}
        }
        if self.pending.values().any(|p| p.address == from) {
            return;
        }
        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.pending.insert(
            id,
            PendingRequest {
                address: from,
                connect_data: connect_data.to_vec(),
                received_at: now,
            },
        );
        self.events
            .push(TransportEvent::ConnectionRequest(ConnectionRequest::new(
                id,
                from,
                connect_data.to_vec(),
            )));
    }

    fn update_timers(&mut self, now: Instant) {
        let timeout = self.config.disconnect_timeout;
        let retry = self.config.connect_retry_interval;
        let ping = self.config.ping_interval;

        let mut expired = Vec::new();
        let mut retries = Vec::new();
        let mut pings = Vec::new();
        for (&address, peer) in &self.peers {
            match peer.state {
                PeerState::Outgoing => {
                    if now.duration_since(peer.started_at) >= timeout {
                        expired.push((address, DisconnectReason::ConnectionFailed));
                    } else if now.duration_since(peer.last_sent) >= retry {
                        retries.push((address, peer.connect_data.clone()));
                    }
                }
                PeerState::Connected => {
                    if now.duration_since(peer.last_received) >= timeout {
                        expired.push((address, DisconnectReason::Timeout));
                    } else if now.duration_since(peer.last_sent) >= ping {
                        pings.push(address);
                    }
                }
            }
        }

        for (address, reason) in expired {
            if let Some(peer) = self.peers.remove(&address) {
                self.events.push(TransportEvent::PeerDisconnected {
                    session: peer.handle(address),
                    reason,
                });
            }
        }
        for (address, connect_data) in retries {
            self.send_or_log(
                &Packet::ConnectRequest {
                    connect_data: &connect_data,
                },
                address,
            );
        }
        for address in pings {
            self.send_or_log(&Packet::Ping, address);
        }

        self.pending
            .retain(|_, request| now.duration_since(request.received_at) < timeout);
    }

    fn connected_handle(&self, session: SessionId) -> Option<SessionHandle> {
        self.peers
            .iter()
            .find(|(_, p)| p.id == session && p.state == PeerState::Connected)
            .map(|(&address, p)| p.handle(address))
    }
}

impl Transport for UdpTransport {
    fn set_options(&mut self, options: TransportOptions) {
        self.options = options;
    }

    fn start(&mut self, port: Option<u16>) -> Result<SocketAddr, TransportError> {
        if self.socket.is_some() {
            return Err(TransportError::AlreadyRunning);
        }
        let addr = SocketAddr::new(self.config.bind_address, port.unwrap_or(0));
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::BindFailed { addr, source })?;
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;
        let local = socket.local_addr()?;
        self.socket = Some(socket);
        debug!("udp transport bound to {local}");
        Ok(local)
    }

    fn stop(&mut self) {
        if self.socket.is_none() {
            return;
        }
        let peers: Vec<(SocketAddr, SessionId)> =
            self.peers.iter().map(|(&a, p)| (a, p.id)).collect();
        for (address, id) in peers {
            self.send_or_log(&Packet::Disconnect, address);
            self.events.push(TransportEvent::PeerDisconnected {
                session: SessionHandle::new(id, address),
                reason: DisconnectReason::LocalShutdown,
            });
        }
        self.peers.clear();
        self.pending.clear();
        self.socket = None;
        debug!("udp transport stopped");
    }

    fn is_running(&self) -> bool {
        self.socket.is_some()
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        if self.socket.is_some() {
            let now = Instant::now();
            self.receive_datagrams(now);
            self.update_timers(now);
        }
        std::mem::take(&mut self.events)
    }

    fn connect(&mut self, address: SocketAddr, key: &str) -> Result<SessionHandle, TransportError> {
        if self.socket.is_none() {
            return Err(TransportError::NotRunning);
        }
        if let Some(peer) = self.peers.get(&address) {
            return Ok(peer.handle(address));
        }
        let id = self.allocate_session();
        let now = Instant::now();
        self.peers.insert(
            address,
            Peer {
                id,
                state: PeerState::Outgoing,
                connect_data: key.as_bytes().to_vec(),
                admitted_with: None,
                started_at: now,
                last_received: now,
                last_sent: now,
            },
        );
        self.send_packet(
            &Packet::ConnectRequest {
                connect_data: key.as_bytes(),
            },
            address,
        )?;
        Ok(SessionHandle::new(id, address))
    }

    fn accept(&mut self, request: RequestId) -> Result<SessionHandle, TransportError> {
        let pending = self
            .pending
            .remove(&request)
            .ok_or(TransportError::UnknownRequest(request))?;
        let address = pending.address;
        let now = Instant::now();
        let existing = self.peers.get(&address).map(|p| p.id);
        let id = existing.unwrap_or_else(|| self.allocate_session());
        self.peers.insert(
            address,
            Peer {
                id,
                state: PeerState::Connected,
                connect_data: Vec::new(),
                admitted_with: Some(pending.connect_data),
                started_at: now,
                last_received: now,
                last_sent: now,
            },
        );
        self.send_packet(&Packet::ConnectAccept, address)?;
        let handle = SessionHandle::new(id, address);
        self.events.push(TransportEvent::PeerConnected(handle));
        Ok(handle)
    }

    fn reject(&mut self, request: RequestId) -> Result<(), TransportError> {
        let pending = self
            .pending
            .remove(&request)
            .ok_or(TransportError::UnknownRequest(request))?;
        self.send_packet(&Packet::ConnectReject, pending.address)
    }

    fn send(
        &mut self,
        session: SessionId,
        channel: u8,
        delivery: DeliveryMethod,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if self.socket.is_none() {
            return Err(TransportError::NotRunning);
        }
        let handle = self
            .connected_handle(session)
            .ok_or(TransportError::UnknownSession(session))?;
        self.send_packet(
            &Packet::Data {
                channel,
                delivery,
                payload,
            },
            handle.address,
        )
    }

    fn send_broadcast(&mut self, payload: &[u8], port: u16) -> Result<(), TransportError> {
        let to = SocketAddr::new(self.config.broadcast_address, port);
        self.send_packet(&Packet::Broadcast(payload), to)
    }

    fn send_unconnected(
        &mut self,
        payload: &[u8],
        address: SocketAddr,
    ) -> Result<(), TransportError> {
        self.send_packet(&Packet::Unconnected(payload), address)
    }

    fn session_count(&self) -> usize {
        self.peers.len()
    }

    fn connected_count(&self) -> usize {
        self.peers
            .values()
            .filter(|p| p.state == PeerState::Connected)
            .count()
    }

    fn session_state(&self, session: SessionId) -> SessionState {
        match self.peers.values().find(|p| p.id == session) {
            Some(peer) if peer.state == PeerState::Connected => SessionState::Connected,
            Some(_) => SessionState::Connecting,
            None => SessionState::Disconnected,
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if self.socket.is_some() && !self.peers.is_empty() {
            warn!(
                "udp transport dropped with {} live session(s); sending disconnects",
                self.peers.len()
            );
            self.stop();
        }
    }
}

/// Returns `true` for the "nothing to read right now" errors of a
/// non-blocking socket.
fn is_would_block(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
