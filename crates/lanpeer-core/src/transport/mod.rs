//! Transport engine abstraction.
//!
//! The transport engine owns the socket, the per-peer state and every timer.
//! lanpeer's protocol logic never touches a socket directly; it talks to the
//! engine through the [`Transport`] trait:
//!
//! - [`Transport::poll_events`] drains whatever the engine has observed since
//!   the last call and returns it as an ordered batch of [`TransportEvent`]s.
//!   It never blocks.
//! - The send primitives (`send`, `send_broadcast`, `send_unconnected`) and
//!   `connect`/`accept`/`reject` are fire-and-forget.  Socket-level failures
//!   are *not* returned from them; they show up later as
//!   [`TransportEvent::NetworkError`].  The `Err` side of their results is
//!   reserved for misuse, such as sending before `start` or naming a session
//!   that does not exist.
//!
//! # Testability
//!
//! [`scripted::ScriptedTransport`] lets tests queue events and inspect every
//! outbound call without opening a socket.  [`udp::UdpTransport`] is the
//! reference engine used by the binaries.

use std::net::SocketAddr;

use thiserror::Error;

use crate::domain::session::{
    DeliveryMethod, DisconnectReason, SessionHandle, SessionId, SessionState, SocketErrorCode,
    UnconnectedMessageType,
};

pub mod scripted;
pub mod udp;

/// Error type for transport misuse.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An operation that needs a socket was called before `start` or after `stop`.
    #[error("transport is not running")]
    NotRunning,
    /// `start` was called on a running transport.
    #[error("transport is already running")]
    AlreadyRunning,
    /// The UDP socket could not be bound.
    #[error("failed to bind transport socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// Socket configuration after binding failed.
    #[error("socket setup error: {0}")]
    Io(#[from] std::io::Error),
    /// A configured address string could not be parsed.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    /// No connected session has this identifier.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    /// The connection request was already decided or has expired.
    #[error("unknown or already decided connection request {0:?}")]
    UnknownRequest(RequestId),
}

/// Identifier for one pending incoming connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// An incoming connection attempt awaiting an admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub id: RequestId,
    pub address: SocketAddr,
    connect_data: Vec<u8>,
}

impl ConnectionRequest {
    pub fn new(id: RequestId, address: SocketAddr, connect_data: Vec<u8>) -> Self {
        Self {
            id,
            address,
            connect_data,
        }
    }

    /// Raw bytes the initiator attached to its attempt.
    pub fn connect_data(&self) -> &[u8] {
        &self.connect_data
    }

    /// The connect data as a key string, if it is valid UTF-8.
    pub fn key(&self) -> Option<&str> {
        std::str::from_utf8(&self.connect_data).ok()
    }
}

/// Socket behaviour switches applied before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Deliver datagrams that were sent to the broadcast address.
    pub broadcast_receive_enabled: bool,
    /// Deliver datagrams sent directly to us outside any session.
    pub unconnected_messages_enabled: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            broadcast_receive_enabled: false,
            unconnected_messages_enabled: true,
        }
    }
}

/// Everything a transport engine can report from `poll_events`.
#[derive(Debug)]
pub enum TransportEvent {
    /// A remote endpoint wants to open a session.
    ConnectionRequest(ConnectionRequest),
    /// A socket-level failure.
    NetworkError {
        address: SocketAddr,
        code: SocketErrorCode,
    },
    /// Data on an established session.
    Receive {
        session: SessionHandle,
        channel: u8,
        delivery: DeliveryMethod,
        payload: Vec<u8>,
    },
    /// A datagram from outside any session.
    ReceiveUnconnected {
        address: SocketAddr,
        message_type: UnconnectedMessageType,
        payload: Vec<u8>,
    },
    /// A session reached the connected state.
    PeerConnected(SessionHandle),
    /// A session ended.
    PeerDisconnected {
        session: SessionHandle,
        reason: DisconnectReason,
    },
}

/// The transport engine interface consumed by [`crate::Endpoint`].
pub trait Transport {
    /// Applies socket behaviour switches.  Takes effect for datagrams received
    /// after the call.
    fn set_options(&mut self, options: TransportOptions);

    /// Binds the socket.  `None` picks an ephemeral port.
    ///
    /// Returns the bound local address.
    fn start(&mut self, port: Option<u16>) -> Result<SocketAddr, TransportError>;

    /// Closes every session and releases the socket.  The resulting
    /// disconnect events are returned by the next `poll_events`.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Drains pending events in the order they were raised.  Never blocks.
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    /// Starts an outgoing connection attempt carrying `key` as connect data.
    fn connect(&mut self, address: SocketAddr, key: &str) -> Result<SessionHandle, TransportError>;

    /// Admits a pending connection request.
    fn accept(&mut self, request: RequestId) -> Result<SessionHandle, TransportError>;

    /// Refuses a pending connection request.
    fn reject(&mut self, request: RequestId) -> Result<(), TransportError>;

    /// Sends application data on an established session.
    fn send(
        &mut self,
        session: SessionId,
        channel: u8,
        delivery: DeliveryMethod,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Broadcasts an unconnected datagram to `port` on the local network.
    fn send_broadcast(&mut self, payload: &[u8], port: u16) -> Result<(), TransportError>;

    /// Sends an unconnected datagram directly to `address`.
    fn send_unconnected(&mut self, payload: &[u8], address: SocketAddr)
        -> Result<(), TransportError>;

    /// Sessions that are not disconnected, including outgoing attempts.
    fn session_count(&self) -> usize;

    /// Sessions in the connected state.
    fn connected_count(&self) -> usize;

    fn session_state(&self, session: SessionId) -> SessionState;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
