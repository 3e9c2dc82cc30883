//! Session handles and the small enums that describe a session's life.
//!
//! # Who owns a session? (for beginners)
//!
//! The transport engine owns every session: it holds the socket address, the
//! timers and the per-peer state.  Everything else in lanpeer only holds a
//! [`SessionHandle`], a small `Copy` value naming the session.  Holding a
//! handle never keeps a session alive, and dropping one never closes it.
//! To learn whether a session is still up, ask the transport via
//! [`crate::Transport::session_state`].

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Opaque numeric identifier the transport assigns to a session.
///
/// Stable for the session's lifetime and never reused for another remote
/// endpoint while the session is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-owning reference to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: SessionId,
    pub address: SocketAddr,
}

impl SessionHandle {
    pub fn new(id: SessionId, address: SocketAddr) -> Self {
        Self { id, address }
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.address)
    }
}

/// Lifecycle state of a session as seen by the local transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// An outgoing attempt is in flight.
    Connecting,
    /// The session is established.
    Connected,
    /// The session has ended, or was never known.
    Disconnected,
}

/// Delivery guarantee requested for a payload.
///
/// The tag travels with every data packet; honouring it is the transport
/// engine's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeliveryMethod {
    Unreliable = 0x00,
    ReliableUnordered = 0x01,
    Sequenced = 0x02,
    ReliableOrdered = 0x03,
    ReliableSequenced = 0x04,
}

impl TryFrom<u8> for DeliveryMethod {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x00 => Ok(DeliveryMethod::Unreliable),
            0x01 => Ok(DeliveryMethod::ReliableUnordered),
            0x02 => Ok(DeliveryMethod::Sequenced),
            0x03 => Ok(DeliveryMethod::ReliableOrdered),
            0x04 => Ok(DeliveryMethod::ReliableSequenced),
            _ => Err(()),
        }
    }
}

/// How an unconnected datagram reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnconnectedMessageType {
    /// Sent directly to this endpoint's address.
    Basic,
    /// Sent to the broadcast address.
    Broadcast,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// An outgoing attempt got no answer before the timeout.
    ConnectionFailed,
    /// The remote admission policy rejected our attempt.
    ConnectionRejected,
    /// Nothing was heard from the peer within the disconnect timeout.
    Timeout,
    /// The peer closed the session.
    RemoteConnectionClose,
    /// The local transport was stopped.
    LocalShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DisconnectReason::ConnectionFailed => "connection failed",
            DisconnectReason::ConnectionRejected => "connection rejected",
            DisconnectReason::Timeout => "timeout",
            DisconnectReason::RemoteConnectionClose => "remote connection close",
            DisconnectReason::LocalShutdown => "local shutdown",
        };
        f.write_str(text)
    }
}

/// Socket-level error code carried by [`crate::ErrorEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketErrorCode {
    pub kind: std::io::ErrorKind,
    /// Raw OS error number, when the platform supplied one.
    pub os_code: Option<i32>,
}

impl From<&std::io::Error> for SocketErrorCode {
    fn from(e: &std::io::Error) -> Self {
        Self {
            kind: e.kind(),
            os_code: e.raw_os_error(),
        }
    }
}

impl fmt::Display for SocketErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.os_code {
            Some(code) => write!(f, "{:?} (os error {code})", self.kind),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
