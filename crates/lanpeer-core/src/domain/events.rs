//! Event envelopes delivered to subscribers.
//!
//! One envelope type exists per event kind, each carrying only what a
//! subscriber needs to act.  Envelopes are built by the endpoint at dispatch
//! time, lent to every subscriber by shared reference and dropped when the
//! dispatch ends.  Payload bytes are reached through [`PayloadReader`], whose
//! borrow ties it to the envelope, so a cursor cannot escape the tick.

use std::fmt;
use std::net::SocketAddr;

use crate::domain::session::{
    DeliveryMethod, DisconnectReason, SessionHandle, SocketErrorCode, UnconnectedMessageType,
};
use crate::protocol::payload::PayloadReader;

/// Data arrived on an established session.
#[derive(Debug)]
pub struct ReceiveEvent {
    pub session: SessionHandle,
    pub channel: u8,
    pub delivery: DeliveryMethod,
    payload: Vec<u8>,
}

impl ReceiveEvent {
    pub fn new(
        session: SessionHandle,
        channel: u8,
        delivery: DeliveryMethod,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            session,
            channel,
            delivery,
            payload,
        }
    }

    /// Returns a fresh read cursor positioned at the start of the payload.
    pub fn reader(&self) -> PayloadReader<'_> {
        PayloadReader::new(&self.payload)
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A datagram arrived from outside any session.
#[derive(Debug)]
pub struct ReceiveUnconnectedEvent {
    pub address: SocketAddr,
    pub message_type: UnconnectedMessageType,
    payload: Vec<u8>,
}

impl ReceiveUnconnectedEvent {
    pub fn new(address: SocketAddr, message_type: UnconnectedMessageType, payload: Vec<u8>) -> Self {
        Self {
            address,
            message_type,
            payload,
        }
    }

    /// Returns a fresh read cursor positioned at the start of the payload.
    pub fn reader(&self) -> PayloadReader<'_> {
        PayloadReader::new(&self.payload)
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A socket-level failure involving `address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEvent {
    pub address: SocketAddr,
    pub code: SocketErrorCode,
}

/// A session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectEvent {
    pub session: SessionHandle,
    pub reason: DisconnectReason,
}

/// A session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectEvent {
    pub session: SessionHandle,
}

/// Event kinds with their own subscriber list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Receive,
    ReceiveUnconnected,
    Error,
    Disconnect,
    Connect,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EventKind::Receive => "receive",
            EventKind::ReceiveUnconnected => "receive-unconnected",
            EventKind::Error => "error",
            EventKind::Disconnect => "disconnect",
            EventKind::Connect => "connect",
        };
        f.write_str(text)
    }
}

/// One envelope of any kind, as routed by [`crate::EventRouter::route`].
#[derive(Debug)]
pub enum SessionEvent {
    Receive(ReceiveEvent),
    ReceiveUnconnected(ReceiveUnconnectedEvent),
    Error(ErrorEvent),
    Disconnect(DisconnectEvent),
    Connect(ConnectEvent),
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Receive(_) => EventKind::Receive,
            SessionEvent::ReceiveUnconnected(_) => EventKind::ReceiveUnconnected,
            SessionEvent::Error(_) => EventKind::Error,
            SessionEvent::Disconnect(_) => EventKind::Disconnect,
            SessionEvent::Connect(_) => EventKind::Connect,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionId;

    fn handle() -> SessionHandle {
        SessionHandle::new(SessionId(1), "192.168.1.20:9055".parse().unwrap())
    }

    #[test]
    fn test_receive_event_reader_starts_at_payload_beginning() {
        // Arrange
        let event = ReceiveEvent::new(handle(), 0, DeliveryMethod::ReliableOrdered, vec![5, 6]);

        // Act
        let mut first = event.reader();
        first.read_u8().unwrap();
        let mut second = event.reader();

        // Assert – each reader is independent
        assert_eq!(second.read_u8().unwrap(), 5);
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn test_receive_unconnected_event_exposes_sender_and_type() {
        // Arrange
        let addr: SocketAddr = "192.168.1.30:40000".parse().unwrap();

        // Act
        let event = ReceiveUnconnectedEvent::new(addr, UnconnectedMessageType::Broadcast, vec![1]);

        // Assert
        assert_eq!(event.address, addr);
        assert_eq!(event.message_type, UnconnectedMessageType::Broadcast);
        assert!(!event.is_empty());
    }

    #[test]
    fn test_session_event_kind_matches_variant() {
        let connect = SessionEvent::Connect(ConnectEvent { session: handle() });
        let disconnect = SessionEvent::Disconnect(DisconnectEvent {
            session: handle(),
            reason: DisconnectReason::Timeout,
        });
        assert_eq!(connect.kind(), EventKind::Connect);
        assert_eq!(disconnect.kind(), EventKind::Disconnect);
        assert_eq!(EventKind::ReceiveUnconnected.to_string(), "receive-unconnected");
    }

    #[test]
    fn test_empty_payload_reports_empty() {
        let event = ReceiveEvent::new(handle(), 2, DeliveryMethod::Unreliable, Vec::new());
        assert!(event.is_empty());
        assert!(event.reader().is_empty());
    }
}
