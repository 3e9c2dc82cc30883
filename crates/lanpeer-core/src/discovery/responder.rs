//! Discovery responder: the server half of LAN discovery.
//!
//! Every broadcast-classified datagram gets exactly one direct reply to its
//! sender, whatever the payload and however many sessions already exist.
//! Repeated probes from the same sender are answered each time; the client
//! stops probing once it connects, so there is nothing to deduplicate.

use tracing::{trace, warn};

use crate::domain::events::ReceiveUnconnectedEvent;
use crate::domain::session::UnconnectedMessageType;
use crate::protocol::payload::encode_discovery_reply;
use crate::transport::Transport;

/// Server-side discovery: answers broadcast probes.
#[derive(Debug, Clone)]
pub struct DiscoveryResponder {
    reply_enabled: bool,
}

impl DiscoveryResponder {
    pub fn new(reply_enabled: bool) -> Self {
        Self { reply_enabled }
    }

    /// Sends a discovery reply to the sender of a broadcast datagram.
    ///
    /// Returns `true` if a reply was handed to the transport.
    pub fn on_unconnected<T: Transport + ?Sized>(
        &self,
        event: &ReceiveUnconnectedEvent,
        transport: &mut T,
    ) -> bool {
        if !self.reply_enabled || event.message_type != UnconnectedMessageType::Broadcast {
            return false;
        }
        match transport.send_unconnected(&encode_discovery_reply(), event.address) {
            Ok(()) => {
                trace!("discovery reply sent to {}", event.address);
                true
            }
            Err(e) => {
                warn!("discovery reply to {} not sent: {e}", event.address);
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::protocol::payload::{decode_discovery_reply, encode_discovery_probe};
    use crate::transport::scripted::ScriptedTransport;

    fn client_addr() -> SocketAddr {
        "192.168.1.77:53001".parse().unwrap()
    }

    fn started() -> ScriptedTransport {
        let mut transport = ScriptedTransport::new("0.0.0.0:9055".parse().unwrap());
        transport.start(Some(9055)).unwrap();
        transport
    }

    fn probe(message_type: UnconnectedMessageType) -> ReceiveUnconnectedEvent {
        ReceiveUnconnectedEvent::new(client_addr(), message_type, encode_discovery_probe())
    }

    #[test]
    fn test_broadcast_gets_one_direct_reply() {
        // Arrange
        let responder = DiscoveryResponder::new(true);
        let mut transport = started();

        // Act
        let replied = responder.on_unconnected(&probe(UnconnectedMessageType::Broadcast), &mut transport);

        // Assert
        assert!(replied);
        let sends = transport.unconnected_sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].1, client_addr());
        assert_eq!(decode_discovery_reply(&sends[0].0), Some(1));
        assert!(transport.broadcasts().is_empty(), "replies are never rebroadcast");
    }

    #[test]
    fn test_replies_regardless_of_session_count() {
        // Arrange
        let responder = DiscoveryResponder::new(true);
        let mut transport = started();
        transport.raise_connected("192.168.1.50:40000".parse().unwrap());
        transport.raise_connected("192.168.1.51:40000".parse().unwrap());

        // Act
        let replied = responder.on_unconnected(&probe(UnconnectedMessageType::Broadcast), &mut transport);

        // Assert
        assert!(replied);
        assert_eq!(transport.unconnected_sends().len(), 1);
    }

    #[test]
    fn test_repeated_probes_are_not_deduplicated() {
        let responder = DiscoveryResponder::new(true);
        let mut transport = started();
        for _ in 0..3 {
            responder.on_unconnected(&probe(UnconnectedMessageType::Broadcast), &mut transport);
        }
        assert_eq!(transport.unconnected_sends().len(), 3);
    }

    #[test]
    fn test_basic_messages_are_not_answered() {
        let responder = DiscoveryResponder::new(true);
        let mut transport = started();
        assert!(!responder.on_unconnected(&probe(UnconnectedMessageType::Basic), &mut transport));
        assert!(transport.unconnected_sends().is_empty());
    }

    #[test]
    fn test_disabled_responder_stays_silent() {
        let responder = DiscoveryResponder::new(false);
        let mut transport = started();
        assert!(!responder.on_unconnected(&probe(UnconnectedMessageType::Broadcast), &mut transport));
        assert!(transport.unconnected_sends().is_empty());
    }
}
