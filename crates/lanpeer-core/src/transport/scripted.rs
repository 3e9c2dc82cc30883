//! Scripted in-memory transport for testing.
//!
//! Allows tests to raise synthetic [`TransportEvent`]s and inspect every
//! outbound call without binding a socket.  Sessions created through
//! `connect` stay in `Connecting` until the test calls
//! [`ScriptedTransport::complete_connect`].

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

use super::{ConnectionRequest, RequestId, Transport, TransportError, TransportEvent, TransportOptions};
use crate::domain::session::{
    DeliveryMethod, DisconnectReason, SessionHandle, SessionId, SessionState, SocketErrorCode,
    UnconnectedMessageType,
};

/// One recorded call to [`Transport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentData {
    pub session: SessionId,
    pub channel: u8,
    pub delivery: DeliveryMethod,
    pub payload: Vec<u8>,
}

/// A [`Transport`] whose inbound side is driven by the test.
#[derive(Debug)]
pub struct ScriptedTransport {
    local_addr: SocketAddr,
    running: bool,
    options: TransportOptions,
    queued: Vec<TransportEvent>,
    sessions: BTreeMap<SessionId, (SessionHandle, SessionState)>,
    pending: HashMap<RequestId, SocketAddr>,
    next_session: u64,
    next_request: u64,
    broadcasts: Vec<(Vec<u8>, u16)>,
    unconnected: Vec<(Vec<u8>, SocketAddr)>,
    connects: Vec<(SocketAddr, String)>,
    accepted: Vec<RequestId>,
    rejected: Vec<RequestId>,
    sent: Vec<SentData>,
}

impl ScriptedTransport {
    /// Creates a stopped transport that will report `local_addr` once started.
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            running: false,
            options: TransportOptions::default(),
            queued: Vec::new(),
            sessions: BTreeMap::new(),
            pending: HashMap::new(),
            next_session: 0,
            next_request: 0,
            broadcasts: Vec::new(),
            unconnected: Vec::new(),
            connects: Vec::new(),
            accepted: Vec::new(),
            rejected: Vec::new(),
            sent: Vec::new(),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    // ── Raising inbound events ───────────────────────────────────────────────

    /// Queues an arbitrary event.
    pub fn push_event(&mut self, event: TransportEvent) {
        self.queued.push(event);
    }

    /// Queues an unconnected datagram from `address`.
    pub fn raise_unconnected(
        &mut self,
        address: SocketAddr,
        message_type: UnconnectedMessageType,
        payload: &[u8],
    ) {
        self.queued.push(TransportEvent::ReceiveUnconnected {
            address,
            message_type,
            payload: payload.to_vec(),
        });
    }

    /// Queues a connection request from `address` carrying `connect_data`.
    pub fn raise_connection_request(&mut self, address: SocketAddr, connect_data: &[u8]) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.pending.insert(id, address);
        self.queued.push(TransportEvent::ConnectionRequest(ConnectionRequest::new(
            id,
            address,
            connect_data.to_vec(),
        )));
        id
    }

    /// Creates a connected session with `address` and queues its connect event.
    pub fn raise_connected(&mut self, address: SocketAddr) -> SessionHandle {
        let handle = self.allocate(address, SessionState::Connected);
        self.queued.push(TransportEvent::PeerConnected(handle));
        handle
    }

    /// Moves an outgoing attempt created by `connect` to the connected state.
    pub fn complete_connect(&mut self, session: SessionId) -> Option<SessionHandle> {
        let (handle, state) = self.sessions.get_mut(&session)?;
        *state = SessionState::Connected;
        let handle = *handle;
        self.queued.push(TransportEvent::PeerConnected(handle));
        Some(handle)
    }

    /// Removes a session and queues its disconnect event.
    pub fn raise_disconnected(&mut self, session: SessionHandle, reason: DisconnectReason) {
        self.sessions.remove(&session.id);
        self.queued
            .push(TransportEvent::PeerDisconnected { session, reason });
    }

    /// Queues application data on `session`.
    pub fn raise_receive(
        &mut self,
        session: SessionHandle,
        channel: u8,
        delivery: DeliveryMethod,
        payload: &[u8],
    ) {
        self.queued.push(TransportEvent::Receive {
            session,
            channel,
            delivery,
            payload: payload.to_vec(),
        });
    }

    /// Queues a socket-level error.
    pub fn raise_network_error(&mut self, address: SocketAddr, kind: std::io::ErrorKind) {
        self.queued.push(TransportEvent::NetworkError {
            address,
            code: SocketErrorCode {
                kind,
                os_code: None,
            },
        });
    }

    // ── Recorded outbound calls ──────────────────────────────────────────────

    pub fn options(&self) -> TransportOptions {
        self.options
    }

    pub fn broadcasts(&self) -> &[(Vec<u8>, u16)] {
        &self.broadcasts
    }

    pub fn unconnected_sends(&self) -> &[(Vec<u8>, SocketAddr)] {
        &self.unconnected
    }

    pub fn connects(&self) -> &[(SocketAddr, String)] {
        &self.connects
    }

    pub fn accepted(&self) -> &[RequestId] {
        &self.accepted
    }

    pub fn rejected(&self) -> &[RequestId] {
        &self.rejected
    }

    pub fn sent(&self) -> &[SentData] {
        &self.sent
    }

    /// Forgets every recorded outbound call.
    pub fn clear_records(&mut self) {
        self.broadcasts.clear();
        self.unconnected.clear();
        self.connects.clear();
        self.accepted.clear();
        self.rejected.clear();
        self.sent.clear();
    }

    fn allocate(&mut self, address: SocketAddr, state: SessionState) -> SessionHandle {
        let handle = SessionHandle::new(SessionId(self.next_session), address);
        self.next_session += 1;
        self.sessions.insert(handle.id, (handle, state));
        handle
    }

    fn ensure_running(&self) -> Result<(), TransportError> {
        if self.running {
            Ok(())
        } else {
            Err(TransportError::NotRunning)
        }
    }
}

impl Transport for ScriptedTransport {
    fn set_options(&mut self, options: TransportOptions) {
        self.options = options;
    }

    fn start(&mut self, port: Option<u16>) -> Result<SocketAddr, TransportError> {
        if self.running {
            return Err(TransportError::AlreadyRunning);
        }
        if let Some(port) = port {
            self.local_addr.set_port(port);
        }
        self.running = true;
        Ok(self.local_addr)
    }

    fn stop(&mut self) {
        self.running = false;
        self.pending.clear();
        let sessions = std::mem::take(&mut self.sessions);
        for (handle, _) in sessions.into_values() {
            self.queued.push(TransportEvent::PeerDisconnected {
                session: handle,
                reason: DisconnectReason::LocalShutdown,
            });
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut self.queued)
    }

    fn connect(&mut self, address: SocketAddr, key: &str) -> Result<SessionHandle, TransportError> {
        self.ensure_running()?;
        self.connects.push((address, key.to_string()));
        if let Some((handle, _)) = self.sessions.values().find(|(h, _)| h.address == address) {
            return Ok(*handle);
        }
        Ok(self.allocate(address, SessionState::Connecting))
    }

    fn accept(&mut self, request: RequestId) -> Result<SessionHandle, TransportError> {
        let address = self
            .pending
            .remove(&request)
            .ok_or(TransportError::UnknownRequest(request))?;
        self.accepted.push(request);
        Ok(self.raise_connected(address))
    }

    fn reject(&mut self, request: RequestId) -> Result<(), TransportError> {
        self.pending
            .remove(&request)
            .ok_or(TransportError::UnknownRequest(request))?;
        self.rejected.push(request);
        Ok(())
    }

    fn send(
        &mut self,
        session: SessionId,
        channel: u8,
        delivery: DeliveryMethod,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.ensure_running()?;
        match self.sessions.get(&session) {
            Some((_, SessionState::Connected)) => {
                self.sent.push(SentData {
                    session,
                    channel,
                    delivery,
                    payload: payload.to_vec(),
                });
                Ok(())
            }
            _ => Err(TransportError::UnknownSession(session)),
        }
    }

    fn send_broadcast(&mut self, payload: &[u8], port: u16) -> Result<(), TransportError> {
        self.ensure_running()?;
        self.broadcasts.push((payload.to_vec(), port));
        Ok(())
    }

    fn send_unconnected(
        &mut self,
        payload: &[u8],
        address: SocketAddr,
    ) -> Result<(), TransportError> {
        self.ensure_running()?;
        self.unconnected.push((payload.to_vec(), address));
        Ok(())
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn connected_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|(_, state)| *state == SessionState::Connected)
            .count()
    }

    fn session_state(&self, session: SessionId) -> SessionState {
        self.sessions
            .get(&session)
            .map(|(_, state)| *state)
            .unwrap_or(SessionState::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_scripted_transport_poll_drains_events_in_order() {
        // Arrange
        let mut transport = ScriptedTransport::new(addr("127.0.0.1:0"));
        let peer = addr("10.0.0.5:9055");
        transport.raise_unconnected(peer, UnconnectedMessageType::Basic, &[1]);
        transport.raise_network_error(peer, std::io::ErrorKind::ConnectionReset);

        // Act
        let first = transport.poll_events();
        let second = transport.poll_events();

        // Assert
        assert_eq!(first.len(), 2);
        assert!(matches!(first[0], TransportEvent::ReceiveUnconnected { .. }));
        assert!(matches!(first[1], TransportEvent::NetworkError { .. }));
        assert!(second.is_empty());
    }

    #[test]
    fn test_scripted_transport_sends_fail_before_start() {
        let mut transport = ScriptedTransport::new(addr("127.0.0.1:0"));
        let result = transport.send_broadcast(&[1], 9055);
        assert!(matches!(result, Err(TransportError::NotRunning)));
    }

    #[test]
    fn test_scripted_transport_connect_then_complete() {
        // Arrange
        let mut transport = ScriptedTransport::new(addr("127.0.0.1:0"));
        transport.start(None).unwrap();
        let server = addr("10.0.0.1:9055");

        // Act
        let handle = transport.connect(server, "TestKey").unwrap();
        let state_before = transport.session_state(handle.id);
        transport.complete_connect(handle.id);

        // Assert
        assert_eq!(state_before, SessionState::Connecting);
        assert_eq!(transport.session_state(handle.id), SessionState::Connected);
        assert_eq!(transport.session_count(), 1);
        assert_eq!(transport.connected_count(), 1);
        assert_eq!(transport.connects(), &[(server, "TestKey".to_string())]);
    }

    #[test]
    fn test_scripted_transport_request_can_only_be_decided_once() {
        // Arrange
        let mut transport = ScriptedTransport::new(addr("127.0.0.1:9055"));
        transport.start(Some(9055)).unwrap();
        let id = transport.raise_connection_request(addr("10.0.0.7:5000"), b"k");

        // Act
        let first = transport.reject(id);
        let second = transport.accept(id);

        // Assert
        assert!(first.is_ok());
        assert!(matches!(second, Err(TransportError::UnknownRequest(_))));
        assert_eq!(transport.rejected(), &[id]);
        assert_eq!(transport.connected_count(), 0);
    }

    #[test]
    fn test_scripted_transport_stop_queues_local_shutdown() {
        // Arrange
        let mut transport = ScriptedTransport::new(addr("127.0.0.1:0"));
        transport.start(None).unwrap();
        let handle = transport.raise_connected(addr("10.0.0.8:9055"));
        transport.poll_events();

        // Act
        transport.stop();
        let events = transport.poll_events();

        // Assert
        assert!(!transport.is_running());
        assert_eq!(transport.session_count(), 0);
        match &events[..] {
            [TransportEvent::PeerDisconnected { session, reason }] => {
                assert_eq!(*session, handle);
                assert_eq!(*reason, DisconnectReason::LocalShutdown);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }
}
