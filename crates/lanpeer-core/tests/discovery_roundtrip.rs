//! Integration tests for the full discovery flow between a client and a
//! server endpoint.
//!
//! # Purpose
//!
//! Both endpoints run over [`ScriptedTransport`]s.  The test plays the
//! network: whatever one side broadcasts or sends unconnected is handed to
//! the other side as an incoming datagram, classified the way a real socket
//! would classify it.  This checks the whole probe → reply → connect chain
//! through the public API without binding sockets.
//!
//! ```text
//! Client                                   Server
//! ──────                                   ──────
//! tick: broadcast [0x01] to :9055 ───────► Broadcast datagram
//!                                          tick: reply i32 1 to client
//! Basic datagram ◄────────────────────────
//! tick: connect(server:9055, "TestKey")
//!       ───────── connection request ────► tick: admission accepts
//! Connect event ◄────────────────────────── Connect event
//! tick: no more probes
//! ```

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Instant;

use lanpeer_core::protocol::{decode_discovery_reply, is_discovery_probe};
use lanpeer_core::transport::scripted::ScriptedTransport;
use lanpeer_core::{
    AppConfig, DisconnectReason, Endpoint, Transport, UnconnectedMessageType,
};

const CLIENT_ADDR: &str = "192.168.1.20:50000";
const SERVER_IP: &str = "192.168.1.10";

fn client_addr() -> SocketAddr {
    CLIENT_ADDR.parse().unwrap()
}

fn server_addr() -> SocketAddr {
    format!("{SERVER_IP}:9055").parse().unwrap()
}

fn endpoints(config: &AppConfig) -> (Endpoint<ScriptedTransport>, Endpoint<ScriptedTransport>) {
    let mut client = Endpoint::client(ScriptedTransport::new(client_addr()), config);
    let mut server = Endpoint::server(
        ScriptedTransport::new(format!("{SERVER_IP}:0").parse().unwrap()),
        config,
    );
    client.start().unwrap();
    server.start().unwrap();
    (client, server)
}

/// Delivers every probe the client broadcast to the server as a broadcast datagram.
fn relay_probes(client: &mut Endpoint<ScriptedTransport>, server: &mut Endpoint<ScriptedTransport>) {
    let from = client.transport().local_addr();
    let probes: Vec<Vec<u8>> = client
        .transport()
        .broadcasts()
        .iter()
        .filter(|(_, port)| *port == server_addr().port())
        .map(|(payload, _)| payload.clone())
        .collect();
    for payload in probes {
        server
            .transport_mut()
            .raise_unconnected(from, UnconnectedMessageType::Broadcast, &payload);
    }
    client.transport_mut().clear_records();
}

/// Delivers every direct datagram the server sent to the client.
fn relay_replies(server: &mut Endpoint<ScriptedTransport>, client: &mut Endpoint<ScriptedTransport>) {
    let from = server_addr();
    let replies: Vec<Vec<u8>> = server
        .transport()
        .unconnected_sends()
        .iter()
        .filter(|(_, to)| *to == client_addr())
        .map(|(payload, _)| payload.clone())
        .collect();
    for payload in replies {
        client
            .transport_mut()
            .raise_unconnected(from, UnconnectedMessageType::Basic, &payload);
    }
    server.transport_mut().clear_records();
}

// ── Discovery round trip ──────────────────────────────────────────────────────

#[test]
fn test_probe_reply_connect_round_trip() {
    // Arrange
    let config = AppConfig::default();
    let (mut client, mut server) = endpoints(&config);
    let now = Instant::now();

    // Act 1 – the lonely client probes
    let report = client.tick(now).unwrap();
    assert_eq!(report.probes_sent, 1);
    assert!(is_discovery_probe(&client.transport().broadcasts()[0].0));

    // Act 2 – the server answers the probe directly
    relay_probes(&mut client, &mut server);
    let report = server.tick(now).unwrap();
    assert_eq!(report.replies_sent, 1);
    let (reply, to) = server.transport().unconnected_sends()[0].clone();
    assert_eq!(to, client_addr());
    assert_eq!(decode_discovery_reply(&reply), Some(1));

    // Act 3 – the client connects to whoever answered
    relay_replies(&mut server, &mut client);
    let report = client.tick(now).unwrap();

    // Assert
    assert_eq!(report.connects_started, 1);
    assert_eq!(report.probes_sent, 0, "attempt in flight, probing paused");
    assert_eq!(
        client.transport().connects(),
        &[(server_addr(), "TestKey".to_string())]
    );
}

#[test]
fn test_session_established_after_handshake_stops_probing() {
    // Arrange
    let config = AppConfig::default();
    let (mut client, mut server) = endpoints(&config);
    let now = Instant::now();
    let client_connects = Rc::new(RefCell::new(Vec::new()));
    let server_connects = Rc::new(RefCell::new(Vec::new()));
    let c = Rc::clone(&client_connects);
    client.events().on_connect(move |e| {
        c.borrow_mut().push(e.session.address);
        Ok(())
    });
    let s = Rc::clone(&server_connects);
    server.events().on_connect(move |e| {
        s.borrow_mut().push(e.session.address);
        Ok(())
    });

    client.tick(now).unwrap();
    relay_probes(&mut client, &mut server);
    server.tick(now).unwrap();
    relay_replies(&mut server, &mut client);
    client.tick(now).unwrap();

    // Act – carry the attempt's key to the server, then complete it on the client
    let (address, key) = client.transport().connects()[0].clone();
    assert_eq!(address, server_addr());
    server
        .transport_mut()
        .raise_connection_request(client_addr(), key.as_bytes());
    let server_report = server.tick(now).unwrap();
    let attempt = client.transport().connects().len();
    assert_eq!(attempt, 1);
    let session = client
        .transport_mut()
        .complete_connect(lanpeer_core::SessionId(0))
        .expect("attempt session exists");
    let client_report = client.tick(now).unwrap();

    // Assert
    assert_eq!(server_report.requests_accepted, 1);
    assert_eq!(*server_connects.borrow(), vec![client_addr()]);
    assert_eq!(*client_connects.borrow(), vec![server_addr()]);
    assert_eq!(session.address, server_addr());
    assert_eq!(client_report.probes_sent, 0);
    assert_eq!(client.connection_count(), 1);
    for _ in 0..5 {
        assert_eq!(client.tick(now).unwrap().probes_sent, 0);
    }
}

#[test]
fn test_wrong_key_is_rejected_and_client_resumes_probing() {
    // Arrange
    let mut server_config = AppConfig::default();
    server_config.network.key = lanpeer_core::AdmissionKey::new("ServerSecret");
    let client_config = AppConfig::default();
    let mut server = Endpoint::server(ScriptedTransport::new(server_addr()), &server_config);
    let mut client = Endpoint::client(ScriptedTransport::new(client_addr()), &client_config);
    server.start().unwrap();
    client.start().unwrap();
    let now = Instant::now();
    let handle = client.connect(server_addr().ip()).unwrap();

    // Act
    let request = server
        .transport_mut()
        .raise_connection_request(client_addr(), b"TestKey");
    let server_report = server.tick(now).unwrap();
    client
        .transport_mut()
        .raise_disconnected(handle, DisconnectReason::ConnectionRejected);
    let client_report = client.tick(now).unwrap();

    // Assert
    assert_eq!(server.transport().rejected(), &[request]);
    assert_eq!(server_report.events_dispatched, 0);
    assert_eq!(client_report.events_dispatched, 1);
    assert_eq!(client_report.probes_sent, 1);
}

#[test]
fn test_server_answers_every_client_independently() {
    // Arrange
    let config = AppConfig::default();
    let mut server = Endpoint::server(ScriptedTransport::new(server_addr()), &config);
    server.start().unwrap();
    let clients: Vec<SocketAddr> = (1..=3)
        .map(|i| format!("192.168.1.{}:5000{i}", 100 + i).parse().unwrap())
        .collect();
    for addr in &clients {
        server
            .transport_mut()
            .raise_unconnected(*addr, UnconnectedMessageType::Broadcast, &[0x01]);
    }

    // Act
    let report = server.tick(Instant::now()).unwrap();

    // Assert
    assert_eq!(report.replies_sent, 3);
    let targets: Vec<SocketAddr> = server
        .transport()
        .unconnected_sends()
        .iter()
        .map(|(_, to)| *to)
        .collect();
    assert_eq!(targets, clients);
}

#[test]
fn test_unrelated_datagrams_are_delivered_but_ignored_by_discovery() {
    // Arrange
    let config = AppConfig::default();
    let (mut client, _server) = endpoints(&config);
    let seen = Rc::new(RefCell::new(0));
    let s = Rc::clone(&seen);
    client.events().on_receive_unconnected(move |_| {
        *s.borrow_mut() += 1;
        Ok(())
    });
    client
        .transport_mut()
        .raise_unconnected(server_addr(), UnconnectedMessageType::Basic, b"SSDP NOTIFY");

    // Act
    let report = client.tick(Instant::now()).unwrap();

    // Assert
    assert_eq!(*seen.borrow(), 1);
    assert_eq!(report.connects_started, 0);
    assert!(client.transport().connects().is_empty());
    assert!(client.transport().is_running());
}
