//! # lanpeer-core
//!
//! Shared library for lanpeer containing the discovery protocol, the
//! pre-shared-key admission policy, the session event router and the
//! transport abstraction they all sit on.
//!
//! This crate is used by both the server and client applications.  Apart
//! from the reference [`transport::udp::UdpTransport`], it performs no I/O of
//! its own: everything happens inside [`Endpoint::tick`], driven by the host.
//!
//! # Architecture overview (for beginners)
//!
//! lanpeer lets two programs on the same LAN find each other without either
//! side knowing the other's IP address up front:
//!
//! 1. The **client** has no session, so on every tick it broadcasts a one-byte
//!    *discovery probe* to the configured port.
//! 2. The **server** is listening on that port.  For every probe it receives
//!    it sends a four-byte *discovery reply* straight back to the sender.
//! 3. The client sees the reply arrive as a direct (non-broadcast) datagram,
//!    and asks its transport to connect to the address it came from, handing
//!    over the shared admission key.
//! 4. The server checks the key and accepts or rejects the attempt.  Once the
//!    session is up the client stops probing.
//!
//! Modules:
//!
//! - **`protocol`** – the byte formats: probe/reply payloads, the payload read
//!   cursor, and the datagram framing used by the reference UDP transport.
//! - **`domain`** – session handles, disconnect reasons and the event
//!   envelopes handed to subscribers.
//! - **`admission`** – the accept/reject decision for connection requests.
//! - **`discovery`** – the client-side beacon and the server-side responder.
//! - **`router`** – per-event-kind subscriber lists.
//! - **`transport`** – the [`Transport`] trait plus scripted and UDP engines.
//! - **`endpoint`** – the tick driver that wires everything together.
//! - **`config`** – TOML configuration with defaults.
//! - **`host`** – logging setup and command-line flags shared by the binaries.

/// Logs a session lifecycle message at `info` when `$verbose` is set, and at
/// `debug` otherwise.
macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub mod admission;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod endpoint;
pub mod host;
pub mod protocol;
pub mod router;
pub mod transport;

// Re-export the most-used types at the crate root so callers can write
// `lanpeer_core::Endpoint` instead of `lanpeer_core::endpoint::Endpoint`.
pub use admission::{AdmissionDecision, AdmissionKey, AdmissionPolicy};
pub use config::AppConfig;
pub use discovery::{BeaconState, DiscoveryBeacon, DiscoveryResponder};
pub use domain::events::{
    ConnectEvent, DisconnectEvent, ErrorEvent, EventKind, ReceiveEvent, ReceiveUnconnectedEvent,
    SessionEvent,
};
pub use domain::session::{
    DeliveryMethod, DisconnectReason, SessionHandle, SessionId, SessionState,
    SocketErrorCode, UnconnectedMessageType,
};
pub use endpoint::{Endpoint, EndpointError, Role, TickReport};
pub use protocol::payload::{PayloadError, PayloadReader};
pub use router::{DispatchError, EventRouter, ListenerError, ListenerId, ListenerResult};
pub use transport::{
    ConnectionRequest, RequestId, Transport, TransportError, TransportEvent, TransportOptions,
};
