//! LAN discovery over broadcast.
//!
//! Two halves, one per role:
//!
//! - [`beacon::DiscoveryBeacon`] (client) broadcasts a probe while it has no
//!   session, and connects to whoever answers.
//! - [`responder::DiscoveryResponder`] (server) answers every probe with a
//!   direct reply to the sender.
//!
//! Neither half owns a socket.  Both act through the [`crate::Transport`]
//! they are handed on each call, so they can be tested against a scripted or
//! mocked transport.

pub mod beacon;
pub mod responder;

pub use beacon::{BeaconConfig, BeaconState, DiscoveryBeacon};
pub use responder::DiscoveryResponder;
