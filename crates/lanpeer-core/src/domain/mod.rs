//! Domain types for lanpeer.
//!
//! This module contains plain data with no I/O: the session handle the
//! transport hands out, the enums describing how and why things happen to a
//! session, and the event envelopes delivered to subscribers.

pub mod events;
pub mod session;
