//! # lanpeer-client
//!
//! The client side of lanpeer: it broadcasts discovery probes until a server
//! answers, connects to that server with the shared key, and greets every new
//! session.
//!
//! - **`cli`** – command-line arguments and config-file loading.
//! - **`host`** – the greeter, logging listeners and the interval-driven tick loop.

pub mod cli;
pub mod host;
