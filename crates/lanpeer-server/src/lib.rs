//! # lanpeer-server
//!
//! The server side of lanpeer: it listens on the configured UDP port, answers
//! every discovery probe with a direct reply, and admits clients that present
//! the shared key.
//!
//! The binary in `main.rs` is a thin shell around this library:
//!
//! - **`cli`** – command-line arguments and config-file loading.
//! - **`host`** – the payload-logging listeners and the
//!   interval-driven tick loop.

pub mod cli;
pub mod host;
