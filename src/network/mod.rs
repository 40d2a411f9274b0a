//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept loop)
//! - Worker thread pool fed by a bounded channel
//! - Commands routed through `FlowDb::execute`

mod server;
mod connection;
mod client;

pub use server::{Server, ShutdownHandle};
pub use connection::Connection;
pub use client::{Client, DEFAULT_MAX_RESPONSE_SIZE};
