//! Connection primitives.
//!
//! [`UpstreamConnection`](client::UpstreamConnection) owns one outbound
//! stream; [`WsServer`](server::WsServer) accepts downstream sessions.

pub mod client;
pub mod config;
pub mod connection_state;
pub mod server;

// Re-export main types
pub use client::UpstreamConnection;
pub use config::{ServerConfig, UpstreamConfig};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use server::{ServerHandle, ServerSession, WsServer, WsSink, WsSource};

// Re-export traits for convenience
pub use crate::traits::*;
