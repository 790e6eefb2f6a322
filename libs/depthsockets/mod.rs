//! # DepthSockets
//!
//! WebSocket plumbing for the depth relay: a single long-lived upstream
//! client connection and a downstream listener that hands every accepted
//! subscriber session to an application handler.
//!
//! ## Features
//!
//! - **Exclusive upstream connection**: connect once, read frames, close gracefully
//! - **Bounded handshakes**: connect and close are guarded by configurable timeouts
//! - **Path-checked listener**: upgrades are accepted only on the configured path
//! - **Atomic state**: connection state and counters are lock-free

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    client, config, connection_state, server,
    client::UpstreamConnection,
    config::{ServerConfig, UpstreamConfig},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    server::{ServerHandle, ServerSession, WsServer, WsSink, WsSource},
};

/// Type alias for Result with SocketError
pub type Result<T> = std::result::Result<T, traits::SocketError>;
