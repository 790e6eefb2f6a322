//! Aggregate Depth Relay
//!
//! Ingests Binance depth streams over one upstream connection, keeps the
//! latest top-of-book per symbol and republishes it to downstream
//! WebSocket subscribers.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod utils;

// Re-export commonly used items
pub use application::{
    DepthGate, FanoutConfig, IngestState, Orchestrator, RelayApp, ShutdownReport, StopReason,
    SubscriberRegistry,
};
pub use domain::{DepthReader, DepthUpdate, DepthWriter, Frame, RelayError, Snapshot, SubscriberId};
pub use infrastructure::{
    client::binance::{build_depth_stream_url, BinanceDepthReader},
    config::{ConfigError, Environment, RelayConfig},
    logging::init_tracing,
    memory::{memory_feed, MemoryFeed, MemoryReader, MemoryWriter, WriterProbe},
    server::{SubscriberSessions, WsDepthWriter},
};
pub use utils::ShutdownManager;
