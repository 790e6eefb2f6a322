//! Infrastructure Layer
//!
//! Upstream client, downstream server adapters, configuration, logging and
//! in-memory doubles. Depends on the domain layer, never the other way.

pub mod client;
pub mod config;
pub mod logging;
pub mod memory;
pub mod server;

pub use client::binance::{build_depth_stream_url, BinanceDepthReader};
pub use config::{ConfigError, Environment, RelayConfig};
pub use logging::init_tracing;
pub use memory::{memory_feed, MemoryFeed, MemoryReader, MemoryWriter, WriterProbe};
pub use server::{SubscriberSessions, WsDepthWriter};
