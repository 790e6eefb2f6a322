//! Binance depth stream client
//!
//! Reads `<symbol>@depth` events from a combined stream and turns them into
//! top-of-book [`DepthUpdate`](crate::domain::DepthUpdate)s.

pub mod decoder;
pub mod depth_stream;
pub mod types;

pub use decoder::{decode_depth_message, decode_depth_text, parse_price};
pub use depth_stream::{build_depth_stream_url, validate_symbol, BinanceDepthReader, DEFAULT_WS_HOST};
pub use types::{DepthEvent, DepthStreamEnvelope};
