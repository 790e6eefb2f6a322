//! Binance depth message types
//!
//! Combined stream format from `<host>/stream?streams=...`

use serde::Deserialize;

/// One `[price, quantity]` pair, both as decimal strings
pub type PriceLevel = Vec<String>;

/// Combined stream wrapper
///
/// Example JSON:
/// ```json
/// {
///     "stream": "btcusdt@depth",
///     "data": {
///         "e": "depthUpdate",
///         "E": 1672515782136,
///         "s": "BTCUSDT",
///         "U": 157,
///         "u": 160,
///         "b": [["50000.5", "1.2"]],
///         "a": [["50010.0", "0.8"]]
///     }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DepthStreamEnvelope {
    pub stream: String,
    pub data: DepthEvent,
}

/// Depth diff event payload
#[derive(Debug, Clone, Deserialize)]
pub struct DepthEvent {
    #[serde(rename = "e", default)]
    pub event_type: Option<String>,

    #[serde(rename = "E", default)]
    pub event_time: Option<u64>,

    #[serde(rename = "s")]
    pub symbol: String,

    #[serde(rename = "b", default)]
    pub bids: Vec<PriceLevel>,

    #[serde(rename = "a", default)]
    pub asks: Vec<PriceLevel>,
}

impl DepthEvent {
    /// Price of the first bid level, `"0"` when there is none
    pub fn best_bid(&self) -> &str {
        first_price(&self.bids)
    }

    /// Price of the first ask level, `"0"` when there is none
    pub fn best_ask(&self) -> &str {
        first_price(&self.asks)
    }
}

fn first_price(levels: &[PriceLevel]) -> &str {
    levels
        .first()
        .and_then(|level| level.first())
        .map(String::as_str)
        .unwrap_or("0")
}
