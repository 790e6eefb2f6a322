//! Frame → [`DepthUpdate`] decoding

use super::types::{DepthEvent, DepthStreamEnvelope};
use crate::domain::{DepthUpdate, RelayError, Result};
use depthsockets::WsMessage;
use serde_json::Value;
use tracing::warn;

/// Decode one upstream frame. Binary frames are not part of the protocol.
pub fn decode_depth_message(message: &WsMessage) -> Result<DepthUpdate> {
    match message.as_text() {
        Some(text) => decode_depth_text(text),
        None => Err(RelayError::Decode("unexpected binary frame".to_string())),
    }
}

/// Decode a depth event, either wrapped in a combined-stream envelope or bare.
///
/// Unparseable prices become `0.0` and are logged; they never fail the
/// decode.
pub fn decode_depth_text(text: &str) -> Result<DepthUpdate> {
    let value: Value = serde_json::from_str(text).map_err(|e| RelayError::Decode(e.to_string()))?;

    let event: DepthEvent = if value.get("data").is_some() {
        let envelope: DepthStreamEnvelope =
            serde_json::from_value(value).map_err(|e| RelayError::Decode(e.to_string()))?;
        envelope.data
    } else {
        serde_json::from_value(value).map_err(|e| RelayError::Decode(e.to_string()))?
    };

    let bid = price_or_zero(&event.symbol, "bid", event.best_bid());
    let ask = price_or_zero(&event.symbol, "ask", event.best_ask());

    Ok(DepthUpdate::new(event.symbol, bid, ask))
}

/// Parse a decimal price string
pub fn parse_price(field: &'static str, raw: &str) -> Result<f64> {
    let numeric_error = |reason: String| RelayError::NumericParse {
        field,
        value: raw.to_string(),
        reason,
    };

    let price: f64 = raw.trim().parse().map_err(|e: std::num::ParseFloatError| numeric_error(e.to_string()))?;
    if !price.is_finite() {
        return Err(numeric_error("not a finite number".to_string()));
    }
    Ok(price)
}

fn price_or_zero(symbol: &str, field: &'static str, raw: &str) -> f64 {
    match parse_price(field, raw) {
        Ok(price) => price,
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "[Binance WS] Using 0.0 for unparseable price");
            0.0
        }
    }
}
