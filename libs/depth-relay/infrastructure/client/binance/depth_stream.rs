//! Upstream reader for Binance depth streams

use super::decoder::decode_depth_message;
use crate::domain::{DepthReader, DepthUpdate, RelayError, Result};
use crate::infrastructure::config::ConfigError;
use async_trait::async_trait;
use depthsockets::{UpstreamConfig, UpstreamConnection};
use tracing::{debug, info};

/// Public market-data host
pub const DEFAULT_WS_HOST: &str = "wss://data-stream.binance.vision";

const STREAM_SUFFIX: &str = "@depth";

/// Check a symbol and return its stream form (lower case)
pub fn validate_symbol(symbol: &str) -> std::result::Result<String, ConfigError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::ValidationError("symbol must not be empty".to_string()));
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::ValidationError(format!(
            "symbol {:?} must be ASCII alphanumeric",
            symbol
        )));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Build the combined stream URL for `symbols`
///
/// `build_depth_stream_url("wss://host", &["BTCUSDT", "ethusdt"])` gives
/// `wss://host/stream?streams=btcusdt@depth/ethusdt@depth`.
pub fn build_depth_stream_url<S: AsRef<str>>(ws_host: &str, symbols: &[S]) -> std::result::Result<String, ConfigError> {
    if symbols.is_empty() {
        return Err(ConfigError::ValidationError("at least one symbol is required".to_string()));
    }

    let streams = symbols
        .iter()
        .map(|symbol| validate_symbol(symbol.as_ref()).map(|s| format!("{}{}", s, STREAM_SUFFIX)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(format!(
        "{}/stream?streams={}",
        ws_host.trim_end_matches('/'),
        streams.join("/")
    ))
}

/// [`DepthReader`] over one upstream Binance connection
pub struct BinanceDepthReader {
    connection: UpstreamConnection,
}

impl BinanceDepthReader {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            connection: UpstreamConnection::new(config),
        }
    }

    /// Connect to `url`; see [`build_depth_stream_url`]
    pub async fn connect(&mut self, url: &str) -> Result<()> {
        self.connection.connect(url).await?;
        info!("[Binance WS] Depth stream connected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }
}

#[async_trait]
impl DepthReader for BinanceDepthReader {
    async fn read_next(&mut self) -> Result<Option<DepthUpdate>> {
        let Some(message) = self.connection.read_message().await? else {
            return Ok(None);
        };

        let update = decode_depth_message(&message)?;
        debug!(symbol = %update.symbol, bid = update.bid, ask = update.ask, "[Binance WS] Depth");
        Ok(Some(update))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connection.disconnect().await.map_err(RelayError::from)?;
        info!("[Binance WS] Depth stream disconnected");
        Ok(())
    }
}
