use crate::application::fanout::FanoutConfig;
use crate::domain::RelayError;
use crate::infrastructure::client::binance::{validate_symbol, DEFAULT_WS_HOST};
use depthsockets::{ServerConfig, UpstreamConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable overriding `wss.port`
pub const WSS_PORT_ENV_VAR: &str = "WSS_PORT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for RelayError {
    fn from(err: ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}

/// Deployment environment; selects the log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Dev,
    Prod,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        };
        write!(f, "{}", name)
    }
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub env: Environment,
    pub binance: BinanceConfig,
    pub wss: WssConfig,
    #[serde(default)]
    pub relay: RelayTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    pub depth: DepthStreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthStreamConfig {
    pub symbols: Vec<String>,
    #[serde(default = "default_ws_host")]
    pub ws_host: String,
}

/// Downstream listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WssConfig {
    #[serde(default = "default_wss_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_wss_path")]
    pub path: String,
}

/// Timeouts and queue sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayTuning {
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,
}

impl Default for RelayTuning {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            close_timeout_secs: default_close_timeout_secs(),
            write_timeout_ms: default_write_timeout_ms(),
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
        }
    }
}

fn default_ws_host() -> String {
    DEFAULT_WS_HOST.to_string()
}

fn default_wss_host() -> String {
    "127.0.0.1".to_string()
}

fn default_wss_path() -> String {
    "/ws".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_handshake_timeout_secs() -> u64 {
    30
}

fn default_close_timeout_secs() -> u64 {
    5
}

fn default_write_timeout_ms() -> u64 {
    2000
}

fn default_subscriber_queue_capacity() -> usize {
    1024
}

impl RelayConfig {
    /// Load configuration from a YAML file
    ///
    /// `.env` is read first if present; environment overrides are applied
    /// before validation.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: RelayConfig = serde_yaml::from_str(&yaml_content)?;

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse and validate without touching the environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RelayConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup(WSS_PORT_ENV_VAR) {
            let port = port.trim().parse::<u16>().map_err(|_| {
                ConfigError::ValidationError(format!("{} must be a port number, got {:?}", WSS_PORT_ENV_VAR, port))
            })?;
            info!("Overriding listen port from environment variable");
            self.wss.port = port;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.binance.depth.symbols.is_empty() {
            return Err(ConfigError::ValidationError(
                "binance.depth.symbols must list at least one symbol".to_string(),
            ));
        }
        for symbol in &self.binance.depth.symbols {
            validate_symbol(symbol)?;
        }

        let host = &self.binance.depth.ws_host;
        if !(host.starts_with("wss://") || host.starts_with("ws://")) {
            return Err(ConfigError::ValidationError(
                "binance.depth.ws_host must start with ws:// or wss://".to_string(),
            ));
        }

        if self.wss.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("wss.host must not be empty".to_string()));
        }

        if !self.wss.path.starts_with('/') {
            return Err(ConfigError::ValidationError("wss.path must start with '/'".to_string()));
        }

        let tuning = &self.relay;
        if tuning.shutdown_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "relay.shutdown_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if tuning.handshake_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "relay.handshake_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if tuning.close_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "relay.close_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if tuning.close_timeout_secs > tuning.shutdown_timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "relay.close_timeout_secs ({}) must not exceed relay.shutdown_timeout_secs ({})",
                tuning.close_timeout_secs, tuning.shutdown_timeout_secs
            )));
        }
        if tuning.write_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "relay.write_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if tuning.subscriber_queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "relay.subscriber_queue_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve `wss.host:wss.port`
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        (self.wss.host.as_str(), self.wss.port)
            .to_socket_addrs()
            .map_err(|e| ConfigError::ValidationError(format!("wss.host {:?}: {}", self.wss.host, e)))?
            .next()
            .ok_or_else(|| ConfigError::ValidationError(format!("wss.host {:?} did not resolve", self.wss.host)))
    }

    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            handshake_timeout: Duration::from_secs(self.relay.handshake_timeout_secs),
            close_timeout: Duration::from_secs(self.relay.close_timeout_secs),
        }
    }

    pub fn server_config(&self) -> Result<ServerConfig> {
        Ok(ServerConfig::new(self.listen_addr()?).with_path(self.wss.path.clone()))
    }

    pub fn fanout_config(&self) -> FanoutConfig {
        FanoutConfig {
            queue_capacity: self.relay.subscriber_queue_capacity,
            write_timeout: Duration::from_millis(self.relay.write_timeout_ms),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.relay.shutdown_timeout_secs)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Environment: {}", self.env);
        info!("  Symbols: {}", self.binance.depth.symbols.join(", "));
        info!("  Upstream host: {}", self.binance.depth.ws_host);
        info!("  Listen: {}:{}{}", self.wss.host, self.wss.port, self.wss.path);
        info!("  Shutdown timeout: {} seconds", self.relay.shutdown_timeout_secs);
        info!("  Subscriber queue: {}", self.relay.subscriber_queue_capacity);
    }
}
