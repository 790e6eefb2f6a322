use std::net::SocketAddr;
use std::time::Duration;

/// Default time allowed for the upstream TCP + TLS + upgrade handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed for the close handshake
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default upgrade path served by the listener
pub const DEFAULT_SERVER_PATH: &str = "/ws";

/// Timeouts applied to the upstream client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Upper bound on connect + upgrade
    pub handshake_timeout: Duration,

    /// Upper bound on sending our close frame
    pub close_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind; port 0 picks an ephemeral port
    pub addr: SocketAddr,

    /// Only upgrade requests for this path are accepted
    pub path: String,
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            path: DEFAULT_SERVER_PATH.to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Whether a request target matches the configured path.
    ///
    /// Query strings are ignored.
    pub fn accepts_path(&self, target: &str) -> bool {
        path_matches(&self.path, target)
    }
}

/// Compare a request target against an expected path, ignoring the query
pub fn path_matches(expected: &str, target: &str) -> bool {
    let path = target.split('?').next().unwrap_or(target);
    path == expected
}
