use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Main error type for depthsockets
#[derive(Error, Debug)]
pub enum SocketError {
    /// Connect or handshake failure
    #[error("Connection failed: {0}")]
    Connection(String),

    /// `connect` called while a connection is already held
    #[error("Connection already exists")]
    AlreadyConnected,

    /// Read or disconnect called without an active connection
    #[error("Connection not exists")]
    NotConnected,

    /// Transport failure while reading
    #[error("Read failed: {reason}")]
    Read { reason: String, fatal: bool },

    /// Listener could not be bound
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

impl SocketError {
    /// Classify a tungstenite read error.
    ///
    /// Malformed payloads leave the stream usable; everything else means the
    /// connection is gone.
    pub fn from_read(err: WsError) -> Self {
        let fatal = !matches!(err, WsError::Utf8 { .. } | WsError::Capacity(_));
        SocketError::Read {
            reason: err.to_string(),
            fatal,
        }
    }

    /// Whether the underlying connection can no longer be used
    pub fn is_fatal(&self) -> bool {
        match self {
            SocketError::Read { fatal, .. } => *fatal,
            SocketError::AlreadyConnected => false,
            _ => true,
        }
    }
}

/// Result type for depthsockets operations
pub type Result<T> = std::result::Result<T, SocketError>;
