use super::depth::SubscriberId;
use depthsockets::SocketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Upstream connection failed: {0}")]
    Connection(String),

    #[error("Upstream read failed: {reason}")]
    Read { reason: String, fatal: bool },

    #[error("Malformed depth message: {0}")]
    Decode(String),

    #[error("Invalid {field} value {value:?}: {reason}")]
    NumericParse {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Delivery to subscriber {id} failed: {reason}")]
    SubscriberSend { id: SubscriberId, reason: String },

    #[error("Subscriber write failed: {0}")]
    Write(String),

    #[error("Connection not exists")]
    NotConnected,

    #[error("Connection already exists")]
    AlreadyConnected,

    #[error("Relay is shutting down")]
    ShuttingDown,

    #[error("Failed to bind listener: {0}")]
    Bind(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether the ingest loop has to stop on this error
    pub fn is_fatal(&self) -> bool {
        match self {
            RelayError::Read { fatal, .. } => *fatal,
            RelayError::Decode(_) | RelayError::NumericParse { .. } => false,
            _ => true,
        }
    }
}

impl From<SocketError> for RelayError {
    fn from(err: SocketError) -> Self {
        match err {
            SocketError::Connection(reason) => RelayError::Connection(reason),
            SocketError::AlreadyConnected => RelayError::AlreadyConnected,
            SocketError::NotConnected => RelayError::NotConnected,
            SocketError::Read { reason, fatal } => RelayError::Read { reason, fatal },
            SocketError::Bind { addr, reason } => RelayError::Bind(format!("{}: {}", addr, reason)),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
