use crate::config::UpstreamConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::traits::*;
use futures::StreamExt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exclusive client connection to an upstream WebSocket feed
///
/// Unlike a reconnecting client, this holds at most one stream for its whole
/// life: `connect` once, pull frames with `read_message`, then `disconnect`.
/// Control frames are answered by tungstenite and never surface to callers.
pub struct UpstreamConnection {
    config: UpstreamConfig,
    stream: Option<UpstreamStream>,
    url: Option<String>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
}

impl UpstreamConnection {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            config,
            stream: None,
            url: None,
            state: Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected)),
            metrics: Arc::new(AtomicMetrics::new()),
        }
    }

    /// Open the connection.
    ///
    /// Fails with `AlreadyConnected` when a stream is held, and with
    /// `Connection` when the handshake fails or exceeds the handshake timeout.
    pub async fn connect(&mut self, url: &str) -> Result<()> {
        if self.stream.is_some() {
            return Err(SocketError::AlreadyConnected);
        }

        self.state.set(ConnectionState::Connecting);
        debug!("Connecting to {}", url);

        let result = tokio::time::timeout(self.config.handshake_timeout, connect_async(url)).await;

        match result {
            Ok(Ok((stream, _response))) => {
                info!("Connected to {}", url);
                self.stream = Some(stream);
                self.url = Some(url.to_string());
                self.state.set(ConnectionState::Connected);
                Ok(())
            }
            Ok(Err(e)) => {
                self.state.set(ConnectionState::Disconnected);
                Err(SocketError::Connection(format!("{}: {}", url, e)))
            }
            Err(_) => {
                self.state.set(ConnectionState::Disconnected);
                Err(SocketError::Connection(format!(
                    "{}: handshake timed out after {:?}",
                    url, self.config.handshake_timeout
                )))
            }
        }
    }

    /// Block until the next data frame arrives.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly. A fatal
    /// read error also drops the stream so later reads report `NotConnected`.
    pub async fn read_message(&mut self) -> Result<Option<WsMessage>> {
        let stream = self.stream.as_mut().ok_or(SocketError::NotConnected)?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Close(frame))) => {
                    match frame {
                        Some(frame) => info!("Upstream closed: {} {}", frame.code, frame.reason),
                        None => info!("Upstream closed"),
                    }
                    self.release();
                    return Ok(None);
                }
                Some(Ok(msg)) => match WsMessage::from_tungstenite(msg) {
                    Some(message) => {
                        self.metrics.increment_received();
                        return Ok(Some(message));
                    }
                    None => self.metrics.increment_control(),
                },
                Some(Err(WsError::ConnectionClosed)) | None => {
                    info!("Upstream stream ended");
                    self.release();
                    return Ok(None);
                }
                Some(Err(e)) => {
                    let err = SocketError::from_read(e);
                    if err.is_fatal() {
                        self.release();
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Close the connection gracefully.
    ///
    /// A failed or slow close handshake is logged and the stream is dropped
    /// anyway; only a missing connection is reported as an error.
    pub async fn disconnect(&mut self) -> Result<()> {
        let mut stream = self.stream.take().ok_or(SocketError::NotConnected)?;
        self.state.set(ConnectionState::ShuttingDown);

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "Goodbye".into(),
        };

        match tokio::time::timeout(self.config.close_timeout, stream.close(Some(frame))).await {
            Ok(Ok(())) => debug!("Close frame sent"),
            Ok(Err(WsError::ConnectionClosed)) | Ok(Err(WsError::AlreadyClosed)) => {
                debug!("Connection already closed")
            }
            Ok(Err(e)) => warn!("Close handshake failed: {}", e),
            Err(_) => warn!(
                "Close handshake timed out after {:?}",
                self.config.close_timeout
            ),
        }

        drop(stream);
        if let Some(url) = self.url.take() {
            info!("Disconnected from {}", url);
        }
        self.state.set(ConnectionState::Disconnected);
        Ok(())
    }

    fn release(&mut self) {
        self.stream = None;
        self.url = None;
        self.state.set(ConnectionState::Disconnected);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn metrics(&self) -> &AtomicMetrics {
        &self.metrics
    }
}

impl Default for UpstreamConnection {
    fn default() -> Self {
        Self::new(UpstreamConfig::default())
    }
}
