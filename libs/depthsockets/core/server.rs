use crate::config::{path_matches, ServerConfig};
use crate::traits::*;
use futures::stream::{SplitSink, SplitStream};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Upper bound on a downstream upgrade handshake
const ACCEPT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
pub type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// An upgraded downstream connection, split into its two halves
pub struct ServerSession {
    pub peer: SocketAddr,
    pub sink: WsSink,
    pub source: WsSource,
}

/// Bound, not yet accepting, WebSocket listener
pub struct WsServer {
    listener: TcpListener,
    config: ServerConfig,
}

impl WsServer {
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.addr)
            .await
            .map_err(|e| SocketError::Bind {
                addr: config.addr.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|e| SocketError::Bind {
            addr: self.config.addr.to_string(),
            reason: e.to_string(),
        })
    }

    /// Start accepting connections in a background task
    ///
    /// Every accepted socket is upgraded in its own task and, on success,
    /// handed to `handler`. Upgrades for any other path than the configured
    /// one are refused with 404.
    pub fn spawn<H: SessionHandler>(self, handler: Arc<H>) -> Result<ServerHandle> {
        let local_addr = self.local_addr()?;
        let (stop_tx, stop_rx) = watch::channel(false);

        info!("Listening on ws://{}{}", local_addr, self.config.path);

        let task = tokio::spawn(accept_loop(self.listener, self.config, handler, stop_rx));

        Ok(ServerHandle {
            local_addr,
            stop_tx,
            task,
        })
    }
}

/// Handle to a running listener
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections.
    ///
    /// Sessions that were already handed over keep running.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("Listener task ended abnormally: {}", e);
        }
        info!("Listener on {} stopped", self.local_addr);
    }
}

async fn accept_loop<H: SessionHandler>(
    listener: TcpListener,
    config: ServerConfig,
    handler: Arc<H>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let config = Arc::new(config);

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    debug!("Accept loop stopping");
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let config = Arc::clone(&config);
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Some(session) = upgrade(stream, peer, &config).await {
                            handler.handle_session(session).await;
                        }
                    });
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}

async fn upgrade(stream: TcpStream, peer: SocketAddr, config: &ServerConfig) -> Option<ServerSession> {
    let expected = config.path.clone();
    let check_path = move |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
        let target = req.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/");
        if path_matches(&expected, target) {
            Ok(resp)
        } else {
            let mut refusal = ErrorResponse::new(Some("Not Found".to_string()));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    };

    match tokio::time::timeout(ACCEPT_HANDSHAKE_TIMEOUT, accept_hdr_async(stream, check_path)).await {
        Ok(Ok(ws)) => {
            debug!("Accepted session from {}", peer);
            let (sink, source) = ws.split();
            Some(ServerSession { peer, sink, source })
        }
        Ok(Err(e)) => {
            debug!("Handshake with {} refused: {}", peer, e);
            None
        }
        Err(_) => {
            warn!("Handshake with {} timed out", peer);
            None
        }
    }
}
