//! Common test utilities for depth-relay integration tests

#![allow(dead_code)]

use depth_relay::{DepthUpdate, Frame};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const READ_TIMEOUT: Duration = Duration::from_secs(3);

enum UpstreamCommand {
    Send(Message),
    Close,
}

/// Mock Binance upstream driven by the test
///
/// Accepts one client and forwards whatever the test pushes.
pub struct MockUpstream {
    pub addr: SocketAddr,
    commands: mpsc::UnboundedSender<UpstreamCommand>,
    requested: Arc<Mutex<Option<String>>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (commands, rx) = mpsc::unbounded_channel();
        let requested = Arc::new(Mutex::new(None));

        let requested_clone = Arc::clone(&requested);
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                Self::handle_connection(stream, rx, requested_clone).await;
            }
        });

        Self {
            addr,
            commands,
            requested,
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        mut commands: mpsc::UnboundedReceiver<UpstreamCommand>,
        requested: Arc<Mutex<Option<String>>>,
    ) {
        let record = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            *requested.lock() = req.uri().path_and_query().map(|p| p.as_str().to_string());
            Ok(resp)
        };
        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, record).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(UpstreamCommand::Send(msg)) => {
                        if write.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Some(UpstreamCommand::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        while let Some(Ok(_)) = read.next().await {}
                        break;
                    }
                },
                inbound = read.next() => match inbound {
                    Some(Ok(msg)) if msg.is_close() => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                },
            }
        }
    }

    /// Host to put in `binance.depth.ws_host`
    pub fn ws_host(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn send_text(&self, text: &str) {
        let _ = self.commands.send(UpstreamCommand::Send(Message::Text(text.to_string())));
    }

    /// Send a combined-stream depth event
    pub fn send_depth(&self, symbol: &str, bids: &[[&str; 2]], asks: &[[&str; 2]]) {
        let event = serde_json::json!({
            "stream": format!("{}@depth", symbol.to_lowercase()),
            "data": { "e": "depthUpdate", "s": symbol, "b": bids, "a": asks }
        });
        self.send_text(&event.to_string());
    }

    pub fn close(&self) {
        let _ = self.commands.send(UpstreamCommand::Close);
    }

    /// Request target of the relay's upgrade request
    pub fn requested_target(&self) -> Option<String> {
        self.requested.lock().clone()
    }
}

pub type Downstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect a downstream subscriber to a relay listener
pub async fn connect_subscriber(addr: SocketAddr) -> Downstream {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    ws
}

/// Next JSON text frame, panicking on timeout
pub async fn next_json(ws: &mut Downstream) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(READ_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read until the relay closes the connection; returns the close code if any
pub async fn wait_for_close(ws: &mut Downstream) -> Option<u16> {
    loop {
        match tokio::time::timeout(READ_TIMEOUT, ws.next()).await {
            Ok(Some(Ok(Message::Close(frame)))) => return frame.map(|f| u16::from(f.code)),
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) | Ok(None) => return None,
            Err(_) => panic!("connection was not closed"),
        }
    }
}

/// Symbols contained in a frame sequence, snapshot entries included
pub fn symbols_seen(frames: &[Frame]) -> Vec<String> {
    frames
        .iter()
        .flat_map(|frame| match frame {
            Frame::Snapshot(entries) => entries.iter().map(|e| e.symbol.clone()).collect::<Vec<_>>(),
            Frame::Update(update) => vec![update.symbol.clone()],
        })
        .collect()
}

pub fn update(symbol: &str, bid: f64, ask: f64) -> DepthUpdate {
    DepthUpdate::new(symbol, bid, ask)
}
