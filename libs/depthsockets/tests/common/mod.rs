//! Common test utilities for DepthSockets integration tests
//!
//! A scripted upstream that plays a fixed list of frames to every client.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// What the mock upstream does after the scripted frames are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterScript {
    /// Send a close frame
    Close,
    /// Keep the connection open until the client leaves
    Hold,
    /// Drop the TCP socket without a close handshake
    Drop,
}

/// A mock WebSocket upstream for testing
pub struct MockUpstream {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockUpstream {
    pub async fn start(frames: Vec<Message>, after: AfterScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let frames = frames.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, frames, after).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, frames: Vec<Message>, after: AfterScript) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        for frame in frames {
            if write.send(frame).await.is_err() {
                return;
            }
        }

        match after {
            AfterScript::Close => {
                let _ = write.send(Message::Close(None)).await;
                while let Some(Ok(_)) = read.next().await {}
            }
            AfterScript::Hold => {
                while let Some(Ok(msg)) = read.next().await {
                    if msg.is_close() {
                        break;
                    }
                }
            }
            AfterScript::Drop => {}
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown();
    }
}
