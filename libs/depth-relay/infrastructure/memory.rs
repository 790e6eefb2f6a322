//! In-memory reader and writer
//!
//! Drive the gate, fan-out and orchestrator without sockets.

use crate::domain::{DepthReader, DepthUpdate, DepthWriter, Frame, RelayError, Result};
use crate::infrastructure::client::binance::decode_depth_text;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

enum ScriptedRead {
    Update(DepthUpdate),
    Raw(String),
    Fail(RelayError),
    End,
}

/// Create a connected feed/reader pair
pub fn memory_feed() -> (MemoryFeed, MemoryReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connected = Arc::new(AtomicBool::new(true));
    (
        MemoryFeed {
            tx,
            connected: Arc::clone(&connected),
        },
        MemoryReader { rx, connected },
    )
}

/// Producer side of an in-memory upstream
#[derive(Clone)]
pub struct MemoryFeed {
    tx: mpsc::UnboundedSender<ScriptedRead>,
    connected: Arc<AtomicBool>,
}

impl MemoryFeed {
    pub fn push(&self, update: DepthUpdate) {
        let _ = self.tx.send(ScriptedRead::Update(update));
    }

    /// Queue a raw upstream payload; the reader decodes it like a socket frame
    pub fn push_raw(&self, text: impl Into<String>) {
        let _ = self.tx.send(ScriptedRead::Raw(text.into()));
    }

    pub fn fail(&self, error: RelayError) {
        let _ = self.tx.send(ScriptedRead::Fail(error));
    }

    /// End the stream cleanly
    pub fn end(&self) {
        let _ = self.tx.send(ScriptedRead::End);
    }

    /// False once the reader has been disconnected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// [`DepthReader`] fed by a [`MemoryFeed`]
pub struct MemoryReader {
    rx: mpsc::UnboundedReceiver<ScriptedRead>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl DepthReader for MemoryReader {
    async fn read_next(&mut self) -> Result<Option<DepthUpdate>> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(RelayError::NotConnected);
        }

        match self.rx.recv().await {
            Some(ScriptedRead::Update(update)) => Ok(Some(update)),
            Some(ScriptedRead::Raw(text)) => decode_depth_text(&text).map(Some),
            Some(ScriptedRead::Fail(error)) => Err(error),
            Some(ScriptedRead::End) | None => Ok(None),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.connected.swap(false, Ordering::AcqRel) {
            Ok(())
        } else {
            Err(RelayError::NotConnected)
        }
    }
}

#[derive(Default)]
struct WriterShared {
    frames: Mutex<Vec<Frame>>,
    closed: AtomicBool,
    fail: AtomicBool,
    notify: Notify,
}

/// [`DepthWriter`] that records frames
pub struct MemoryWriter {
    shared: Arc<WriterShared>,
    delay: Option<Duration>,
}

impl MemoryWriter {
    pub fn new() -> (Self, WriterProbe) {
        let shared = Arc::new(WriterShared::default());
        (
            Self {
                shared: Arc::clone(&shared),
                delay: None,
            },
            WriterProbe { shared },
        )
    }

    /// Sleep before every write, simulating a slow peer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl DepthWriter for MemoryWriter {
    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.shared.fail.load(Ordering::Acquire) {
            return Err(RelayError::Write("peer gone".to_string()));
        }
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(RelayError::Write("writer closed".to_string()));
        }

        self.shared.frames.lock().push(frame.clone());
        self.shared.notify.notify_waiters();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

/// Observer for a [`MemoryWriter`]
#[derive(Clone)]
pub struct WriterProbe {
    shared: Arc<WriterShared>,
}

impl WriterProbe {
    pub fn frames(&self) -> Vec<Frame> {
        self.shared.frames.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Make every following write fail
    pub fn fail_writes(&self) {
        self.shared.fail.store(true, Ordering::Release);
    }

    /// Wait until at least `count` frames were written or `timeout` passed,
    /// then return what was written
    pub async fn wait_for_frames(&self, count: usize, timeout: Duration) -> Vec<Frame> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.notify.notified();
            let frames = self.frames();
            if frames.len() >= count {
                return frames;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.frames();
            }
        }
    }

    /// Wait until the writer has been closed or `timeout` passed
    pub async fn wait_closed(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.notify.notified();
            if self.is_closed() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.is_closed();
            }
        }
    }
}
