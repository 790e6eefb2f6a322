//! Ingest loop and shutdown sequence

use crate::application::fanout::SubscriberRegistry;
use crate::application::gate::DepthGate;
use crate::domain::{DepthReader, RelayError};
use depthsockets::ServerHandle;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Minimum time subscribers get to close, even when the loop used up the
/// shutdown budget
const MIN_SUBSCRIBER_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IngestState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl IngestState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => IngestState::Running,
            1 => IngestState::Stopping,
            _ => IngestState::Stopped,
        }
    }
}

#[derive(Debug)]
struct AtomicIngestState(AtomicU8);

impl AtomicIngestState {
    fn new(state: IngestState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> IngestState {
        IngestState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: IngestState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Why the ingest loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Stop was requested
    Shutdown,
    /// Upstream ended the stream cleanly
    UpstreamClosed,
    /// Upstream failed with an unrecoverable error
    UpstreamFailed(String),
    /// The loop missed the shutdown deadline and was aborted
    Aborted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Shutdown => write!(f, "shutdown requested"),
            StopReason::UpstreamClosed => write!(f, "upstream closed"),
            StopReason::UpstreamFailed(reason) => write!(f, "upstream failed: {}", reason),
            StopReason::Aborted => write!(f, "aborted after timeout"),
        }
    }
}

/// Outcome of [`Orchestrator::shutdown`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub loop_stopped_cleanly: bool,
    pub stop_reason: StopReason,
    pub subscribers_closed: usize,
    pub symbols_tracked: usize,
}

/// Owns the ingest task that drives reader → gate → fan-out
pub struct Orchestrator<R: DepthReader> {
    gate: Arc<DepthGate>,
    registry: SubscriberRegistry,
    state: Arc<AtomicIngestState>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<(R, StopReason)>,
    listener: Option<ServerHandle>,
}

impl<R: DepthReader> Orchestrator<R> {
    /// Start the ingest loop
    pub fn spawn(reader: R, gate: Arc<DepthGate>, registry: SubscriberRegistry) -> Self {
        let state = Arc::new(AtomicIngestState::new(IngestState::Running));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(ingest_loop(
            reader,
            Arc::clone(&gate),
            registry.clone(),
            Arc::clone(&state),
            stop_rx,
        ));

        Self {
            gate,
            registry,
            state,
            stop_tx,
            task,
            listener: None,
        }
    }

    /// Stop this listener as part of shutdown
    pub fn with_listener(mut self, listener: ServerHandle) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> IngestState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state.get() == IngestState::Running
    }

    pub fn gate(&self) -> &Arc<DepthGate> {
        &self.gate
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Stop everything, spending at most `timeout` on the ingest loop
    ///
    /// Order: stop ingest, release upstream, stop accepting, close
    /// subscribers, dump final state.
    pub async fn shutdown(self, timeout: Duration) -> ShutdownReport {
        let Self {
            gate,
            registry,
            state,
            stop_tx,
            mut task,
            listener,
        } = self;

        info!("Shutting down relay");
        let deadline = Instant::now() + timeout;

        if state.get() == IngestState::Running {
            state.set(IngestState::Stopping);
        }
        gate.shutdown();
        stop_tx.send_replace(true);

        let (reader, stop_reason, loop_stopped_cleanly) =
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok((reader, reason))) => (Some(reader), reason, true),
                Ok(Err(e)) => {
                    error!(error = %e, "Ingest task failed");
                    (None, StopReason::UpstreamFailed(e.to_string()), false)
                }
                Err(_) => {
                    warn!(timeout = ?timeout, "Ingest loop did not stop in time, aborting");
                    task.abort();
                    (None, StopReason::Aborted, false)
                }
            };
        state.set(IngestState::Stopped);

        if let Some(mut reader) = reader {
            match tokio::time::timeout_at(deadline, reader.disconnect()).await {
                Ok(Ok(())) => debug!("Upstream released"),
                Ok(Err(RelayError::NotConnected)) => debug!("Upstream already released"),
                Ok(Err(e)) => warn!(error = %e, "Upstream disconnect failed"),
                Err(_) => warn!("Upstream disconnect did not finish in time, dropping connection"),
            }
        }

        if let Some(listener) = listener {
            if tokio::time::timeout_at(deadline, listener.shutdown()).await.is_err() {
                warn!("Listener did not stop in time");
            }
        }

        let grace = deadline
            .saturating_duration_since(Instant::now())
            .max(MIN_SUBSCRIBER_GRACE);
        let subscribers_closed = registry.shutdown_all(grace).await;

        let snapshot = gate.snapshot();
        info!(symbols = snapshot.len(), sequence = snapshot.sequence, "Final depth snapshot");
        for entry in &snapshot.entries {
            debug!(symbol = %entry.symbol, bid = entry.bid, ask = entry.ask, "Final depth");
        }

        let report = ShutdownReport {
            loop_stopped_cleanly,
            stop_reason,
            subscribers_closed,
            symbols_tracked: snapshot.len(),
        };
        info!(
            stopped_cleanly = report.loop_stopped_cleanly,
            reason = %report.stop_reason,
            subscribers = report.subscribers_closed,
            "Relay stopped"
        );
        report
    }
}

async fn ingest_loop<R: DepthReader>(
    mut reader: R,
    gate: Arc<DepthGate>,
    registry: SubscriberRegistry,
    state: Arc<AtomicIngestState>,
    mut stop_rx: watch::Receiver<bool>,
) -> (R, StopReason) {
    info!("Ingest loop started");

    let reason = loop {
        if gate.is_closed() || *stop_rx.borrow() {
            break StopReason::Shutdown;
        }

        let read = tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break StopReason::Shutdown;
                }
                // Pending read dropped; nothing partial is applied
                continue;
            }
            read = reader.read_next() => read,
        };

        match read {
            Ok(Some(update)) => {
                if let Some(sequence) = gate.apply(&update) {
                    registry.broadcast(sequence, &update);
                }
            }
            Ok(None) => {
                info!("Upstream stream ended");
                break StopReason::UpstreamClosed;
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Upstream failed, stopping ingest");
                break StopReason::UpstreamFailed(e.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Skipping upstream message");
            }
        }
    };

    state.set(IngestState::Stopped);
    info!(reason = %reason, "Ingest loop stopped");
    (reader, reason)
}
