//! Subscriber registry and fan-out
//!
//! Each subscriber owns a bounded outbound queue drained by its own writer
//! task, so broadcasting never waits on the network and never holds the
//! registry lock across I/O.
//!
//! Registration has to hand a new subscriber the current state and then
//! every later update exactly once, without holding the registry lock and
//! the gate lock at the same time. The subscriber is inserted as pending
//! first; broadcasts reaching it are buffered with their sequence. Once the
//! snapshot is taken, buffered updates newer than the snapshot sequence are
//! queued behind it and the subscriber goes live with that sequence as its
//! watermark. Live broadcasts at or below the watermark are skipped.
//!
//! An evicted or unregistered subscriber has its backlog discarded and its
//! connection closed right away. Only `shutdown_all` lets writers flush.

use crate::application::gate::DepthGate;
use crate::domain::{DepthUpdate, DepthWriter, Frame, RelayError, Result, Snapshot, SubscriberId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default outbound queue length per subscriber
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default upper bound on one network write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutConfig {
    pub queue_capacity: usize,
    pub write_timeout: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

enum Phase {
    /// Registered, snapshot not yet queued
    Pending { buffered: Vec<(u64, DepthUpdate)> },
    /// Snapshot queued; it already covers every sequence up to `watermark`
    Live { watermark: u64 },
}

struct Subscriber {
    queue: mpsc::Sender<Frame>,
    phase: Phase,
    writer: JoinHandle<()>,
    cancel: Arc<Notify>,
}

impl Subscriber {
    /// Tell the writer to drop its backlog and close now
    fn evict(self) {
        self.cancel.notify_one();
    }
}

struct RegistryState {
    subscribers: BTreeMap<SubscriberId, Subscriber>,
    next_id: u64,
    closed: bool,
}

struct RegistryInner {
    state: Mutex<RegistryState>,
    gate: Arc<DepthGate>,
    config: FanoutConfig,
    closed_tx: watch::Sender<bool>,
}

/// Set of connected subscribers
///
/// Cheap to clone; all clones share one set.
#[derive(Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriberRegistry {
    pub fn new(gate: Arc<DepthGate>, config: FanoutConfig) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState {
                    subscribers: BTreeMap::new(),
                    next_id: 1,
                    closed: false,
                }),
                gate,
                config,
                closed_tx,
            }),
        }
    }

    /// Add a subscriber and queue its snapshot.
    ///
    /// The writer is driven by a dedicated task from here on. A refused
    /// writer is closed without receiving any frame.
    pub fn register<W: DepthWriter>(&self, writer: W) -> Result<SubscriberId> {
        let id = self.begin_register(writer)?;
        let snapshot = self.inner.gate.snapshot();
        self.finish_register(id, snapshot)
    }

    /// Insert the subscriber as pending and start its writer
    pub(crate) fn begin_register<W: DepthWriter>(&self, writer: W) -> Result<SubscriberId> {
        let capacity = self.inner.config.queue_capacity.max(1);
        let (queue, outbound) = mpsc::channel(capacity);
        let cancel = Arc::new(Notify::new());

        let mut state = self.inner.state.lock();
        if state.closed {
            drop(state);
            tokio::spawn(close_refused(writer, self.inner.config.write_timeout));
            return Err(RelayError::ShuttingDown);
        }
        let id = SubscriberId(state.next_id);
        state.next_id += 1;

        let task = tokio::spawn(drive_writer(
            id,
            writer,
            outbound,
            Arc::clone(&cancel),
            self.clone(),
            self.inner.config.write_timeout,
        ));
        state.subscribers.insert(
            id,
            Subscriber {
                queue,
                phase: Phase::Pending {
                    buffered: Vec::new(),
                },
                writer: task,
                cancel,
            },
        );
        Ok(id)
    }

    /// Queue `snapshot` and the buffered updates it does not cover, then go live
    pub(crate) fn finish_register(&self, id: SubscriberId, snapshot: Snapshot) -> Result<SubscriberId> {
        let watermark = snapshot.sequence;
        let snapshot_len = snapshot.len();

        let result = {
            let mut state = self.inner.state.lock();
            let Some(subscriber) = state.subscribers.get_mut(&id) else {
                // Removed by shutdown_all or evicted while pending
                return Err(RelayError::ShuttingDown);
            };

            let buffered = match std::mem::replace(&mut subscriber.phase, Phase::Live { watermark }) {
                Phase::Pending { buffered } => buffered,
                Phase::Live { .. } => Vec::new(),
            };

            let catch_up = buffered
                .into_iter()
                .filter(|(sequence, _)| *sequence > watermark)
                .map(|(_, update)| Frame::Update(update));

            let mut result = Ok(());
            for frame in std::iter::once(Frame::Snapshot(snapshot.entries)).chain(catch_up) {
                if let Err(e) = subscriber.queue.try_send(frame) {
                    result = Err(send_failure(id, e));
                    break;
                }
            }

            if result.is_err() {
                if let Some(subscriber) = state.subscribers.remove(&id) {
                    subscriber.evict();
                }
            }
            result
        };

        match result {
            Ok(()) => {
                info!(subscriber_id = %id, snapshot_len, watermark, "Subscriber registered");
                Ok(id)
            }
            Err(e) => {
                warn!(subscriber_id = %id, error = %e, "Subscriber registration failed");
                Err(e)
            }
        }
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.inner.state.lock().subscribers.remove(&id);
        match removed {
            Some(subscriber) => {
                subscriber.evict();
                info!(subscriber_id = %id, "Subscriber unregistered");
                true
            }
            None => false,
        }
    }

    /// Queue `update` for every subscriber.
    ///
    /// Subscribers whose queue is full or closed are removed after the pass;
    /// the rest still receive the update. Returns how many subscribers
    /// accepted it.
    pub fn broadcast(&self, sequence: u64, update: &DepthUpdate) -> usize {
        let capacity = self.inner.config.queue_capacity.max(1);
        let mut delivered = 0;
        let mut failed = Vec::new();

        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return 0;
            }

            for (id, subscriber) in state.subscribers.iter_mut() {
                match &mut subscriber.phase {
                    Phase::Pending { buffered } => {
                        if buffered.len() >= capacity {
                            failed.push(RelayError::SubscriberSend {
                                id: *id,
                                reason: "pending buffer full".to_string(),
                            });
                        } else {
                            buffered.push((sequence, update.clone()));
                            delivered += 1;
                        }
                    }
                    Phase::Live { watermark } if sequence <= *watermark => {}
                    Phase::Live { .. } => match subscriber.queue.try_send(Frame::Update(update.clone())) {
                        Ok(()) => delivered += 1,
                        Err(e) => failed.push(send_failure(*id, e)),
                    },
                }
            }

            for err in &failed {
                if let RelayError::SubscriberSend { id, .. } = err {
                    if let Some(subscriber) = state.subscribers.remove(id) {
                        subscriber.evict();
                    }
                }
            }
        }

        for err in failed {
            warn!(error = %err, "Removed subscriber after failed delivery");
        }

        debug!(symbol = %update.symbol, sequence, delivered, "Broadcast depth");
        delivered
    }

    /// Close every subscriber and refuse new ones.
    ///
    /// Writers get until `timeout` to flush their queue and close their
    /// connection; stragglers are aborted. Returns how many subscribers were
    /// registered.
    pub async fn shutdown_all(&self, timeout: Duration) -> usize {
        let subscribers = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            std::mem::take(&mut state.subscribers)
        };
        self.inner.closed_tx.send_replace(true);

        let count = subscribers.len();
        let writers: Vec<(SubscriberId, JoinHandle<()>)> = subscribers
            .into_iter()
            .map(|(id, subscriber)| {
                // Dropping the queue lets the writer flush and close
                let Subscriber { queue, writer, .. } = subscriber;
                drop(queue);
                (id, writer)
            })
            .collect();

        let deadline = Instant::now() + timeout;
        let mut aborted = 0;
        for (id, mut writer) in writers {
            if tokio::time::timeout_at(deadline, &mut writer).await.is_err() {
                warn!(subscriber_id = %id, "Writer did not finish in time, aborting");
                writer.abort();
                aborted += 1;
            }
        }

        info!(subscribers = count, aborted, "All subscribers closed");
        count
    }

    /// Resolves to `true` once `shutdown_all` has started
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.inner.closed_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<SubscriberId> {
        self.inner.state.lock().subscribers.keys().copied().collect()
    }
}

fn send_failure(id: SubscriberId, err: TrySendError<Frame>) -> RelayError {
    let reason = match err {
        TrySendError::Full(_) => "outbound queue full",
        TrySendError::Closed(_) => "outbound queue closed",
    };
    RelayError::SubscriberSend {
        id,
        reason: reason.to_string(),
    }
}

async fn close_refused<W: DepthWriter>(mut writer: W, write_timeout: Duration) {
    let _ = tokio::time::timeout(write_timeout, writer.close()).await;
}

async fn drive_writer<W: DepthWriter>(
    id: SubscriberId,
    mut writer: W,
    mut outbound: mpsc::Receiver<Frame>,
    cancel: Arc<Notify>,
    registry: SubscriberRegistry,
    write_timeout: Duration,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.notified() => {
                debug!(subscriber_id = %id, "Subscriber evicted, dropping backlog");
                break;
            }
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.notified() => {
                debug!(subscriber_id = %id, "Subscriber evicted during write");
                break;
            }
            outcome = tokio::time::timeout(write_timeout, writer.write_frame(&frame)) => outcome,
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(subscriber_id = %id, error = %e, "Write failed, dropping subscriber");
                break;
            }
            Err(_) => {
                warn!(subscriber_id = %id, timeout = ?write_timeout, "Write timed out, dropping subscriber");
                break;
            }
        }
    }

    registry.unregister(id);
    drop(registry);

    match tokio::time::timeout(write_timeout, writer.close()).await {
        Ok(Ok(())) => debug!(subscriber_id = %id, "Subscriber connection closed"),
        Ok(Err(e)) => debug!(subscriber_id = %id, error = %e, "Close failed"),
        Err(_) => debug!(subscriber_id = %id, "Close timed out"),
    }
}
