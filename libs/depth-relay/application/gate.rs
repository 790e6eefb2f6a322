//! Authoritative in-memory depth state

use crate::domain::{DepthUpdate, Snapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct CacheState {
    depths: HashMap<String, DepthUpdate>,
    sequence: u64,
}

/// Single holder of the latest top-of-book per symbol
///
/// Writes are last-write-wins: whichever update is applied later replaces
/// the previous one regardless of content. Every apply is stamped with the
/// next sequence number so readers of a [`Snapshot`] can tell which updates
/// it already contains.
///
/// The lock is held only for the map operation itself.
#[derive(Debug, Default)]
pub struct DepthGate {
    state: Mutex<CacheState>,
    closed: AtomicBool,
}

impl DepthGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `update.symbol`.
    ///
    /// Returns the sequence stamped on this update, or `None` if the update
    /// was dropped for having no symbol.
    pub fn apply(&self, update: &DepthUpdate) -> Option<u64> {
        if update.symbol.is_empty() {
            warn!(bid = update.bid, ask = update.ask, "Dropping depth update without symbol");
            return None;
        }

        let sequence = {
            let mut state = self.state.lock();
            state.sequence += 1;
            let sequence = state.sequence;
            state.depths.insert(update.symbol.clone(), update.clone());
            sequence
        };

        debug!(symbol = %update.symbol, sequence, bid = update.bid, ask = update.ask, "Applied depth");
        Some(sequence)
    }

    /// Copy of every entry plus the sequence of the newest one
    pub fn snapshot(&self) -> Snapshot {
        let (sequence, mut entries) = {
            let state = self.state.lock();
            (state.sequence, state.depths.values().cloned().collect::<Vec<_>>())
        };

        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Snapshot { sequence, entries }
    }

    /// Flag the ingest loop to stop at its next iteration boundary
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.state.lock().depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence of the most recent apply
    pub fn sequence(&self) -> u64 {
        self.state.lock().sequence
    }
}
