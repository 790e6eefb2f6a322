//! Depth values and the frames sent to subscribers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Best bid and ask for one symbol at the moment it was last observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthUpdate {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
}

impl DepthUpdate {
    pub fn new(symbol: impl Into<String>, bid: f64, ask: f64) -> Self {
        Self {
            symbol: symbol.into(),
            bid,
            ask,
        }
    }
}

/// Process-unique subscriber identifier, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Independent copy of the cache
///
/// `sequence` is the stamp of the newest update contained in `entries`
/// (0 when nothing has been applied yet). Entries are ordered by symbol.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub sequence: u64,
    pub entries: Vec<DepthUpdate>,
}

impl Snapshot {
    pub fn get(&self, symbol: &str) -> Option<&DepthUpdate> {
        self.entries.iter().find(|entry| entry.symbol == symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A unit of delivery to one subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Full state, sent once right after registration
    Snapshot(Vec<DepthUpdate>),
    /// One changed symbol
    Update(DepthUpdate),
}

impl Frame {
    /// Wire form: snapshots are a JSON array, updates a JSON object
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Frame::Snapshot(entries) => serde_json::to_string(entries),
            Frame::Update(update) => serde_json::to_string(update),
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, Frame::Snapshot(_))
    }
}
