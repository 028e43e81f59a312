use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// How an indexing request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexingOutcome {
    Done,
    Failed,
}

/// Hands out transaction ids for indexing requests.
///
/// Ids start at the current Unix time in seconds, so a restarted client keeps
/// counting upward past the ids its previous run used in the shared working
/// directory. Two clients started in the same second can pick the same id;
/// the orchestrator then refuses the second job (`IndexingFailed`) rather than
/// letting both share one map-output directory.
#[derive(Debug)]
pub struct TransactionIds {
    next: AtomicI32,
}

impl TransactionIds {
    pub fn new() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::starting_at(i32::try_from(seconds).unwrap_or_default())
    }

    pub fn starting_at(first: i32) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }

    pub fn next(&self) -> i32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for TransactionIds {
    fn default() -> Self {
        Self::new()
    }
}
