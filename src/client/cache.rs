use crate::storage::types::PostingList;

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Per-keyword search answers, each valid for `ttl` after it was stored.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, PostingList)>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, keyword: String, postings: PostingList, now: Instant) {
        self.entries.insert(keyword, (now, postings));
    }

    /// The stored answer, if it is younger than the ttl at `now`.
    pub fn get(&self, keyword: &str, now: Instant) -> Option<&PostingList> {
        self.entries
            .get(keyword)
            .filter(|(stored, _)| now.saturating_duration_since(*stored) < self.ttl)
            .map(|(_, postings)| postings)
    }

    /// Drops expired entries.
    pub fn purge(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored, _)| now.saturating_duration_since(*stored) < ttl);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
