//! The registry's membership table.
//!
//! Plain data with no locking of its own; `RegistryService` owns the only
//! instance behind one mutex, so every method here runs as a single atomic step
//! with respect to all other registry operations. Time is passed in by the
//! caller to keep liveness decisions deterministic under test.

use super::types::{CategorySnapshot, MemberSnapshot, PeerAddress, RegistryEntry};
use crate::error::ClusterError;
use crate::storage::partitioner::Category;

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct RegistryTable {
    categories: Vec<Category>,
    /// Registration order; also the tie-break order for least-loaded picks.
    entries: Vec<RegistryEntry>,
    liveness: HashMap<PeerAddress, Instant>,
}

impl RegistryTable {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            entries: Vec::new(),
            liveness: HashMap::new(),
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn member_count(&self, category: &Category) -> usize {
        self.entries
            .iter()
            .filter(|e| &e.category == category)
            .count()
    }

    pub fn entry(&self, peer: &PeerAddress) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| &e.peer == peer)
    }

    pub fn contains(&self, peer: &PeerAddress) -> bool {
        self.entry(peer).is_some()
    }

    /// Adds `peer` to the category with the fewest members (first in category
    /// order on ties) with load 0, and starts its liveness clock at `now`.
    /// A peer that is already registered is replaced, not duplicated.
    pub fn register(&mut self, peer: PeerAddress, now: Instant) -> Category {
        if self.remove(&peer) {
            tracing::info!("{} re-registered, dropping its previous entry", peer);
        }

        let category = self
            .categories
            .iter()
            .min_by_key(|c| self.member_count(c))
            .cloned()
            .unwrap_or_else(Category::unknown);

        self.entries.push(RegistryEntry {
            peer,
            category: category.clone(),
            load: 0,
        });
        self.liveness.insert(peer, now);
        category
    }

    /// Picks `n` peers one at a time, each the least-loaded across all
    /// categories at the moment it is picked.
    pub fn borrow_any(&mut self, n: usize) -> Result<Vec<PeerAddress>, ClusterError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if self.entries.is_empty() {
            return Err(ClusterError::NoHelper { category: None });
        }

        let mut borrowed = Vec::with_capacity(n);
        for _ in 0..n {
            let idx = Self::least_loaded(self.entries.iter().enumerate())
                .ok_or(ClusterError::NoHelper { category: None })?;
            self.entries[idx].load += 1;
            borrowed.push(self.entries[idx].peer);
        }
        Ok(borrowed)
    }

    /// The least-loaded peer in `category`.
    pub fn borrow_one_in_category(
        &mut self,
        category: &Category,
    ) -> Result<PeerAddress, ClusterError> {
        let candidates = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| &e.category == category);
        let idx = Self::least_loaded(candidates).ok_or_else(|| ClusterError::no_helper_in(category))?;
        self.entries[idx].load += 1;
        Ok(self.entries[idx].peer)
    }

    /// One least-loaded peer per category, skipping categories with no members.
    pub fn borrow_one_per_category(&mut self) -> Vec<PeerAddress> {
        let categories = self.categories.clone();
        categories
            .iter()
            .filter_map(|c| self.borrow_one_in_category(c).ok())
            .collect()
    }

    /// Decrements `peer`'s load in `category`. Returns `false` when the peer is
    /// not registered there (e.g. already evicted). Load never goes below zero.
    pub fn return_helper(&mut self, peer: &PeerAddress, category: &Category) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| &e.peer == peer && &e.category == category)
        {
            Some(entry) => {
                if entry.load == 0 {
                    tracing::warn!("{} returned with no outstanding borrow", peer);
                }
                entry.load = entry.load.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Refreshes `peer`'s liveness. Unknown peers are ignored.
    pub fn heartbeat(&mut self, peer: &PeerAddress, now: Instant) -> bool {
        match self.liveness.get_mut(peer) {
            Some(last) => {
                *last = now;
                true
            }
            None => false,
        }
    }

    /// Removes every peer whose last heartbeat is older than `threshold`,
    /// dropping its entry and liveness record together.
    pub fn evict_dead(&mut self, now: Instant, threshold: Duration) -> Vec<PeerAddress> {
        let dead: Vec<PeerAddress> = self
            .liveness
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) > threshold)
            .map(|(peer, _)| *peer)
            .collect();

        for peer in &dead {
            self.remove(peer);
        }
        dead
    }

    fn remove(&mut self, peer: &PeerAddress) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.peer != peer);
        let had_liveness = self.liveness.remove(peer).is_some();
        before != self.entries.len() || had_liveness
    }

    fn least_loaded<'a>(
        candidates: impl Iterator<Item = (usize, &'a RegistryEntry)>,
    ) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for (idx, entry) in candidates {
            match best {
                Some((_, load)) if entry.load >= load => {}
                _ => best = Some((idx, entry.load)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    pub fn members(&self, now: Instant) -> Vec<MemberSnapshot> {
        self.entries
            .iter()
            .map(|e| MemberSnapshot {
                peer: e.peer.to_string(),
                category: e.category.clone(),
                load: e.load,
                since_heartbeat_ms: self
                    .liveness
                    .get(&e.peer)
                    .map(|last| now.saturating_duration_since(*last).as_millis() as u64)
                    .unwrap_or_default(),
            })
            .collect()
    }

    pub fn category_summary(&self) -> Vec<CategorySnapshot> {
        let mut loads: HashMap<&Category, (usize, u32)> = HashMap::new();
        for entry in &self.entries {
            let slot = loads.entry(&entry.category).or_default();
            slot.0 += 1;
            slot.1 += entry.load;
        }
        self.categories
            .iter()
            .map(|c| {
                let (members, total_load) = loads.get(c).copied().unwrap_or_default();
                CategorySnapshot {
                    category: c.clone(),
                    members,
                    total_load,
                }
            })
            .collect()
    }
}
