use super::types::CategoryResults;
use crate::storage::partitioner::Category;
use crate::storage::types::{PostingList, rank_postings};

use std::collections::{BTreeMap, HashSet};

/// Collects per-category partial results for one search job.
#[derive(Debug, Default)]
pub struct ResultSet {
    reported: HashSet<Category>,
    results: BTreeMap<String, PostingList>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records keywords that are answered without asking any worker.
    pub fn insert_empty(&mut self, keyword: &str) {
        self.results.entry(keyword.to_string()).or_default();
    }

    /// Merges one category's answer. Returns `false` for a repeat report of a
    /// category that was already merged; the repeat is ignored.
    pub fn merge(&mut self, partial: CategoryResults) -> bool {
        if !self.reported.insert(partial.category) {
            return false;
        }
        for (keyword, postings) in partial.results {
            self.results.insert(keyword, postings);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Every keyword with its postings, highest frequency first.
    pub fn into_ranked(self) -> Vec<(String, PostingList)> {
        self.results
            .into_iter()
            .map(|(keyword, mut postings)| {
                rank_postings(&mut postings);
                (keyword, postings)
            })
            .collect()
    }
}
