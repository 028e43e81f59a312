use serde::{Deserialize, Serialize};

/// How many times a word occurs in one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Posting {
    pub document: String,
    pub frequency: u32,
}

impl Posting {
    pub fn new(document: impl Into<String>, frequency: u32) -> Self {
        Self {
            document: document.into(),
            frequency,
        }
    }
}

/// Postings for one word, in the order they were merged.
pub type PostingList = Vec<Posting>;

/// Sorts by descending frequency. The sort is stable, so equal frequencies
/// keep their merge order (earlier-indexed documents first).
pub fn rank_postings(postings: &mut PostingList) {
    postings.sort_by(|a, b| b.frequency.cmp(&a.frequency));
}
