//! Cluster Error Types
//!
//! Conditions that callers are expected to match on. Plain transport and I/O
//! failures travel as `anyhow::Error` with context attached; the variants here
//! are the ones that change what a caller does next (retry, fail the job,
//! stop loading a file).

use crate::storage::partitioner::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// The registry has no live helper that satisfies the request.
    /// `category` is `None` when the whole registry is empty.
    #[error("no helper available{}", in_category(.category))]
    NoHelper { category: Option<Category> },

    /// A job phase did not complete within its attempt bound.
    #[error("{phase} phase failed after {attempts} attempts ({remaining} unfinished)")]
    RetryExhausted {
        phase: &'static str,
        attempts: u32,
        remaining: usize,
    },

    /// A persisted shard or map-output line did not match its format.
    #[error("malformed line {line_no} in {path}: {line:?}")]
    MalformedLine {
        path: String,
        line_no: usize,
        line: String,
    },

    /// A document name that the shard line format cannot carry.
    #[error("document name {0:?} cannot be indexed")]
    InvalidDocumentName(String),

    /// A connection opened with a tag this endpoint does not serve.
    #[error("unknown request tag {0}")]
    UnknownTag(i32),

    /// The peer answered with something other than what the exchange allows.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl ClusterError {
    pub fn no_helper_in(category: &Category) -> Self {
        Self::NoHelper {
            category: Some(category.clone()),
        }
    }
}

fn in_category(category: &Option<Category>) -> String {
    match category {
        Some(c) => format!(" in category {}", c),
        None => String::new(),
    }
}
