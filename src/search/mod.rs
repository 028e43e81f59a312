//! Search Module
//!
//! Text processing and result handling shared by the map, search and client paths.
//!
//! ## Responsibilities
//! - **Tokenization**: the `[a-z0-9]+` word predicate and per-segment word counting.
//! - **Aggregation**: merging per-category partial answers into one keyword→postings set.
//! - **Ranking**: returning postings by descending frequency.

pub mod engine;
pub mod tokenizer;
pub mod types;
