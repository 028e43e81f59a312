//! Sharded Search Cluster Library
//!
//! This library crate defines the components of a small distributed indexing and
//! search cluster. The binary (`main.rs`) runs one of them per process.
//!
//! ## Architecture Modules
//! - **`membership`**: The registry. Assigns each worker a category, lends the least-loaded
//!   workers to orchestrators, and evicts workers whose heartbeats stop.
//! - **`orchestrator`**: Drives indexing (map then reduce) and searching jobs across borrowed
//!   workers, retrying unfinished work on a bounded number of rounds.
//! - **`worker`**: Owns one category's shard of the inverted index and executes map, reduce and
//!   search tasks.
//! - **`client`**: Library entry points for submitting jobs, with a short-lived result cache.
//! - **`storage`**: Category partitioning, the line formats, and the persisted shard.
//! - **`search`**: Tokenization and aggregation of per-category results.
//! - **`transport`**: Tagged request framing over TCP and address discovery files.

pub mod client;
pub mod config;
pub mod error;
pub mod membership;
pub mod orchestrator;
pub mod search;
pub mod storage;
pub mod transport;
pub mod worker;
