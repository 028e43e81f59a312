//! Index Storage Module
//!
//! Word partitioning and the on-disk formats of the category-sharded inverted index.
//!
//! ## Core Concepts
//! - **Partitioning**: `partitioner::category_of` maps every string to exactly one category.
//!   Categories are the unit of shard ownership: each worker serves one.
//! - **Shards**: a worker's postings for its category, held in memory and rewritten to
//!   `working/reducers/<category>` after every merge.
//! - **Codecs**: line formats for shard files, map output, and postings on the wire.

pub mod codec;
pub mod partitioner;
pub mod shard;
pub mod types;
