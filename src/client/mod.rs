//! Client Module
//!
//! The library a user-facing program links to submit jobs to the orchestrator.
//!
//! ## Core Mechanisms
//! - **Transaction Ids**: every indexing request carries a process-wide, strictly increasing id.
//! - **Result Cache**: per-keyword answers are reused for a short time instead of re-querying.

pub mod cache;
pub mod requests;
pub mod types;
