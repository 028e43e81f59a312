//! Orchestrator Module
//!
//! Drives the cluster's two distributed jobs on behalf of clients.
//!
//! ## Core Mechanisms
//! - **Indexing**: a map phase (one task per input segment, any worker) followed by a reduce
//!   phase (one task per category) and removal of the transaction's map output.
//! - **Searching**: keywords grouped by category, one search task per category, partial answers
//!   merged and ranked.
//! - **Bounded Retry**: every phase waits for callbacks with a per-accept timeout and redispatches
//!   unfinished work to fresh workers, failing the job after a fixed number of rounds.
//!
//! ## Submodules
//! - **`phase`**: the shared accept/timeout/retry loop and concurrent task sending.
//! - **`indexing`** / **`searching`**: the concrete phases of each job.
//! - **`service`**: the client-facing listener.

pub mod indexing;
pub mod phase;
pub mod searching;
pub mod service;

#[cfg(test)]
mod tests;
