//! Membership & Load Balancing Module
//!
//! The registry process: which workers exist, which category each one owns, how
//! busy each one is, and whether each one is still alive.
//!
//! ## Core Mechanisms
//! - **Category Assignment**: a registering worker joins the category with the fewest members.
//! - **Borrow/Return**: orchestrators borrow the least-loaded workers (incrementing their load)
//!   and workers return themselves when a task finishes.
//! - **Failure Detection**: workers send periodic heartbeats; an eviction loop drops any worker
//!   whose last heartbeat is older than the dead threshold.

pub mod client;
pub mod service;
pub mod status;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;
