//! Worker Module
//!
//! A worker owns the shard of exactly one category and executes the tasks that
//! orchestrators dispatch to it.
//!
//! ## Core Mechanisms
//! - **Registration**: at startup the worker registers with the registry, learns its category
//!   and reloads that category's shard file.
//! - **Task Dispatch**: each connection carries one map, reduce or search task; the result is
//!   reported on a fresh connection to the orchestrator's callback address.
//! - **Self-Return**: after every task the worker tells the registry it is free again.
//! - **Heartbeat**: a background loop keeps the worker's liveness record fresh.

pub mod service;
pub mod tasks;
pub mod types;
