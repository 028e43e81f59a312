//! Transport Module
//!
//! Request/response plumbing shared by every process in the cluster.
//! Each new TCP connection opens with one request tag; the remaining fields are
//! a fixed sequence of primitives (ints, UTF-8 strings, peer records, peer lists)
//! agreed by both ends of that exchange.
//!
//! ## Submodules
//! - **`tags`**: the stable request vocabulary and registry reply statuses.
//! - **`messenger`**: typed send/receive of the primitives over any async stream.
//! - **`discovery`**: the two-line address files used to bootstrap.

pub mod discovery;
pub mod messenger;
pub mod tags;
