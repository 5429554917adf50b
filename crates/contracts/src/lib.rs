//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the hub: the snapshot
//! data model, the `SourceDriver` seam, configuration types and errors.
//! All business crates depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Publication instants are monotonic (`std::time::Instant`)
//! - Per-source sequence numbers start at 1 and only grow

mod blueprint;
mod error;
mod snapshot;
mod source_driver;
mod source_id;

pub use blueprint::*;
pub use error::*;
pub use snapshot::*;
pub use source_driver::SourceDriver;
pub use source_id::SourceId;
