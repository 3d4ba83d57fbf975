//! Distributed lease (C1): the leased mutex the coordinator uses both for
//! per-branch exclusion and for the recovery poller's single-runner lease.
#![warn(missing_docs)]

mod error;
mod lock;
mod options;

pub use error::LockError;
pub use lock::{DistributedLock, ReleaseOutcome};
pub use options::AcquireOptions;
