//! Application services for lease management.

mod manager;

pub use manager::{LockError, LockManager, LockResult, ReleaseOutcome};
