//! Domain model for resource leases.

mod error;
mod lease;
mod resource;

pub use error::LockDomainError;
pub use lease::{FencingToken, Lease, LeaseTtl, MAX_LEASE_TTL_SECS};
pub use resource::ResourcePath;
