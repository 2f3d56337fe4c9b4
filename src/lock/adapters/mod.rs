//! Lease store adapters.

pub mod filesystem;
pub mod memory;
