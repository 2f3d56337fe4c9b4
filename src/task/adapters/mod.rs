//! Task repository adapters.

pub mod filesystem;
pub mod memory;
