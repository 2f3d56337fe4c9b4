//! Worker registry adapters.

pub mod memory;
