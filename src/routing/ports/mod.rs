//! Port contracts for worker routing.

pub mod registry;

pub use registry::{WorkerRegistry, WorkerRegistryError, WorkerRegistryResult};
