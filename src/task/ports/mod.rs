//! Storage contract for task records.
//!
//! Services depend on this trait; the in-memory and filesystem adapters
//! implement it.

pub mod repository;

pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
