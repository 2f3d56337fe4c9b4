//! Registry port for worker profiles.

use crate::routing::domain::{WorkerId, WorkerProfile};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for worker registry operations.
pub type WorkerRegistryResult<T> = Result<T, WorkerRegistryError>;

/// Source of worker profiles.
///
/// The registry is managed outside the orchestrator; routing only reads it.
/// Listing order is significant: it breaks ties between equally rested
/// workers.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// Adds a worker profile.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerRegistryError::DuplicateWorker`] when the id exists.
    async fn register(&self, profile: WorkerProfile) -> WorkerRegistryResult<()>;

    /// Replaces an existing worker profile in place.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerRegistryError::NotFound`] when the id is unknown.
    async fn update(&self, profile: WorkerProfile) -> WorkerRegistryResult<()>;

    /// Removes a worker profile.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerRegistryError::NotFound`] when the id is unknown.
    async fn remove(&self, id: &WorkerId) -> WorkerRegistryResult<()>;

    /// Finds a worker by identifier.
    async fn find(&self, id: &WorkerId) -> WorkerRegistryResult<Option<WorkerProfile>>;

    /// Returns all workers in registration order.
    async fn list(&self) -> WorkerRegistryResult<Vec<WorkerProfile>>;
}

/// Errors returned by worker registry implementations.
#[derive(Debug, Clone, Error)]
pub enum WorkerRegistryError {
    /// A worker with the same identifier is already registered.
    #[error("duplicate worker identifier: {0}")]
    DuplicateWorker(WorkerId),

    /// The worker was not found.
    #[error("worker not found: {0}")]
    NotFound(WorkerId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl WorkerRegistryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
