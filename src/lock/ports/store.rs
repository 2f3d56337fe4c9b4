//! Storage port for the lease table.

use crate::lock::domain::{FencingToken, Lease, ResourcePath};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for lease store operations.
pub type LeaseStoreResult<T> = Result<T, LeaseStoreError>;

/// Lease table with atomic read-modify-write scoped to one resource.
///
/// Implementations never hold a lock across keys. Contention on a single
/// resource is resolved by comparing fencing tokens.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Returns the stored lease for `resource`, expired or not.
    async fn get(&self, resource: &ResourcePath) -> LeaseStoreResult<Option<Lease>>;

    /// Installs `lease` when the currently stored token equals `expected`.
    ///
    /// `expected == None` means the resource must have no stored lease.
    /// Returns `false` without writing when the comparison fails.
    async fn compare_and_swap(
        &self,
        expected: Option<FencingToken>,
        lease: &Lease,
    ) -> LeaseStoreResult<bool>;

    /// Deletes the lease for `resource` when it still carries `token`.
    ///
    /// Returns `false` when nothing was removed.
    async fn remove_if(
        &self,
        resource: &ResourcePath,
        token: FencingToken,
    ) -> LeaseStoreResult<bool>;

    /// Returns every stored lease, expired or not.
    async fn list(&self) -> LeaseStoreResult<Vec<Lease>>;
}

/// Errors returned by lease store implementations.
#[derive(Debug, Clone, Error)]
pub enum LeaseStoreError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl LeaseStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
