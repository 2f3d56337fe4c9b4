//! In-memory lease store for tests and single-process embedding.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::lock::{
    domain::{FencingToken, Lease, ResourcePath},
    ports::{LeaseStore, LeaseStoreError, LeaseStoreResult},
};

/// Thread-safe in-memory lease table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaseStore {
    leases: Arc<RwLock<HashMap<ResourcePath, Lease>>>,
}

impl InMemoryLeaseStore {
    /// Creates an empty lease table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(err: impl ToString) -> LeaseStoreError {
    LeaseStoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn get(&self, resource: &ResourcePath) -> LeaseStoreResult<Option<Lease>> {
        let leases = self.leases.read().map_err(poisoned)?;
        Ok(leases.get(resource).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: Option<FencingToken>,
        lease: &Lease,
    ) -> LeaseStoreResult<bool> {
        let mut leases = self.leases.write().map_err(poisoned)?;
        let current = leases.get(lease.resource()).map(Lease::token);
        if current != expected {
            return Ok(false);
        }
        leases.insert(lease.resource().clone(), lease.clone());
        Ok(true)
    }

    async fn remove_if(
        &self,
        resource: &ResourcePath,
        token: FencingToken,
    ) -> LeaseStoreResult<bool> {
        let mut leases = self.leases.write().map_err(poisoned)?;
        if leases.get(resource).map(Lease::token) != Some(token) {
            return Ok(false);
        }
        leases.remove(resource);
        Ok(true)
    }

    async fn list(&self) -> LeaseStoreResult<Vec<Lease>> {
        let leases = self.leases.read().map_err(poisoned)?;
        Ok(leases.values().cloned().collect())
    }
}
