//! In-memory worker registry.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::routing::{
    domain::{WorkerId, WorkerProfile},
    ports::{WorkerRegistry, WorkerRegistryError, WorkerRegistryResult},
};

/// Thread-safe in-memory worker registry preserving registration order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkerRegistry {
    workers: Arc<RwLock<Vec<WorkerProfile>>>,
}

impl InMemoryWorkerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with `profiles`, keeping the first profile
    /// seen for any repeated id.
    #[must_use]
    pub fn from_profiles(profiles: impl IntoIterator<Item = WorkerProfile>) -> Self {
        let mut workers: Vec<WorkerProfile> = Vec::new();
        for profile in profiles {
            if !workers.iter().any(|known| known.id() == profile.id()) {
                workers.push(profile);
            }
        }
        Self {
            workers: Arc::new(RwLock::new(workers)),
        }
    }
}

fn poisoned(err: impl ToString) -> WorkerRegistryError {
    WorkerRegistryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl WorkerRegistry for InMemoryWorkerRegistry {
    async fn register(&self, profile: WorkerProfile) -> WorkerRegistryResult<()> {
        let mut workers = self.workers.write().map_err(poisoned)?;
        if workers.iter().any(|known| known.id() == profile.id()) {
            return Err(WorkerRegistryError::DuplicateWorker(profile.id().clone()));
        }
        workers.push(profile);
        Ok(())
    }

    async fn update(&self, profile: WorkerProfile) -> WorkerRegistryResult<()> {
        let mut workers = self.workers.write().map_err(poisoned)?;
        let slot = workers
            .iter_mut()
            .find(|known| known.id() == profile.id())
            .ok_or_else(|| WorkerRegistryError::NotFound(profile.id().clone()))?;
        *slot = profile;
        Ok(())
    }

    async fn remove(&self, id: &WorkerId) -> WorkerRegistryResult<()> {
        let mut workers = self.workers.write().map_err(poisoned)?;
        let before = workers.len();
        workers.retain(|known| known.id() != id);
        if workers.len() == before {
            return Err(WorkerRegistryError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn find(&self, id: &WorkerId) -> WorkerRegistryResult<Option<WorkerProfile>> {
        let workers = self.workers.read().map_err(poisoned)?;
        Ok(workers.iter().find(|known| known.id() == id).cloned())
    }

    async fn list(&self) -> WorkerRegistryResult<Vec<WorkerProfile>> {
        let workers = self.workers.read().map_err(poisoned)?;
        Ok(workers.clone())
    }
}
