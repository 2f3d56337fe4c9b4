//! Lease store persisted as one JSON document per resource.

use async_trait::async_trait;
use camino::Utf8Path;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::lock::{
    domain::{FencingToken, Lease, ResourcePath},
    ports::{LeaseStore, LeaseStoreError, LeaseStoreResult},
};
use crate::storage::{JsonDir, run_blocking};

const LOCKS_DIR: &str = "locks";

/// Lease table stored under `<state_dir>/locks`.
///
/// Documents are named by the SHA-256 digest of the resource path so that
/// arbitrary paths map to flat, portable file names. Compare-and-swap is
/// serialized within the process; writes are atomic renames.
#[derive(Debug, Clone)]
pub struct FsLeaseStore {
    dir: JsonDir,
    write_guard: Arc<Mutex<()>>,
}

impl FsLeaseStore {
    /// Opens (or creates) the lease table below `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseStoreError::Persistence`] when the directory cannot be
    /// created or opened.
    pub fn open(state_dir: &Utf8Path) -> LeaseStoreResult<Self> {
        let dir = JsonDir::open(state_dir, LOCKS_DIR).map_err(LeaseStoreError::persistence)?;
        Ok(Self {
            dir,
            write_guard: Arc::new(Mutex::new(())),
        })
    }
}

fn lease_key(resource: &ResourcePath) -> String {
    let digest = Sha256::digest(resource.as_str().as_bytes());
    digest
        .iter()
        .fold(String::with_capacity(64), |mut key, byte| {
            let _written = write!(key, "{byte:02x}");
            key
        })
}

#[async_trait]
impl LeaseStore for FsLeaseStore {
    async fn get(&self, resource: &ResourcePath) -> LeaseStoreResult<Option<Lease>> {
        let dir = self.dir.clone();
        let key = lease_key(resource);
        run_blocking(move || dir.read::<Lease>(&key))
            .await
            .map_err(LeaseStoreError::persistence)
    }

    async fn compare_and_swap(
        &self,
        expected: Option<FencingToken>,
        lease: &Lease,
    ) -> LeaseStoreResult<bool> {
        let _guard = self.write_guard.lock().await;
        let dir = self.dir.clone();
        let key = lease_key(lease.resource());
        let replacement = lease.clone();
        run_blocking(move || {
            let current = dir.read::<Lease>(&key)?.map(|stored| stored.token());
            if current != expected {
                return Ok(false);
            }
            dir.write(&key, &replacement)?;
            Ok(true)
        })
        .await
        .map_err(LeaseStoreError::persistence)
    }

    async fn remove_if(
        &self,
        resource: &ResourcePath,
        token: FencingToken,
    ) -> LeaseStoreResult<bool> {
        let _guard = self.write_guard.lock().await;
        let dir = self.dir.clone();
        let key = lease_key(resource);
        run_blocking(move || {
            let current = dir.read::<Lease>(&key)?.map(|stored| stored.token());
            if current != Some(token) {
                return Ok(false);
            }
            dir.remove(&key)
        })
        .await
        .map_err(LeaseStoreError::persistence)
    }

    async fn list(&self) -> LeaseStoreResult<Vec<Lease>> {
        let dir = self.dir.clone();
        run_blocking(move || dir.read_all::<Lease>())
            .await
            .map_err(LeaseStoreError::persistence)
    }
}
