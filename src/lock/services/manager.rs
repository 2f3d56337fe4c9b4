//! Lease acquisition, renewal and release.

use crate::lock::{
    domain::{FencingToken, Lease, LeaseTtl, LockDomainError, ResourcePath},
    ports::{LeaseStore, LeaseStoreError},
};
use crate::task::domain::TaskId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Service-level errors for lease operations.
#[derive(Debug, Clone, Error)]
pub enum LockError {
    /// Another task holds an unexpired lease on the resource.
    #[error("resource '{resource}' is held by task {holder} until {expires_at}")]
    LockHeld {
        /// Contended resource.
        resource: ResourcePath,
        /// Task currently holding the lease.
        holder: TaskId,
        /// Expiry of the current lease.
        expires_at: DateTime<Utc>,
    },

    /// The lease changed between read and write.
    #[error("resource '{0}' was claimed concurrently")]
    Contended(ResourcePath),

    /// The lease lapsed or no longer exists.
    #[error("lease on '{0}' has expired")]
    LockExpired(ResourcePath),

    /// The presented fencing token does not match the stored lease.
    #[error("fencing token does not match the lease on '{0}'")]
    TokenMismatch(ResourcePath),

    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] LockDomainError),

    /// Lease storage failed.
    #[error(transparent)]
    Store(#[from] LeaseStoreError),
}

/// Result type for lease operations.
pub type LockResult<T> = Result<T, LockError>;

/// Outcome of a release call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The lease was removed.
    Released,
    /// No matching lease existed; nothing changed.
    NotHeld,
}

/// Grants, renews and releases leases against a [`LeaseStore`].
#[derive(Clone)]
pub struct LockManager<S, C>
where
    S: LeaseStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> LockManager<S, C>
where
    S: LeaseStore,
    C: Clock + Send + Sync,
{
    /// Creates a new lock manager.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Acquires `resource` for `task_id` for `ttl`.
    ///
    /// An expired lease is reclaimed in place. A task re-acquiring its own
    /// unexpired lease receives a fresh token, invalidating the old one.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::LockHeld`] when another task holds an unexpired
    /// lease, [`LockError::Contended`] when a concurrent caller won the
    /// write, or [`LockError::Store`] on storage failure.
    pub async fn acquire(
        &self,
        task_id: TaskId,
        resource: &ResourcePath,
        ttl: LeaseTtl,
    ) -> LockResult<Lease> {
        let now = self.clock.utc();
        let current = self.store.get(resource).await?;
        if let Some(existing) = current.as_ref() {
            if existing.is_expired_at(now) {
                debug!(
                    resource = %resource,
                    previous_holder = %existing.holder(),
                    "reclaiming expired lease"
                );
            } else if existing.holder() != task_id {
                return Err(LockError::LockHeld {
                    resource: resource.clone(),
                    holder: existing.holder(),
                    expires_at: existing.expires_at(),
                });
            }
        }

        let lease = Lease::grant(resource.clone(), task_id, now, ttl)?;
        let expected = current.as_ref().map(Lease::token);
        if !self.store.compare_and_swap(expected, &lease).await? {
            return Err(self.contention_error(resource).await);
        }
        info!(
            task_id = %task_id,
            resource = %resource,
            expires_at = %lease.expires_at(),
            "lease granted"
        );
        Ok(lease)
    }

    async fn contention_error(&self, resource: &ResourcePath) -> LockError {
        match self.store.get(resource).await {
            Ok(Some(winner)) => LockError::LockHeld {
                resource: resource.clone(),
                holder: winner.holder(),
                expires_at: winner.expires_at(),
            },
            Ok(None) => LockError::Contended(resource.clone()),
            Err(err) => LockError::Store(err),
        }
    }

    /// Extends the lease on `resource` to expire `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::LockExpired`] when the lease lapsed or is gone,
    /// and [`LockError::TokenMismatch`] when `token` or `task_id` do not
    /// match the stored lease. Neither failure alters the stored lease.
    pub async fn renew(
        &self,
        task_id: TaskId,
        resource: &ResourcePath,
        ttl: LeaseTtl,
        token: FencingToken,
    ) -> LockResult<Lease> {
        let now = self.clock.utc();
        let Some(current) = self.store.get(resource).await? else {
            return Err(LockError::LockExpired(resource.clone()));
        };
        if current.is_expired_at(now) {
            return Err(LockError::LockExpired(resource.clone()));
        }
        if !current.is_held_by(task_id, token) {
            return Err(LockError::TokenMismatch(resource.clone()));
        }

        let renewed = current.extended(now, ttl)?;
        if !self.store.compare_and_swap(Some(token), &renewed).await? {
            return Err(LockError::TokenMismatch(resource.clone()));
        }
        debug!(task_id = %task_id, resource = %resource, expires_at = %renewed.expires_at(), "lease renewed");
        Ok(renewed)
    }

    /// Releases the lease on `resource` if `task_id` still holds it under
    /// `token`.
    ///
    /// Releasing an absent, already released or foreign lease succeeds with
    /// [`ReleaseOutcome::NotHeld`].
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] only when storage itself fails.
    pub async fn release(
        &self,
        task_id: TaskId,
        resource: &ResourcePath,
        token: FencingToken,
    ) -> LockResult<ReleaseOutcome> {
        let current = self.store.get(resource).await?;
        let held = current
            .as_ref()
            .is_some_and(|lease| lease.is_held_by(task_id, token));
        if !held {
            debug!(task_id = %task_id, resource = %resource, "release skipped, lease not held");
            return Ok(ReleaseOutcome::NotHeld);
        }
        if self.store.remove_if(resource, token).await? {
            info!(task_id = %task_id, resource = %resource, "lease released");
            Ok(ReleaseOutcome::Released)
        } else {
            Ok(ReleaseOutcome::NotHeld)
        }
    }

    /// Returns all unexpired leases ordered by resource, reclaiming any
    /// expired ones encountered.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] when storage fails.
    pub async fn list(&self) -> LockResult<Vec<Lease>> {
        let now = self.clock.utc();
        let mut active = Vec::new();
        for lease in self.store.list().await? {
            if lease.is_expired_at(now) {
                if self.store.remove_if(lease.resource(), lease.token()).await? {
                    debug!(resource = %lease.resource(), "reclaimed expired lease");
                }
            } else {
                active.push(lease);
            }
        }
        active.sort_by(|left, right| left.resource().cmp(right.resource()));
        Ok(active)
    }

    /// Returns the unexpired leases held by `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] when storage fails.
    pub async fn held_by(&self, task_id: TaskId) -> LockResult<Vec<Lease>> {
        let leases = self.list().await?;
        Ok(leases
            .into_iter()
            .filter(|lease| lease.holder() == task_id)
            .collect())
    }
}
