//! Lease records and the values that guard them.

use super::{LockDomainError, ResourcePath};
use crate::task::domain::TaskId;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque proof of lease ownership.
///
/// Every grant issues a new random token, so a holder whose lease expired
/// and was re-granted can never renew or release the successor lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FencingToken(Uuid);

impl FencingToken {
    /// Creates a new random fencing token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a fencing token from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for FencingToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FencingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Longest accepted lease duration: one year.
pub const MAX_LEASE_TTL_SECS: u64 = 366 * 24 * 60 * 60;

/// Validated, strictly positive lease duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseTtl(TimeDelta);

impl LeaseTtl {
    /// Creates a lease duration from whole seconds.
    ///
    /// # Errors
    ///
    /// Returns [`LockDomainError::NonPositiveTtl`] for zero and
    /// [`LockDomainError::TtlOutOfRange`] above [`MAX_LEASE_TTL_SECS`].
    pub fn from_secs(secs: u64) -> Result<Self, LockDomainError> {
        if secs == 0 {
            return Err(LockDomainError::NonPositiveTtl);
        }
        if secs > MAX_LEASE_TTL_SECS {
            return Err(LockDomainError::TtlOutOfRange(secs));
        }
        i64::try_from(secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .map(Self)
            .ok_or(LockDomainError::TtlOutOfRange(secs))
    }

    /// Returns the duration as a [`TimeDelta`].
    #[must_use]
    pub const fn as_delta(self) -> TimeDelta {
        self.0
    }

    /// Returns the duration in whole seconds.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0.num_seconds().unsigned_abs()
    }

    /// Returns the instant `self` after `start`.
    ///
    /// # Errors
    ///
    /// Returns [`LockDomainError::TtlOutOfRange`] when the sum is not a
    /// representable timestamp.
    pub fn expiry_from(self, start: DateTime<Utc>) -> Result<DateTime<Utc>, LockDomainError> {
        start
            .checked_add_signed(self.0)
            .ok_or(LockDomainError::TtlOutOfRange(self.as_secs()))
    }
}

/// Exclusive, time-bounded claim on one resource by one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    resource: ResourcePath,
    holder: TaskId,
    token: FencingToken,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Lease {
    /// Grants a fresh lease starting at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LockDomainError::TtlOutOfRange`] when the expiry overflows.
    pub fn grant(
        resource: ResourcePath,
        holder: TaskId,
        now: DateTime<Utc>,
        ttl: LeaseTtl,
    ) -> Result<Self, LockDomainError> {
        Ok(Self {
            resource,
            holder,
            token: FencingToken::new(),
            acquired_at: now,
            expires_at: ttl.expiry_from(now)?,
        })
    }

    /// Returns a copy of this lease expiring `ttl` after `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LockDomainError::TtlOutOfRange`] when the expiry overflows.
    pub fn extended(&self, now: DateTime<Utc>, ttl: LeaseTtl) -> Result<Self, LockDomainError> {
        Ok(Self {
            expires_at: ttl.expiry_from(now)?,
            ..self.clone()
        })
    }

    /// Returns the leased resource.
    #[must_use]
    pub const fn resource(&self) -> &ResourcePath {
        &self.resource
    }

    /// Returns the task holding the lease.
    #[must_use]
    pub const fn holder(&self) -> TaskId {
        self.holder
    }

    /// Returns the fencing token issued with the lease.
    #[must_use]
    pub const fn token(&self) -> FencingToken {
        self.token
    }

    /// Returns when the lease was granted.
    #[must_use]
    pub const fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Returns when the lease lapses.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns whether the lease has lapsed at `now`.
    ///
    /// A lease is still valid at the exact instant of `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns whether `task` holds this lease under `token`.
    #[must_use]
    pub fn is_held_by(&self, task: TaskId, token: FencingToken) -> bool {
        self.holder == task && self.token == token
    }
}
