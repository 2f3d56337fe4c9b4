//! Error types for routing domain validation.

use thiserror::Error;

/// Errors returned while constructing routing domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingDomainError {
    /// The worker identifier is empty after trimming.
    #[error("worker id must not be empty")]
    EmptyWorkerId,

    /// The worker identifier does not match `[a-z0-9][a-z0-9-]{2,63}`.
    #[error("invalid worker id '{0}', expected 3-64 lowercase letters, digits or hyphens")]
    InvalidWorkerId(String),

    /// A capability name is empty after trimming.
    #[error("capability must not be empty")]
    EmptyCapability,

    /// A worker declared zero concurrent slots.
    #[error("worker '{0}' must allow at least one concurrent assignment")]
    ZeroConcurrency(String),

    /// A worker role string is unknown.
    #[error("unknown worker role: {0}")]
    UnknownRole(String),
}
