//! Error types for lease domain validation.

use thiserror::Error;

/// Errors returned while constructing lease domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockDomainError {
    /// The resource path is empty after normalization.
    #[error("resource path must not be empty")]
    EmptyResourcePath,

    /// The resource path contains characters that cannot name a resource.
    #[error("invalid resource path '{0}'")]
    InvalidResourcePath(String),

    /// The lease time-to-live is zero.
    #[error("lease ttl must be greater than zero")]
    NonPositiveTtl,

    /// The lease time-to-live cannot be represented as a timestamp offset.
    #[error("lease ttl of {0} seconds is out of range")]
    TtlOutOfRange(u64),
}
