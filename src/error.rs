//! Machine-readable failure taxonomy shared by the outward surface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable classification of a user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed task or artifact; correct it and resubmit.
    ValidationError,
    /// The lifecycle or workflow guard rejected the request.
    InvalidTransition,
    /// Another caller changed the task first.
    StaleTask,
    /// Another task holds a needed lease.
    LockHeld,
    /// The lease lapsed.
    LockExpired,
    /// The fencing token no longer matches.
    TokenMismatch,
    /// Routing found no eligible worker; the task is parked.
    NoEligibleAgent,
    /// The attempt ceiling was reached.
    AttemptsExhausted,
    /// The task does not exist.
    NotFound,
    /// The external merge step failed.
    MergeFailed,
    /// Storage or an internal collaborator failed.
    Persistence,
}

impl ErrorKind {
    /// Returns the stable snake_case code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::InvalidTransition => "invalid_transition",
            Self::StaleTask => "stale_task",
            Self::LockHeld => "lock_held",
            Self::LockExpired => "lock_expired",
            Self::TokenMismatch => "token_mismatch",
            Self::NoEligibleAgent => "no_eligible_agent",
            Self::AttemptsExhausted => "attempts_exhausted",
            Self::NotFound => "not_found",
            Self::MergeFailed => "merge_failed",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
