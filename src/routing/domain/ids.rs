//! Validated worker identifiers.

use super::RoutingDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MIN_LENGTH: usize = 3;
const MAX_LENGTH: usize = 64;

/// Identifier of an externally operated worker.
///
/// Identifiers are lowercase, start with a letter or digit and contain only
/// letters, digits and hyphens (3 to 64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkerId(String);

impl WorkerId {
    /// Creates a validated worker identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingDomainError::EmptyWorkerId`] when the value is blank
    /// or [`RoutingDomainError::InvalidWorkerId`] when it breaks the naming
    /// rules.
    pub fn new(value: impl Into<String>) -> Result<Self, RoutingDomainError> {
        let raw = value.into();
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(RoutingDomainError::EmptyWorkerId);
        }

        let starts_well = normalized
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_lowercase() || first.is_ascii_digit());
        let body_valid = normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let length_valid = (MIN_LENGTH..=MAX_LENGTH).contains(&normalized.len());
        if !(starts_well && body_valid && length_valid) {
            return Err(RoutingDomainError::InvalidWorkerId(raw));
        }

        Ok(Self(normalized))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkerId {
    type Error = RoutingDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkerId> for String {
    fn from(value: WorkerId) -> Self {
        value.0
    }
}

impl AsRef<str> for WorkerId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
