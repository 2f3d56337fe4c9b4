//! Validated resource identifiers used as lease keys.

use super::LockDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized identifier of a lockable resource, usually a
/// repository-relative file path.
///
/// Normalization trims surrounding whitespace, converts backslashes to
/// forward slashes and strips leading `./` segments so that equivalent
/// spellings of one path share a single lease.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Creates a validated resource path.
    ///
    /// # Errors
    ///
    /// Returns [`LockDomainError::EmptyResourcePath`] when nothing remains
    /// after normalization or [`LockDomainError::InvalidResourcePath`] when
    /// the value contains control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, LockDomainError> {
        let raw = value.into();
        let slashed = raw.trim().replace('\\', "/");
        let mut normalized = slashed.as_str();
        while let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest;
        }

        if normalized.is_empty() || normalized == "." {
            return Err(LockDomainError::EmptyResourcePath);
        }
        if normalized.chars().any(char::is_control) {
            return Err(LockDomainError::InvalidResourcePath(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Returns the resource path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = LockDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourcePath> for String {
    fn from(value: ResourcePath) -> Self {
        value.0
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
