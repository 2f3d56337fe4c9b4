//! Worker registry entries and routing roles.

use super::{CapabilitySet, RoutingDomainError, WorkerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a worker plays for one attempt of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    /// Produces the change.
    Builder,
    /// Judges the change.
    Reviewer,
}

impl WorkerRole {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Builder => "builder",
            Self::Reviewer => "reviewer",
        }
    }
}

impl TryFrom<&str> for WorkerRole {
    type Error = RoutingDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "builder" => Ok(Self::Builder),
            "reviewer" => Ok(Self::Reviewer),
            _ => Err(RoutingDomainError::UnknownRole(value.to_owned())),
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally managed description of one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkerProfileInput")]
pub struct WorkerProfile {
    id: WorkerId,
    capabilities: CapabilitySet,
    max_concurrent: u32,
}

impl WorkerProfile {
    /// Creates a validated worker profile.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingDomainError::ZeroConcurrency`] when
    /// `max_concurrent` is zero.
    pub fn new(
        id: WorkerId,
        capabilities: CapabilitySet,
        max_concurrent: u32,
    ) -> Result<Self, RoutingDomainError> {
        if max_concurrent == 0 {
            return Err(RoutingDomainError::ZeroConcurrency(id.to_string()));
        }
        Ok(Self {
            id,
            capabilities,
            max_concurrent,
        })
    }

    /// Returns the worker identifier.
    #[must_use]
    pub const fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Returns the declared capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Returns how many tasks the worker may hold at once.
    #[must_use]
    pub const fn max_concurrent(&self) -> u32 {
        self.max_concurrent
    }
}

/// Unvalidated registry input as it appears in configuration files.
#[derive(Debug, Deserialize)]
struct WorkerProfileInput {
    id: WorkerId,
    #[serde(default)]
    capabilities: CapabilitySet,
    #[serde(default = "default_max_concurrent")]
    max_concurrent: u32,
}

const fn default_max_concurrent() -> u32 {
    1
}

impl TryFrom<WorkerProfileInput> for WorkerProfile {
    type Error = RoutingDomainError;

    fn try_from(input: WorkerProfileInput) -> Result<Self, Self::Error> {
        Self::new(input.id, input.capabilities, input.max_concurrent)
    }
}
