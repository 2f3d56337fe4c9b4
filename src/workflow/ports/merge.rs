//! Port for integrating an approved change.

use crate::lock::domain::ResourcePath;
use crate::routing::domain::WorkerId;
use crate::task::domain::TaskId;
use async_trait::async_trait;
use thiserror::Error;

/// Everything the merge step needs to integrate one approved attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// Approved task.
    pub task_id: TaskId,
    /// Attempt that was approved.
    pub attempt: u32,
    /// Builder who produced the change.
    pub builder: WorkerId,
    /// Reviewer who approved it.
    pub reviewer: WorkerId,
    /// Builder summary.
    pub summary: String,
    /// Resources the change touches.
    pub changed_resources: Vec<ResourcePath>,
}

/// Reference to the integrated change, such as a commit identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReceipt {
    /// Opaque reference recorded in the transition history.
    pub reference: String,
}

/// The merge step refused or failed to integrate the change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("merge rejected: {reason}")]
pub struct MergeRejected {
    /// Human-readable cause.
    pub reason: String,
}

impl MergeRejected {
    /// Creates a rejection with the given cause.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Integrates approved changes into the shared codebase.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MergeGateway: Send + Sync {
    /// Integrates the approved change.
    ///
    /// Must be safe to call again for the same task after a failure or a
    /// crash between merging and recording the result.
    async fn merge(&self, request: &MergeRequest) -> Result<MergeReceipt, MergeRejected>;
}
