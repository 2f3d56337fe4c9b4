//! Facade error type.

use crate::config::ConfigError;
use crate::error::ErrorKind;
use crate::lock::ports::LeaseStoreError;
use crate::routing::domain::{WorkerId, WorkerRole};
use crate::task::domain::{DecompositionId, TaskId};
use crate::task::ports::TaskRepositoryError;
use crate::workflow::WorkflowError;
use crate::workflow::adapters::workspace::WorkspaceError;
use std::io;
use thiserror::Error;

/// Errors returned by [`Orchestrator`](super::Orchestrator) operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The task recorded the request but the step that followed failed, for
    /// example a stored task that could not be planned or an accepted
    /// artifact with no eligible reviewer. The task waits for an operator
    /// resume.
    #[error("task {task_id} is parked: {source}")]
    Parked {
        /// Task that recorded the request.
        task_id: TaskId,
        /// Failure of the follow-up step.
        source: Box<WorkflowError>,
    },

    /// A pinned worker is not registered with the task's capabilities;
    /// nothing was stored.
    #[error("pinned {role} {worker} is not registered with every required capability")]
    PinRejected {
        /// Role the worker was pinned to.
        role: WorkerRole,
        /// Pinned worker.
        worker: WorkerId,
    },

    /// No sub-task carries the decomposition identifier.
    #[error("decomposition {0} not found")]
    UnknownDecomposition(DecompositionId),

    /// A workflow step failed.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A workspace submission could not be read.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A filesystem store could not be opened.
    #[error("failed to open state directory: {0}")]
    Storage(#[source] io::Error),
}

impl From<TaskRepositoryError> for OrchestratorError {
    fn from(err: TaskRepositoryError) -> Self {
        Self::Storage(io::Error::other(err))
    }
}

impl From<LeaseStoreError> for OrchestratorError {
    fn from(err: LeaseStoreError) -> Self {
        Self::Storage(io::Error::other(err))
    }
}

/// Result type for facade operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl OrchestratorError {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parked { source, .. } => source.kind(),
            Self::Workflow(source) => source.kind(),
            Self::PinRejected { .. }
            | Self::Workspace(WorkspaceError::Malformed { .. })
            | Self::Config(_) => ErrorKind::ValidationError,
            Self::UnknownDecomposition(_) => ErrorKind::NotFound,
            Self::Workspace(WorkspaceError::Io(_)) | Self::Storage(_) => ErrorKind::Persistence,
        }
    }

    /// Returns the task left parked by a failed submission.
    #[must_use]
    pub const fn parked_task(&self) -> Option<TaskId> {
        match self {
            Self::Parked { task_id, .. } => Some(*task_id),
            Self::PinRejected { .. }
            | Self::UnknownDecomposition(_)
            | Self::Workflow(_)
            | Self::Workspace(_)
            | Self::Config(_)
            | Self::Storage(_) => None,
        }
    }

    /// Names the offending artifact field, failing check or pinned role.
    #[must_use]
    pub fn field(&self) -> Option<String> {
        match self {
            Self::Parked { source, .. } => source.field(),
            Self::Workflow(source) => source.field(),
            Self::PinRejected { role, .. } => Some(role.as_str().to_owned()),
            Self::UnknownDecomposition(_)
            | Self::Workspace(_)
            | Self::Config(_)
            | Self::Storage(_) => None,
        }
    }
}
