//! Errors raised by the workflow engine.

use crate::artifact::{ArtifactValidationError, HandoffRenderError};
use crate::error::ErrorKind;
use crate::lock::services::LockError;
use crate::routing::domain::WorkerRole;
use crate::routing::services::RoutingError;
use crate::task::domain::{TaskDomainError, TaskId, WorkflowPhase};
use crate::task::ports::TaskRepositoryError;
use crate::task::services::TaskLifecycleError;
use thiserror::Error;

/// Failures raised while driving a task through its cycle.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// An artifact arrived for a role the task is not waiting on.
    #[error("task {task_id} is not awaiting a {role} artifact (phase {phase})")]
    NotAwaiting {
        /// Task the artifact addressed.
        task_id: TaskId,
        /// Role of the submitted artifact.
        role: WorkerRole,
        /// Phase the task is in.
        phase: WorkflowPhase,
    },

    /// A step was requested in the wrong phase.
    #[error("task {task_id} is in phase {actual}, expected {expected}")]
    WrongPhase {
        /// Task the step addressed.
        task_id: TaskId,
        /// Phase the step requires.
        expected: WorkflowPhase,
        /// Phase the task is in.
        actual: WorkflowPhase,
    },

    /// A sub-task was planned before every sub-task it depends on is done.
    #[error("task {task_id} waits on {} unfinished sub-task(s)", pending.len())]
    DependenciesPending {
        /// Dependent sub-task.
        task_id: TaskId,
        /// Prerequisites not yet done.
        pending: Vec<TaskId>,
    },

    /// The artifact failed structural validation; nothing was changed.
    #[error("artifact for task {task_id} rejected: {source}")]
    ArtifactInvalid {
        /// Task the artifact addressed.
        task_id: TaskId,
        /// Validation failures.
        source: ArtifactValidationError,
    },

    /// The stored checkpoint lacks data the current phase needs.
    #[error("checkpoint of task {task_id} is missing {missing}")]
    IncompleteCheckpoint {
        /// Affected task.
        task_id: TaskId,
        /// Missing item.
        missing: &'static str,
    },

    /// The merge step failed; the task stays approved with its leases.
    #[error("merge of task {task_id} failed: {reason}")]
    MergeFailed {
        /// Approved task.
        task_id: TaskId,
        /// Gateway message.
        reason: String,
    },

    /// Lifecycle rules or task storage rejected the step.
    #[error(transparent)]
    Lifecycle(#[from] TaskLifecycleError),

    /// Lease management failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// No worker could be routed.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// A hand-off document failed to render.
    #[error(transparent)]
    Handoff(#[from] HandoffRenderError),
}

impl From<TaskDomainError> for WorkflowError {
    fn from(err: TaskDomainError) -> Self {
        Self::Lifecycle(TaskLifecycleError::Domain(err))
    }
}

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    /// Classifies the failure for callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAwaiting { .. }
            | Self::WrongPhase { .. }
            | Self::DependenciesPending { .. } => ErrorKind::InvalidTransition,
            Self::ArtifactInvalid { .. } => ErrorKind::ValidationError,
            Self::IncompleteCheckpoint { .. } | Self::Handoff(_) => ErrorKind::Persistence,
            Self::MergeFailed { .. } => ErrorKind::MergeFailed,
            Self::Lifecycle(err) => lifecycle_kind(err),
            Self::Lock(err) => lock_kind(err),
            Self::Routing(
                RoutingError::NoEligibleAgent { .. }
                | RoutingError::PinnedWorkerUnavailable { .. },
            ) => ErrorKind::NoEligibleAgent,
            Self::Routing(RoutingError::Registry(_)) => ErrorKind::Persistence,
        }
    }

    /// Names the offending artifact field for validation failures.
    #[must_use]
    pub fn field(&self) -> Option<String> {
        match self {
            Self::ArtifactInvalid { source, .. } => Some(source.field()),
            _ => None,
        }
    }
}

const fn lifecycle_kind(err: &TaskLifecycleError) -> ErrorKind {
    match err {
        TaskLifecycleError::Domain(TaskDomainError::AttemptsExhausted { .. }) => {
            ErrorKind::AttemptsExhausted
        }
        TaskLifecycleError::Domain(
            TaskDomainError::InvalidTransition { .. } | TaskDomainError::UnauthorizedActor { .. },
        ) => ErrorKind::InvalidTransition,
        TaskLifecycleError::Domain(_)
        | TaskLifecycleError::Capability(_)
        | TaskLifecycleError::Resource(_)
        | TaskLifecycleError::Decomposition(_) => ErrorKind::ValidationError,
        TaskLifecycleError::Repository(TaskRepositoryError::StaleTask { .. }) => {
            ErrorKind::StaleTask
        }
        TaskLifecycleError::Repository(TaskRepositoryError::NotFound(_)) => ErrorKind::NotFound,
        TaskLifecycleError::Repository(_) => ErrorKind::Persistence,
    }
}

const fn lock_kind(err: &LockError) -> ErrorKind {
    match err {
        LockError::LockHeld { .. } | LockError::Contended(_) => ErrorKind::LockHeld,
        LockError::LockExpired(_) => ErrorKind::LockExpired,
        LockError::TokenMismatch(_) => ErrorKind::TokenMismatch,
        LockError::Domain(_) => ErrorKind::ValidationError,
        LockError::Store(_) => ErrorKind::Persistence,
    }
}
