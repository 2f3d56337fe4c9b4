//! Error types for task domain validation and parsing.

use super::{ActorRole, TaskId, TaskState};
use crate::routing::domain::WorkerId;
use thiserror::Error;

/// Errors returned by task construction and lifecycle rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The requirement text is empty after trimming.
    #[error("task requirement must not be empty")]
    EmptyRequirement,

    /// The attempt ceiling is zero.
    #[error("max attempts must be at least 1")]
    ZeroMaxAttempts,

    /// The edge is absent from the transition table.
    #[error("task {task_id} cannot transition from {from} to {to}")]
    InvalidTransition {
        /// Task being transitioned.
        task_id: TaskId,
        /// Current state.
        from: TaskState,
        /// Requested state.
        to: TaskState,
    },

    /// The edge exists but the actor's role may not take it.
    #[error("a {role} may not transition task {task_id} from {from} to {to}")]
    UnauthorizedActor {
        /// Task being transitioned.
        task_id: TaskId,
        /// Current state.
        from: TaskState,
        /// Requested state.
        to: TaskState,
        /// Role of the rejected actor.
        role: ActorRole,
    },

    /// Another attempt would exceed the ceiling.
    #[error("task {task_id} has used all {max_attempts} attempts")]
    AttemptsExhausted {
        /// Task being retried.
        task_id: TaskId,
        /// Attempt ceiling.
        max_attempts: u32,
    },

    /// The reviewer would be the worker who built the change.
    #[error("worker {0} cannot review its own change")]
    ReviewerIsBuilder(WorkerId),
}

/// Error returned while parsing task states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task state: {0}")]
pub struct ParseTaskStateError(pub String);
