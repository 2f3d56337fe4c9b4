//! Snapshots returned to callers after each workflow step.

use crate::routing::domain::{WorkerId, WorkerRole};
use crate::task::domain::{Task, TaskError, TaskId, TaskState, TaskVersion, WorkflowPhase};

/// Caller-facing view of a task's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    /// Task identifier.
    pub task_id: TaskId,
    /// Lifecycle state.
    pub state: TaskState,
    /// Current attempt number.
    pub attempt_count: u32,
    /// Attempt ceiling.
    pub max_attempts: u32,
    /// Workflow phase.
    pub phase: WorkflowPhase,
    /// Role of the worker the task waits on, if any.
    pub awaiting_role: Option<WorkerRole>,
    /// Worker the task waits on, if any.
    pub awaiting_worker: Option<WorkerId>,
    /// Last recorded failure.
    pub last_error: Option<TaskError>,
    /// Stored version token.
    pub version: TaskVersion,
}

impl TaskStatus {
    /// Summarizes `task`.
    #[must_use]
    pub fn of(task: &Task) -> Self {
        let awaiting = task.awaiting();
        Self {
            task_id: task.id(),
            state: task.state(),
            attempt_count: task.attempt_count(),
            max_attempts: task.max_attempts(),
            phase: task.checkpoint().phase(),
            awaiting_role: awaiting.map(|(role, _)| role),
            awaiting_worker: awaiting.map(|(_, worker)| worker.clone()),
            last_error: task.last_error().cloned(),
            version: task.version(),
        }
    }
}

/// Result of applying one external event to a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// The cycle suspended and waits for the next event.
    Suspended(TaskStatus),
    /// The cycle ended in a terminal state.
    Terminal(TaskStatus),
}

impl WorkflowOutcome {
    /// Returns the status carried by either variant.
    #[must_use]
    pub const fn status(&self) -> &TaskStatus {
        match self {
            Self::Suspended(status) | Self::Terminal(status) => status,
        }
    }

    /// Returns whether the cycle has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}
