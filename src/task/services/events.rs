//! State-change notifications published after each committed write.

use crate::task::domain::{Actor, TaskId, TaskState, TaskVersion};

/// Event broadcast by the lifecycle service once a change is durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A task was stored for the first time.
    Created {
        /// New task.
        task_id: TaskId,
        /// Stored version.
        version: TaskVersion,
    },
    /// A transition was committed.
    StateChanged {
        /// Transitioned task.
        task_id: TaskId,
        /// State before the transition.
        from: TaskState,
        /// State after the transition.
        to: TaskState,
        /// Who requested it.
        actor: Actor,
        /// Attempt number after the transition.
        attempt: u32,
        /// Version stored by the commit that carried the transition.
        version: TaskVersion,
    },
}

impl TaskEvent {
    /// Returns the task the event concerns.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::Created { task_id, .. } | Self::StateChanged { task_id, .. } => *task_id,
        }
    }
}
