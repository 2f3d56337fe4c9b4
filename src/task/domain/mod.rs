//! Domain model for task lifecycle management.
//!
//! The task domain owns the transition table, the attempt counter and the
//! workflow checkpoint while keeping storage concerns outside the domain
//! boundary.

mod checkpoint;
mod decomposition;
mod error;
mod ids;
mod state;
mod task;

pub use checkpoint::{Checkpoint, HeldLease, ReviewFeedback, WorkflowPhase};
pub use decomposition::{
    DecompositionError, DecompositionId, DecompositionOutcome, DecompositionReport, SubTaskLink,
    SubTaskSummary, dependency_order,
};
pub use error::{ParseTaskStateError, TaskDomainError};
pub use ids::{TaskId, TaskVersion};
pub use state::{Actor, ActorRole, EdgeGuard, TaskState};
pub use task::{AssignmentRecord, Task, TaskError, TaskSpec, TransitionRecord};
