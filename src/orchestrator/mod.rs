//! Outward facade over the orchestration components.
//!
//! Every call loads the task from the store, applies one event and returns.
//! The facade adds task defaults from configuration and folds the layered
//! service errors into one [`OrchestratorError`] with a stable
//! [`ErrorKind`](crate::error::ErrorKind).

mod error;
mod service;

pub use error::{OrchestratorError, OrchestratorResult};
pub use service::{
    FsOrchestrator, InMemoryOrchestrator, Orchestrator, SubTaskRequest, SubmitTaskRequest,
    WORKSPACE_DIR,
};

#[cfg(test)]
mod tests;
