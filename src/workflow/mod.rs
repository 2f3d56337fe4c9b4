//! Plan, build, review and decide workflow engine.
//!
//! Each task runs one cycle per attempt. The engine never waits for a
//! worker: it writes a checkpoint and returns at every suspension point, and
//! the next external event (an artifact submission or an operator resume) is
//! applied to the stored checkpoint, possibly by a freshly started process.
//! Retries are the explicit, counted `RETRY -> ASSIGNED` lifecycle edge.
//!
//! - Engine in [`WorkflowEngine`]
//! - Collaborator ports in [`ports`]
//! - Collaborator adapters in [`adapters`]

pub mod adapters;
mod engine;
mod error;
pub mod ports;
mod status;

pub use engine::WorkflowEngine;
pub use error::{WorkflowError, WorkflowResult};
pub use status::{TaskStatus, WorkflowOutcome};

#[cfg(test)]
mod tests;
