//! Orchestra: durable orchestration of external coding workers.
//!
//! Orchestra turns a requirement into a task and drives it through a
//! plan, build, review and decide cycle. Builders and reviewers are
//! external processes; the orchestrator hands them self-contained
//! documents, suspends, and resumes when they submit structured artifacts.
//! Every suspension is a durable checkpoint, so a task survives a restart
//! of the orchestrator between any two events.
//!
//! # Architecture
//!
//! Orchestra follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage and collaborators
//! - **Adapters**: In-memory and filesystem implementations of ports
//!
//! # Modules
//!
//! - [`task`]: Durable task store and lifecycle state machine
//! - [`lock`]: Lease-based locks on shared resources
//! - [`routing`]: Capability-based worker routing
//! - [`artifact`]: Worker artifacts, validation and hand-off documents
//! - [`workflow`]: Plan, build, review and decide engine
//! - [`orchestrator`]: Facade combining the above
//! - [`config`]: Runtime configuration

pub mod artifact;
pub mod config;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod routing;
mod storage;
pub mod task;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
