//! Domain model for workers and routing history.

mod capability;
mod error;
mod history;
mod ids;
mod profile;

pub use capability::{Capability, CapabilitySet};
pub use error::RoutingDomainError;
pub use history::AssignmentHistory;
pub use ids::WorkerId;
pub use profile::{WorkerProfile, WorkerRole};
