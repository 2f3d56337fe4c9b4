//! Capability-based worker routing.
//!
//! Workers declare explicit capability sets; a task is routable to a worker
//! whose set is a superset of the task's requirement. Routing recomputes
//! eligibility from the current registry and assignment history on every
//! call, so registry edits apply to the very next decision.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Router service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
