//! Durable task state store and lifecycle state machine.
//!
//! Every task is one record holding its lifecycle state, attempt count,
//! append-only transition history and the workflow checkpoint needed to
//! resume after an arbitrary suspension. Records change only through
//! validated transitions and are written with compare-and-swap on the
//! task's version token. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Lifecycle service and state-change events in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
