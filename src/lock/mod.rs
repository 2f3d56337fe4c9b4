//! Lease-based lock management for shared mutable resources.
//!
//! Tasks take exclusive, time-bounded leases on the resources they declare
//! before a builder is handed work. Leases are advisory: they coordinate
//! cooperating callers and never police out-of-band writes. Expired leases
//! are reclaimed lazily by the next operation that touches the resource.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Lock manager service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
