//! Port contracts for lease storage.

pub mod store;

pub use store::{LeaseStore, LeaseStoreError, LeaseStoreResult};
