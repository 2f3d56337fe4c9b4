//! Adapters for the workflow collaborator ports.

pub mod memory;
pub mod merge;
pub mod workspace;
