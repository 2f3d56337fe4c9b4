//! Collaborator ports used by the workflow engine.

pub mod merge;
pub mod publisher;

pub use merge::{MergeGateway, MergeReceipt, MergeRejected, MergeRequest};
pub use publisher::{HandoffPublisher, PublishError};

#[cfg(test)]
pub use merge::MockMergeGateway;
