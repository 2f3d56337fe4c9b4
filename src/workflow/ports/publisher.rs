//! Port for delivering hand-off documents to workers.

use crate::artifact::HandoffDocument;
use crate::task::domain::TaskId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Delivery of a hand-off document failed.
#[derive(Debug, Clone, Error)]
#[error("failed to publish hand-off for task {task_id}: {source}")]
pub struct PublishError {
    /// Task the document belongs to.
    pub task_id: TaskId,
    /// Underlying failure.
    pub source: Arc<dyn std::error::Error + Send + Sync>,
}

impl PublishError {
    /// Wraps a delivery failure.
    pub fn new(task_id: TaskId, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            task_id,
            source: Arc::new(err),
        }
    }
}

/// Places hand-off documents where the assigned worker will read them.
///
/// The checkpoint is the source of truth; publishing is a delivery
/// convenience and may be repeated on resume.
#[async_trait]
pub trait HandoffPublisher: Send + Sync {
    /// Delivers `document` for `task_id`, replacing any earlier delivery for
    /// the same role.
    async fn publish(&self, task_id: TaskId, document: &HandoffDocument) -> Result<(), PublishError>;
}
