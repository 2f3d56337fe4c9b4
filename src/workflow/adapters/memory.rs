//! In-memory hand-off inbox for tests and embedding.

use crate::artifact::HandoffDocument;
use crate::routing::domain::WorkerRole;
use crate::task::domain::TaskId;
use crate::workflow::ports::{HandoffPublisher, PublishError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};

/// Keeps the latest hand-off per task and role.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInbox {
    documents: Arc<RwLock<HashMap<(TaskId, WorkerRole), HandoffDocument>>>,
}

impl InMemoryInbox {
    /// Creates an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest document published for `task_id` and `role`.
    #[must_use]
    pub fn latest(&self, task_id: TaskId, role: WorkerRole) -> Option<HandoffDocument> {
        self.documents
            .read()
            .ok()
            .and_then(|documents| documents.get(&(task_id, role)).cloned())
    }
}

#[async_trait]
impl HandoffPublisher for InMemoryInbox {
    async fn publish(&self, task_id: TaskId, document: &HandoffDocument) -> Result<(), PublishError> {
        let mut documents = self
            .documents
            .write()
            .map_err(|err| PublishError::new(task_id, io::Error::other(err.to_string())))?;
        documents.insert((task_id, document.role()), document.clone());
        Ok(())
    }
}
