//! Merge gateway that accepts every approved change and keeps a ledger.

use crate::task::domain::TaskId;
use crate::workflow::ports::{MergeGateway, MergeReceipt, MergeRejected, MergeRequest};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Records approved changes without touching any codebase.
///
/// Merging the same task twice returns the first receipt, which keeps the
/// gateway idempotent across a crash between merge and checkpoint.
#[derive(Debug, Clone, Default)]
pub struct RecordingMergeGateway {
    ledger: Arc<RwLock<BTreeMap<TaskId, (MergeRequest, MergeReceipt)>>>,
}

impl RecordingMergeGateway {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the requests merged so far, ordered by task identifier.
    ///
    /// # Errors
    ///
    /// Returns [`MergeRejected`] when the ledger lock is poisoned.
    pub fn merged(&self) -> Result<Vec<MergeRequest>, MergeRejected> {
        let ledger = self.ledger.read().map_err(poisoned)?;
        Ok(ledger.values().map(|(request, _)| request.clone()).collect())
    }
}

#[async_trait]
impl MergeGateway for RecordingMergeGateway {
    async fn merge(&self, request: &MergeRequest) -> Result<MergeReceipt, MergeRejected> {
        let mut ledger = self.ledger.write().map_err(poisoned)?;
        let entry = ledger.entry(request.task_id).or_insert_with(|| {
            let receipt = MergeReceipt {
                reference: format!("merge-{}-{}", request.task_id, request.attempt),
            };
            (request.clone(), receipt)
        });
        Ok(entry.1.clone())
    }
}

fn poisoned(err: impl ToString) -> MergeRejected {
    MergeRejected::new(format!("merge ledger lock poisoned: {}", err.to_string()))
}
