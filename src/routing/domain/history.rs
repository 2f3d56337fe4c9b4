//! Assignment history consulted by the router.

use super::WorkerId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WorkerUsage {
    last_assigned: Option<DateTime<Utc>>,
    active: u32,
}

/// Snapshot of past and current assignments per worker.
///
/// The snapshot is rebuilt from the task store before each routing call and
/// never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentHistory {
    usage: HashMap<WorkerId, WorkerUsage>,
}

impl AssignmentHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `worker` was assigned work at `at`, keeping the latest
    /// timestamp seen.
    pub fn record_assignment(&mut self, worker: &WorkerId, at: DateTime<Utc>) {
        let usage = self.usage.entry(worker.clone()).or_default();
        usage.last_assigned = Some(usage.last_assigned.map_or(at, |seen| seen.max(at)));
    }

    /// Records one in-flight assignment for `worker`.
    pub fn record_active(&mut self, worker: &WorkerId) {
        let usage = self.usage.entry(worker.clone()).or_default();
        usage.active = usage.active.saturating_add(1);
    }

    /// Returns the most recent assignment time, if the worker was ever used.
    #[must_use]
    pub fn last_assigned(&self, worker: &WorkerId) -> Option<DateTime<Utc>> {
        self.usage.get(worker).and_then(|usage| usage.last_assigned)
    }

    /// Returns how many in-flight assignments the worker holds.
    #[must_use]
    pub fn active_load(&self, worker: &WorkerId) -> u32 {
        self.usage.get(worker).map_or(0, |usage| usage.active)
    }
}
