//! Eligibility filtering and least-recently-assigned selection.

use crate::routing::{
    domain::{AssignmentHistory, CapabilitySet, WorkerId, WorkerProfile, WorkerRole},
    ports::{WorkerRegistry, WorkerRegistryError},
};
use crate::task::domain::TaskId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Service-level errors for routing.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    /// No registered worker satisfies the requirement for the role.
    #[error("no eligible {role} for task {task_id} requiring {required}")]
    NoEligibleAgent {
        /// Task being routed.
        task_id: TaskId,
        /// Role being filled.
        role: WorkerRole,
        /// Capabilities the worker needed.
        required: CapabilitySet,
    },

    /// The worker pinned for the role cannot take the task: it is not
    /// registered, lacks a capability, is the builder, or is at capacity.
    #[error("pinned {role} {worker} is not available for task {task_id}")]
    PinnedWorkerUnavailable {
        /// Task being routed.
        task_id: TaskId,
        /// Role being filled.
        role: WorkerRole,
        /// Worker named by the operator.
        worker: WorkerId,
    },

    /// Registry lookup failed.
    #[error(transparent)]
    Registry(#[from] WorkerRegistryError),
}

/// Result type for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Selects workers for builder and reviewer roles.
///
/// A worker pinned on the task is the only candidate for its role. Without
/// a pin, the configured default for the role is preferred while it is
/// eligible, and least-recently-assigned selection decides otherwise.
#[derive(Clone)]
pub struct CapabilityRouter<W>
where
    W: WorkerRegistry,
{
    registry: Arc<W>,
    default_builder: Option<WorkerId>,
    default_reviewer: Option<WorkerId>,
}

impl<W> CapabilityRouter<W>
where
    W: WorkerRegistry,
{
    /// Creates a router over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<W>) -> Self {
        Self {
            registry,
            default_builder: None,
            default_reviewer: None,
        }
    }

    /// Prefers `builder` and `reviewer` for tasks that pin no worker.
    #[must_use]
    pub fn with_defaults(mut self, builder: Option<WorkerId>, reviewer: Option<WorkerId>) -> Self {
        self.default_builder = builder;
        self.default_reviewer = reviewer;
        self
    }

    /// Reports whether `worker` is registered with every capability in
    /// `required`, ignoring its current load.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Registry`] when the registry cannot be read.
    pub async fn can_serve(
        &self,
        worker: &WorkerId,
        required: &CapabilitySet,
    ) -> RoutingResult<bool> {
        Ok(self
            .registry
            .find(worker)
            .await?
            .is_some_and(|profile| profile.capabilities().satisfies(required)))
    }

    /// Returns the workers eligible for `required`, most preferred first.
    ///
    /// A worker is eligible when its capabilities cover `required`, it is not
    /// `excluded`, and it has spare concurrency. Workers never assigned come
    /// first, then the least recently assigned; ties keep registry order.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Registry`] when the registry cannot be read.
    pub async fn eligible(
        &self,
        required: &CapabilitySet,
        history: &AssignmentHistory,
        excluded: Option<&WorkerId>,
    ) -> RoutingResult<Vec<WorkerProfile>> {
        let mut candidates: Vec<WorkerProfile> = self
            .registry
            .list()
            .await?
            .into_iter()
            .filter(|worker| worker.capabilities().satisfies(required))
            .filter(|worker| excluded != Some(worker.id()))
            .filter(|worker| history.active_load(worker.id()) < worker.max_concurrent())
            .collect();
        // `None` (never assigned) orders first; the stable sort keeps
        // registry order among equals.
        candidates.sort_by_key(|worker| history.last_assigned(worker.id()));
        Ok(candidates)
    }

    /// Picks the builder for a task attempt, honouring `pinned` when set.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::NoEligibleAgent`] when no worker qualifies,
    /// or [`RoutingError::PinnedWorkerUnavailable`] when the pinned worker
    /// does not.
    pub async fn select_builder(
        &self,
        task_id: TaskId,
        required: &CapabilitySet,
        history: &AssignmentHistory,
        pinned: Option<&WorkerId>,
    ) -> RoutingResult<WorkerProfile> {
        let route = Route {
            task_id,
            role: WorkerRole::Builder,
            excluded: None,
            pinned,
            preferred: self.default_builder.as_ref(),
        };
        self.select(&route, required, history).await
    }

    /// Picks the reviewer for a task attempt, never returning `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::NoEligibleAgent`] when no worker other than
    /// the builder qualifies, or [`RoutingError::PinnedWorkerUnavailable`]
    /// when the pinned worker does not.
    pub async fn select_reviewer(
        &self,
        task_id: TaskId,
        required: &CapabilitySet,
        history: &AssignmentHistory,
        builder: &WorkerId,
        pinned: Option<&WorkerId>,
    ) -> RoutingResult<WorkerProfile> {
        let route = Route {
            task_id,
            role: WorkerRole::Reviewer,
            excluded: Some(builder),
            pinned,
            preferred: self.default_reviewer.as_ref(),
        };
        self.select(&route, required, history).await
    }

    async fn select(
        &self,
        route: &Route<'_>,
        required: &CapabilitySet,
        history: &AssignmentHistory,
    ) -> RoutingResult<WorkerProfile> {
        let Route {
            task_id,
            role,
            excluded,
            pinned,
            preferred,
        } = *route;
        let mut candidates = self.eligible(required, history, excluded).await?;
        if let Some(worker) = pinned {
            return candidates
                .into_iter()
                .find(|candidate| candidate.id() == worker)
                .ok_or_else(|| {
                    warn!(
                        task_id = %task_id,
                        role = %role,
                        worker = %worker,
                        "pinned worker unavailable"
                    );
                    RoutingError::PinnedWorkerUnavailable {
                        task_id,
                        role,
                        worker: worker.clone(),
                    }
                });
        }
        // Stable, so the default moves to the front and the rest keep
        // their least-recently-assigned order.
        candidates.sort_by_key(|candidate| preferred != Some(candidate.id()));
        let Some(chosen) = candidates.into_iter().next() else {
            warn!(task_id = %task_id, role = %role, required = %required, "no eligible worker");
            return Err(RoutingError::NoEligibleAgent {
                task_id,
                role,
                required: required.clone(),
            });
        };
        debug!(task_id = %task_id, role = %role, worker = %chosen.id(), "worker selected");
        Ok(chosen)
    }
}

/// Parameters of one role selection.
#[derive(Clone, Copy)]
struct Route<'a> {
    task_id: TaskId,
    role: WorkerRole,
    excluded: Option<&'a WorkerId>,
    pinned: Option<&'a WorkerId>,
    preferred: Option<&'a WorkerId>,
}
