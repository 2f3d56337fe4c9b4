//! Workflow engine driving plan, build, review and decide.

use crate::artifact::{
    Artifact, ArtifactExpectation, ArtifactValidationError, BuilderBrief, HandoffDocument,
    PrerequisiteSummary, PriorFeedback, ReviewDecision, ReviewerBrief, render_builder_handoff,
    render_reviewer_handoff, validate_builder_artifact, validate_reviewer_artifact,
};
use crate::lock::domain::{Lease, LeaseTtl, ResourcePath};
use crate::lock::ports::LeaseStore;
use crate::lock::services::{LockError, LockManager, LockResult};
use crate::routing::domain::{AssignmentHistory, WorkerId, WorkerRole};
use crate::routing::ports::WorkerRegistry;
use crate::routing::services::CapabilityRouter;
use crate::task::domain::{
    Actor, HeldLease, ReviewFeedback, Task, TaskError, TaskId, TaskState, WorkflowPhase,
};
use crate::task::ports::TaskRepository;
use crate::task::services::TaskLifecycleService;
use crate::workflow::ports::{HandoffPublisher, MergeGateway, MergeRequest};
use crate::workflow::{TaskStatus, WorkflowError, WorkflowOutcome, WorkflowResult};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Leases secured while planning an attempt.
#[derive(Default)]
struct SecuredLeases {
    held: Vec<HeldLease>,
    fresh: Vec<HeldLease>,
}

/// Drives tasks through one plan, build, review and decide cycle per attempt.
///
/// Every public operation loads the stored task, applies one event, commits
/// the result with compare-and-swap and returns. No state is kept between
/// calls, so any engine instance over the same stores can continue a task.
pub struct WorkflowEngine<T, L, W, C>
where
    T: TaskRepository,
    L: LeaseStore,
    W: WorkerRegistry,
    C: Clock + Send + Sync,
{
    tasks: TaskLifecycleService<T, C>,
    locks: LockManager<L, C>,
    router: CapabilityRouter<W>,
    merge: Arc<dyn MergeGateway>,
    publisher: Option<Arc<dyn HandoffPublisher>>,
    lease_ttl: LeaseTtl,
}

impl<T, L, W, C> WorkflowEngine<T, L, W, C>
where
    T: TaskRepository,
    L: LeaseStore,
    W: WorkerRegistry,
    C: Clock + Send + Sync,
{
    /// Creates an engine over the given services.
    #[must_use]
    pub const fn new(
        tasks: TaskLifecycleService<T, C>,
        locks: LockManager<L, C>,
        router: CapabilityRouter<W>,
        merge: Arc<dyn MergeGateway>,
        lease_ttl: LeaseTtl,
    ) -> Self {
        Self {
            tasks,
            locks,
            router,
            merge,
            publisher: None,
            lease_ttl,
        }
    }

    /// Delivers every rendered hand-off through `publisher` as well as the
    /// checkpoint.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn HandoffPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Returns the task lifecycle service.
    #[must_use]
    pub const fn tasks(&self) -> &TaskLifecycleService<T, C> {
        &self.tasks
    }

    /// Returns the worker router.
    #[must_use]
    pub const fn router(&self) -> &CapabilityRouter<W> {
        &self.router
    }

    /// Returns the lock manager.
    #[must_use]
    pub const fn locks(&self) -> &LockManager<L, C> {
        &self.locks
    }

    /// Plans the next attempt of a queued or retrying task.
    ///
    /// Routes a builder, secures leases on every declared resource, renders
    /// the builder hand-off and suspends in the build phase. On failure the
    /// stored task is unchanged and leases taken by this call are released.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::WrongPhase`] outside the plan phase,
    /// [`WorkflowError::DependenciesPending`] while a prerequisite sub-task
    /// is not done, [`WorkflowError::Routing`] when no builder qualifies,
    /// [`WorkflowError::Lock`] when a resource is held elsewhere, and
    /// lifecycle errors such as attempt exhaustion or a stale write.
    pub async fn plan(&self, task_id: TaskId) -> WorkflowResult<WorkflowOutcome> {
        let current = self.tasks.get(task_id).await?;
        ensure_phase(&current, WorkflowPhase::Plan)?;
        let prerequisites = self.prerequisites(&current).await?;

        let history = self.assignment_history().await?;
        let builder = self
            .router
            .select_builder(
                task_id,
                current.required_capabilities(),
                &history,
                current.preferred_builder(),
            )
            .await?;
        let builder_id = builder.id().clone();

        let clock = self.tasks.clock();
        let mut updated = current.clone();
        updated.transition(
            TaskState::Assigned,
            Actor::orchestrator(),
            format!("attempt routed to {builder_id}"),
            clock,
        )?;
        updated.assign_builder(builder_id.clone(), clock);
        updated.transition(
            TaskState::Running,
            Actor::worker(&builder_id),
            "builder hand-off issued",
            clock,
        )?;
        let brief = builder_brief(&updated, &builder_id, prerequisites);
        let handoff = render_builder_handoff(&brief, clock.utc())?;

        let secured = self.secure_leases(&current).await?;
        updated.update_checkpoint(clock, |checkpoint| {
            checkpoint.enter(WorkflowPhase::Build);
            checkpoint.set_held_leases(secured.held.clone());
            checkpoint.set_builder_artifact(None, Vec::new());
            checkpoint.set_handoff(Some(handoff.clone()));
        });
        if let Err(err) = self.tasks.commit(&current, &updated).await {
            self.release_leases(task_id, &secured.fresh).await;
            return Err(err.into());
        }

        info!(
            task_id = %task_id,
            builder = %builder_id,
            attempt = updated.attempt_count(),
            leases = secured.held.len(),
            "task suspended awaiting builder"
        );
        self.publish(task_id, &handoff).await;
        Ok(WorkflowOutcome::Suspended(TaskStatus::of(&updated)))
    }

    /// Applies a builder artifact to a task suspended in the build phase.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::ArtifactInvalid`] without changing anything
    /// when validation fails, [`WorkflowError::NotAwaiting`] when the task is
    /// not waiting on a builder, and [`WorkflowError::Routing`] when no
    /// reviewer distinct from the builder exists. In that last case the
    /// artifact is kept and the task waits in `VERIFYING` for a resume.
    pub async fn submit_builder_artifact(
        &self,
        task_id: TaskId,
        artifact: Artifact,
    ) -> WorkflowResult<WorkflowOutcome> {
        let current = self.tasks.get(task_id).await?;
        let builder = awaited_worker(&current, WorkerRole::Builder)?;
        let expectation = ArtifactExpectation {
            task_id,
            role: WorkerRole::Builder,
            worker_id: builder.clone(),
            declared_resources: current.resources().to_vec(),
            required_checks: current.required_checks().to_vec(),
        };
        let report = validate_builder_artifact(&artifact, &expectation)
            .map_err(|source| rejected(task_id, source))?;

        let clock = self.tasks.clock();
        let mut updated = current.clone();
        updated.transition(
            TaskState::Verifying,
            Actor::worker(&builder),
            "builder artifact accepted",
            clock,
        )?;
        let secured = self.secure_leases(&current).await?;
        updated.update_checkpoint(clock, |checkpoint| {
            checkpoint.enter(WorkflowPhase::Review);
            checkpoint.set_held_leases(secured.held.clone());
            checkpoint.set_builder_artifact(Some(artifact), report.gate_warnings.clone());
            checkpoint.set_handoff(None);
        });
        if let Err(err) = self.tasks.commit(&current, &updated).await {
            self.release_leases(task_id, &secured.fresh).await;
            return Err(err.into());
        }
        info!(
            task_id = %task_id,
            builder = %builder,
            changed = report.changed_resources.len(),
            gate_warnings = report.gate_warnings.len(),
            "builder artifact accepted"
        );

        self.route_reviewer(&updated).await
    }

    /// Applies a reviewer artifact to a task suspended in the review phase.
    ///
    /// `APPROVED` runs the merge and completes the task. `RETRY` starts the
    /// next attempt, or escalates once the attempt ceiling is reached.
    /// `ESCALATED` ends the cycle for human attention.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::ArtifactInvalid`] without changing anything
    /// when validation fails, [`WorkflowError::MergeFailed`] when the merge
    /// step fails, and any error raised while planning the next attempt.
    pub async fn submit_reviewer_artifact(
        &self,
        task_id: TaskId,
        artifact: &Artifact,
    ) -> WorkflowResult<WorkflowOutcome> {
        let current = self.tasks.get(task_id).await?;
        let reviewer = awaited_worker(&current, WorkerRole::Reviewer)?;
        let expectation = ArtifactExpectation {
            task_id,
            role: WorkerRole::Reviewer,
            worker_id: reviewer.clone(),
            declared_resources: Vec::new(),
            required_checks: Vec::new(),
        };
        let decision = validate_reviewer_artifact(artifact, &expectation)
            .map_err(|source| rejected(task_id, source))?;

        let exhausted = decision == ReviewDecision::Retry
            && current.attempt_count() >= current.max_attempts();
        let applied = if exhausted {
            ReviewDecision::Escalated
        } else {
            decision
        };
        let rationale = artifact.rationale().unwrap_or_default().trim().to_owned();

        let clock = self.tasks.clock();
        let mut updated = current.clone();
        let feedback = ReviewFeedback {
            attempt: current.attempt_count(),
            reviewer: reviewer.clone(),
            decision: applied,
            rationale: rationale.clone(),
            evidence: artifact.evidence().to_vec(),
            recorded_at: clock.utc(),
        };
        updated.update_checkpoint(clock, |checkpoint| {
            checkpoint.push_feedback(feedback);
            checkpoint.set_handoff(None);
        });
        info!(
            task_id = %task_id,
            reviewer = %reviewer,
            decision = %decision,
            applied = %applied,
            attempt = current.attempt_count(),
            "review decision received"
        );

        match applied {
            ReviewDecision::Approved => {
                updated.transition(
                    TaskState::Approved,
                    Actor::reviewer(&reviewer),
                    rationale,
                    clock,
                )?;
                updated.update_checkpoint(clock, |checkpoint| {
                    checkpoint.enter(WorkflowPhase::Decide);
                });
                self.tasks.commit(&current, &updated).await?;
                self.complete_merge(&updated).await
            }
            ReviewDecision::Retry => {
                updated.transition(TaskState::Retry, Actor::reviewer(&reviewer), rationale, clock)?;
                updated.update_checkpoint(clock, |checkpoint| {
                    checkpoint.enter(WorkflowPhase::Plan);
                    checkpoint.set_builder_artifact(None, Vec::new());
                });
                self.tasks.commit(&current, &updated).await?;
                self.plan(task_id).await
            }
            ReviewDecision::Escalated => {
                let reason = if exhausted {
                    format!(
                        "attempts exhausted after {} of {}; reviewer asked for a retry: {rationale}",
                        current.attempt_count(),
                        current.max_attempts()
                    )
                } else {
                    rationale
                };
                updated.transition(
                    TaskState::Escalated,
                    Actor::reviewer(&reviewer),
                    reason.clone(),
                    clock,
                )?;
                if exhausted {
                    updated.record_error(TaskError::new("attempts_exhausted", reason), clock);
                }
                self.finish(&current, updated).await
            }
        }
    }

    /// Cancels a non-terminal task, releasing its leases.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error when the task is already terminal.
    pub async fn cancel(
        &self,
        task_id: TaskId,
        actor: Actor,
        reason: &str,
    ) -> WorkflowResult<WorkflowOutcome> {
        let current = self.tasks.get(task_id).await?;
        let clock = self.tasks.clock();
        let mut updated = current.clone();
        updated.transition(TaskState::Failed, actor.clone(), reason, clock)?;
        updated.record_error(TaskError::new("cancelled", format!("{actor}: {reason}")), clock);
        self.finish(&current, updated).await
    }

    /// Continues a task from its stored checkpoint.
    ///
    /// A task in the plan phase is planned again, a verified task without a
    /// reviewer is routed again, an approved task retries its merge and a
    /// task waiting on a worker has its hand-off published again.
    ///
    /// # Errors
    ///
    /// Returns the error of whichever step is re-run.
    pub async fn resume(&self, task_id: TaskId) -> WorkflowResult<WorkflowOutcome> {
        let task = self.tasks.get(task_id).await?;
        let phase = task.checkpoint().phase();
        info!(task_id = %task_id, phase = %phase, state = %task.state(), "resuming task");
        match phase {
            WorkflowPhase::Plan => self.plan(task_id).await,
            WorkflowPhase::Review if task.reviewer_id().is_none() => {
                let refreshed = self.refresh_leases(&task).await?;
                self.route_reviewer(&refreshed).await
            }
            WorkflowPhase::Build | WorkflowPhase::Review => {
                let refreshed = self.refresh_leases(&task).await?;
                if let Some(handoff) = refreshed.checkpoint().handoff() {
                    self.publish(task_id, handoff).await;
                }
                Ok(WorkflowOutcome::Suspended(TaskStatus::of(&refreshed)))
            }
            WorkflowPhase::Decide => self.complete_merge(&task).await,
            WorkflowPhase::Finished => Ok(WorkflowOutcome::Terminal(TaskStatus::of(&task))),
        }
    }

    async fn route_reviewer(&self, task: &Task) -> WorkflowResult<WorkflowOutcome> {
        let task_id = task.id();
        let builder = task
            .builder_id()
            .cloned()
            .ok_or(WorkflowError::IncompleteCheckpoint {
                task_id,
                missing: "builder assignment",
            })?;
        let artifact = task
            .checkpoint()
            .builder_artifact()
            .cloned()
            .ok_or(WorkflowError::IncompleteCheckpoint {
                task_id,
                missing: "builder artifact",
            })?;

        let history = self.assignment_history().await?;
        let reviewer = match self
            .router
            .select_reviewer(
                task_id,
                task.required_capabilities(),
                &history,
                &builder,
                task.preferred_reviewer(),
            )
            .await
        {
            Ok(profile) => profile.id().clone(),
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "task parked awaiting a reviewer");
                return Err(err.into());
            }
        };

        let clock = self.tasks.clock();
        let mut updated = task.clone();
        updated.assign_reviewer(reviewer.clone(), clock)?;
        let brief = ReviewerBrief {
            task_id,
            attempt: updated.attempt_count(),
            reviewer: reviewer.clone(),
            builder,
            requirement: updated.requirement().to_owned(),
            done_criteria: updated.done_criteria().to_vec(),
            summary: artifact.summary().to_owned(),
            changed_resources: artifact.changed_resources().to_vec(),
            check_results: artifact.check_results().clone(),
            gate_warnings: updated.checkpoint().gate_warnings().to_vec(),
        };
        let handoff = render_reviewer_handoff(&brief, clock.utc())?;
        updated.update_checkpoint(clock, |checkpoint| {
            checkpoint.set_handoff(Some(handoff.clone()));
        });
        self.tasks.commit(task, &updated).await?;
        info!(task_id = %task_id, reviewer = %reviewer, "task suspended awaiting reviewer");
        self.publish(task_id, &handoff).await;
        Ok(WorkflowOutcome::Suspended(TaskStatus::of(&updated)))
    }

    /// Merges an approved task once its leases are confirmed current.
    ///
    /// When another task took over a resource, the merge is not attempted:
    /// the task stays approved with the lock failure recorded, and a later
    /// resume retries once the resource is free again.
    async fn complete_merge(&self, approved: &Task) -> WorkflowResult<WorkflowOutcome> {
        let task_id = approved.id();
        let request = merge_request(approved)?;
        let clock = self.tasks.clock();
        let confirmed = match self.refresh_leases(approved).await {
            Ok(task) => task,
            Err(err @ WorkflowError::Lock(_)) => {
                warn!(task_id = %task_id, error = %err, "lease lost before merge, task stays approved");
                let mut blocked = approved.clone();
                blocked.record_error(TaskError::new(err.kind().as_str(), err.to_string()), clock);
                self.tasks.commit(approved, &blocked).await?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let receipt = match self.merge.merge(&request).await {
            Ok(receipt) => receipt,
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "merge failed, task stays approved");
                let mut failed = confirmed.clone();
                failed.record_error(TaskError::new("merge_failed", err.reason.clone()), clock);
                self.tasks.commit(&confirmed, &failed).await?;
                return Err(WorkflowError::MergeFailed {
                    task_id,
                    reason: err.reason,
                });
            }
        };

        let mut updated = confirmed.clone();
        updated.transition(
            TaskState::Merged,
            Actor::orchestrator(),
            format!("merged as {}", receipt.reference),
            clock,
        )?;
        updated.transition(
            TaskState::Done,
            Actor::orchestrator(),
            "workflow complete",
            clock,
        )?;
        self.finish(&confirmed, updated).await
    }

    /// Closes the checkpoint of a task that reached a terminal state and
    /// releases everything it holds.
    async fn finish(&self, previous: &Task, mut updated: Task) -> WorkflowResult<WorkflowOutcome> {
        let clock = self.tasks.clock();
        let mut held = Vec::new();
        updated.update_checkpoint(clock, |checkpoint| {
            held = checkpoint.take_held_leases();
            checkpoint.enter(WorkflowPhase::Finished);
            checkpoint.set_handoff(None);
        });
        self.tasks.commit(previous, &updated).await?;
        self.release_leases(updated.id(), &held).await;
        self.sweep_leases(updated.id()).await;
        info!(
            task_id = %updated.id(),
            state = %updated.state(),
            attempt = updated.attempt_count(),
            "task finished"
        );
        if updated.state() == TaskState::Done {
            self.start_dependents(updated.id()).await;
        }
        Ok(WorkflowOutcome::Terminal(TaskStatus::of(&updated)))
    }

    /// Collects the sub-tasks `task` depends on.
    ///
    /// Fails with [`WorkflowError::DependenciesPending`] while any of them
    /// is not done.
    async fn prerequisites(&self, task: &Task) -> WorkflowResult<Vec<PrerequisiteSummary>> {
        let mut done = Vec::new();
        let mut pending = Vec::new();
        for &dependency in task.depends_on() {
            let prerequisite = self.tasks.get(dependency).await?;
            if prerequisite.state() != TaskState::Done {
                pending.push(dependency);
                continue;
            }
            let artifact = prerequisite.checkpoint().builder_artifact();
            done.push(PrerequisiteSummary {
                key: prerequisite
                    .sub_task()
                    .map(|link| link.key.clone())
                    .unwrap_or_default(),
                summary: artifact
                    .map(|built| built.summary().to_owned())
                    .unwrap_or_default(),
                changed_resources: artifact
                    .map(|built| built.changed_resources().to_vec())
                    .unwrap_or_default(),
            });
        }
        if pending.is_empty() {
            Ok(done)
        } else {
            Err(WorkflowError::DependenciesPending {
                task_id: task.id(),
                pending,
            })
        }
    }

    /// Plans the queued sub-tasks that were waiting on `finished`.
    ///
    /// A dependent that still waits on another prerequisite, or cannot be
    /// planned yet, stays queued for a later completion or operator resume.
    async fn start_dependents(&self, finished: TaskId) {
        let tasks = match self.tasks.list().await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(task_id = %finished, error = %err, "dependent sub-tasks not checked");
                return;
            }
        };
        let dependents = tasks.iter().filter(|task| {
            task.state() == TaskState::Queued && task.depends_on().contains(&finished)
        });
        for dependent in dependents {
            match self.plan(dependent.id()).await {
                Ok(_) => info!(
                    task_id = %dependent.id(),
                    prerequisite = %finished,
                    "dependent sub-task planned"
                ),
                Err(WorkflowError::DependenciesPending { pending, .. }) => debug!(
                    task_id = %dependent.id(),
                    pending = pending.len(),
                    "dependent sub-task still waiting"
                ),
                Err(err) => warn!(
                    task_id = %dependent.id(),
                    error = %err,
                    "dependent sub-task stays queued"
                ),
            }
        }
    }

    /// Renews every lease the task needs under its checkpointed tokens,
    /// re-acquiring any that lapsed while the resource stayed free, and
    /// commits the confirmed set.
    ///
    /// Fails with [`WorkflowError::Lock`], leaving the task unchanged, when
    /// another task now holds one of the resources.
    async fn refresh_leases(&self, task: &Task) -> WorkflowResult<Task> {
        if task.resources().is_empty() {
            return Ok(task.clone());
        }
        let secured = self.secure_leases(task).await?;
        let mut refreshed = task.clone();
        refreshed.update_checkpoint(self.tasks.clock(), |checkpoint| {
            checkpoint.set_held_leases(secured.held.clone());
        });
        if let Err(err) = self.tasks.commit(task, &refreshed).await {
            self.release_leases(task.id(), &secured.fresh).await;
            return Err(err.into());
        }
        Ok(refreshed)
    }

    async fn secure_leases(&self, task: &Task) -> WorkflowResult<SecuredLeases> {
        let mut secured = SecuredLeases::default();
        for resource in task.resources() {
            match self.secure_lease(task, resource).await {
                Ok((lease, fresh)) => {
                    let held = HeldLease::from(&lease);
                    if fresh {
                        secured.fresh.push(held.clone());
                    }
                    secured.held.push(held);
                }
                Err(err) => {
                    warn!(task_id = %task.id(), resource = %resource, error = %err, "lease unavailable");
                    self.release_leases(task.id(), &secured.fresh).await;
                    return Err(err.into());
                }
            }
        }
        Ok(secured)
    }

    /// Renews the lease recorded in the checkpoint, or acquires a new one
    /// when none is recorded or the recorded one lapsed.
    async fn secure_lease(&self, task: &Task, resource: &ResourcePath) -> LockResult<(Lease, bool)> {
        if let Some(held) = task.checkpoint().lease_for(resource) {
            match self
                .locks
                .renew(task.id(), resource, self.lease_ttl, held.token)
                .await
            {
                Ok(lease) => return Ok((lease, false)),
                Err(LockError::LockExpired(_) | LockError::TokenMismatch(_)) => {}
                Err(err) => return Err(err),
            }
        }
        self.locks
            .acquire(task.id(), resource, self.lease_ttl)
            .await
            .map(|lease| (lease, true))
    }

    async fn release_leases(&self, task_id: TaskId, leases: &[HeldLease]) {
        for held in leases {
            if let Err(err) = self.locks.release(task_id, &held.resource, held.token).await {
                warn!(task_id = %task_id, resource = %held.resource, error = %err, "lease release failed");
            }
        }
    }

    /// Releases leases the task holds but the checkpoint never recorded,
    /// such as those left by a crash between acquisition and commit.
    async fn sweep_leases(&self, task_id: TaskId) {
        let leftovers = match self.locks.held_by(task_id).await {
            Ok(leases) => leases,
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "lease sweep failed");
                return;
            }
        };
        let held: Vec<HeldLease> = leftovers.iter().map(HeldLease::from).collect();
        self.release_leases(task_id, &held).await;
    }

    async fn publish(&self, task_id: TaskId, handoff: &HandoffDocument) {
        let Some(publisher) = self.publisher.as_ref() else {
            return;
        };
        if let Err(err) = publisher.publish(task_id, handoff).await {
            warn!(task_id = %task_id, error = %err, "hand-off delivery failed; checkpoint keeps it");
        }
    }

    /// Rebuilds assignment recency and in-flight load from stored tasks.
    async fn assignment_history(&self) -> WorkflowResult<AssignmentHistory> {
        let mut history = AssignmentHistory::new();
        for task in self.tasks.list().await? {
            for assignment in task.assignments() {
                history.record_assignment(&assignment.worker, assignment.assigned_at);
            }
            if task.state().is_terminal() {
                continue;
            }
            if let Some((_, worker)) = task.awaiting() {
                history.record_active(worker);
            }
        }
        Ok(history)
    }
}

fn ensure_phase(task: &Task, expected: WorkflowPhase) -> WorkflowResult<()> {
    let actual = task.checkpoint().phase();
    if actual == expected {
        Ok(())
    } else {
        Err(WorkflowError::WrongPhase {
            task_id: task.id(),
            expected,
            actual,
        })
    }
}

fn awaited_worker(task: &Task, role: WorkerRole) -> WorkflowResult<WorkerId> {
    match task.awaiting() {
        Some((awaited, worker)) if awaited == role => Ok(worker.clone()),
        _ => Err(WorkflowError::NotAwaiting {
            task_id: task.id(),
            role,
            phase: task.checkpoint().phase(),
        }),
    }
}

fn rejected(task_id: TaskId, source: ArtifactValidationError) -> WorkflowError {
    warn!(task_id = %task_id, field = %source.field(), error = %source, "artifact rejected");
    WorkflowError::ArtifactInvalid { task_id, source }
}

fn builder_brief(
    task: &Task,
    builder: &WorkerId,
    prerequisites: Vec<PrerequisiteSummary>,
) -> BuilderBrief {
    BuilderBrief {
        task_id: task.id(),
        attempt: task.attempt_count(),
        max_attempts: task.max_attempts(),
        builder: builder.clone(),
        requirement: task.requirement().to_owned(),
        done_criteria: task.done_criteria().to_vec(),
        required_checks: task.required_checks().to_vec(),
        resources: task.resources().to_vec(),
        prior_feedback: task
            .checkpoint()
            .feedback()
            .iter()
            .map(|feedback| PriorFeedback {
                attempt: feedback.attempt,
                reviewer: feedback.reviewer.clone(),
                decision: feedback.decision,
                rationale: feedback.rationale.clone(),
                evidence: feedback.evidence.clone(),
            })
            .collect(),
        prerequisites,
    }
}

fn merge_request(task: &Task) -> WorkflowResult<MergeRequest> {
    let missing = |what| WorkflowError::IncompleteCheckpoint {
        task_id: task.id(),
        missing: what,
    };
    let builder = task.builder_id().cloned().ok_or_else(|| missing("builder assignment"))?;
    let reviewer = task
        .reviewer_id()
        .cloned()
        .ok_or_else(|| missing("reviewer assignment"))?;
    let artifact = task
        .checkpoint()
        .builder_artifact()
        .ok_or_else(|| missing("builder artifact"))?;
    let changed_resources = artifact
        .changed_resources()
        .iter()
        .filter_map(|path| ResourcePath::new(path.as_str()).ok())
        .collect();
    Ok(MergeRequest {
        task_id: task.id(),
        attempt: task.attempt_count(),
        builder,
        reviewer,
        summary: artifact.summary().to_owned(),
        changed_resources,
    })
}
