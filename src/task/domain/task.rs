//! Task aggregate root and its audit records.

use super::{
    Actor, Checkpoint, SubTaskLink, TaskDomainError, TaskId, TaskState, TaskVersion,
    WorkflowPhase,
};
use crate::lock::domain::ResourcePath;
use crate::routing::domain::{CapabilitySet, WorkerId, WorkerRole};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Immutable audit entry appended on every successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before the transition.
    pub from: TaskState,
    /// State after the transition.
    pub to: TaskState,
    /// Who requested the transition.
    pub actor: Actor,
    /// Why the transition happened.
    pub reason: String,
    /// Attempt number after the transition.
    pub attempt: u32,
    /// When the transition happened.
    pub at: DateTime<Utc>,
}

/// Machine-readable failure recorded on the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Stable snake_case error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl TaskError {
    /// Creates a task error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Append-only log entry of one worker assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// Assigned worker.
    pub worker: WorkerId,
    /// Role the worker fills.
    pub role: WorkerRole,
    /// Attempt the assignment belongs to.
    pub attempt: u32,
    /// When the assignment was made.
    pub assigned_at: DateTime<Utc>,
}

/// Validated description of the work a task asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    requirement: String,
    required_capabilities: CapabilitySet,
    resources: Vec<ResourcePath>,
    required_checks: Vec<String>,
    done_criteria: Vec<String>,
    max_attempts: u32,
    preferred_builder: Option<WorkerId>,
    preferred_reviewer: Option<WorkerId>,
    sub_task: Option<SubTaskLink>,
}

impl TaskSpec {
    /// Creates a task description.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyRequirement`] for a blank requirement
    /// or [`TaskDomainError::ZeroMaxAttempts`] for a zero ceiling.
    pub fn new(
        requirement: impl Into<String>,
        required_capabilities: CapabilitySet,
        max_attempts: u32,
    ) -> Result<Self, TaskDomainError> {
        let raw = requirement.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyRequirement);
        }
        if max_attempts == 0 {
            return Err(TaskDomainError::ZeroMaxAttempts);
        }
        Ok(Self {
            requirement: trimmed.to_owned(),
            required_capabilities,
            resources: Vec::new(),
            required_checks: Vec::new(),
            done_criteria: Vec::new(),
            max_attempts,
            preferred_builder: None,
            preferred_reviewer: None,
            sub_task: None,
        })
    }

    /// Sets the resources the task will change, dropping duplicates.
    #[must_use]
    pub fn with_resources(mut self, resources: impl IntoIterator<Item = ResourcePath>) -> Self {
        let mut unique: Vec<ResourcePath> = Vec::new();
        for resource in resources {
            if !unique.contains(&resource) {
                unique.push(resource);
            }
        }
        self.resources = unique;
        self
    }

    /// Sets the checks every builder artifact must report.
    #[must_use]
    pub fn with_required_checks(mut self, checks: impl IntoIterator<Item = String>) -> Self {
        self.required_checks = normalized_lines(checks);
        self
    }

    /// Sets the completion criteria embedded in hand-offs.
    #[must_use]
    pub fn with_done_criteria(mut self, criteria: impl IntoIterator<Item = String>) -> Self {
        self.done_criteria = normalized_lines(criteria);
        self
    }

    /// Pins the builder and reviewer an operator chose for every attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ReviewerIsBuilder`] when both name the
    /// same worker.
    pub fn with_preferred_workers(
        mut self,
        builder: Option<WorkerId>,
        reviewer: Option<WorkerId>,
    ) -> Result<Self, TaskDomainError> {
        if let (Some(chosen_builder), Some(chosen_reviewer)) = (&builder, &reviewer)
            && chosen_builder == chosen_reviewer
        {
            return Err(TaskDomainError::ReviewerIsBuilder(chosen_reviewer.clone()));
        }
        self.preferred_builder = builder;
        self.preferred_reviewer = reviewer;
        Ok(self)
    }

    /// Makes the task a sub-task of a decomposition.
    #[must_use]
    pub fn with_sub_task(mut self, link: SubTaskLink) -> Self {
        self.sub_task = Some(link);
        self
    }
}

fn normalized_lines(lines: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !result.iter().any(|seen| seen == trimmed) {
            result.push(trimmed.to_owned());
        }
    }
    result
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    requirement: String,
    required_capabilities: CapabilitySet,
    resources: Vec<ResourcePath>,
    required_checks: Vec<String>,
    done_criteria: Vec<String>,
    state: TaskState,
    attempt_count: u32,
    max_attempts: u32,
    builder_id: Option<WorkerId>,
    reviewer_id: Option<WorkerId>,
    version: TaskVersion,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_error: Option<TaskError>,
    history: Vec<TransitionRecord>,
    assignments: Vec<AssignmentRecord>,
    checkpoint: Checkpoint,
    #[serde(default)]
    preferred_builder: Option<WorkerId>,
    #[serde(default)]
    preferred_reviewer: Option<WorkerId>,
    #[serde(default)]
    sub_task: Option<SubTaskLink>,
}

impl Task {
    /// Creates a queued task on its first attempt.
    #[must_use]
    pub fn new(spec: TaskSpec, clock: &impl Clock) -> Self {
        Self::new_with_id(TaskId::new(), spec, clock)
    }

    /// Creates a queued task under an identifier chosen by the caller, so
    /// sibling sub-tasks can reference each other before they are stored.
    #[must_use]
    pub fn new_with_id(id: TaskId, spec: TaskSpec, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id,
            requirement: spec.requirement,
            required_capabilities: spec.required_capabilities,
            resources: spec.resources,
            required_checks: spec.required_checks,
            done_criteria: spec.done_criteria,
            state: TaskState::Queued,
            attempt_count: 1,
            max_attempts: spec.max_attempts,
            builder_id: None,
            reviewer_id: None,
            version: TaskVersion::INITIAL,
            created_at: timestamp,
            updated_at: timestamp,
            last_error: None,
            history: Vec::new(),
            assignments: Vec::new(),
            checkpoint: Checkpoint::new(),
            preferred_builder: spec.preferred_builder,
            preferred_reviewer: spec.preferred_reviewer,
            sub_task: spec.sub_task,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the requirement text.
    #[must_use]
    pub fn requirement(&self) -> &str {
        &self.requirement
    }

    /// Returns the capabilities a worker needs.
    #[must_use]
    pub const fn required_capabilities(&self) -> &CapabilitySet {
        &self.required_capabilities
    }

    /// Returns the resources the task declared it will change.
    #[must_use]
    pub fn resources(&self) -> &[ResourcePath] {
        &self.resources
    }

    /// Returns the checks every builder artifact must report.
    #[must_use]
    pub fn required_checks(&self) -> &[String] {
        &self.required_checks
    }

    /// Returns the completion criteria.
    #[must_use]
    pub fn done_criteria(&self) -> &[String] {
        &self.done_criteria
    }

    /// Returns the builder an operator pinned, if any.
    #[must_use]
    pub const fn preferred_builder(&self) -> Option<&WorkerId> {
        self.preferred_builder.as_ref()
    }

    /// Returns the reviewer an operator pinned, if any.
    #[must_use]
    pub const fn preferred_reviewer(&self) -> Option<&WorkerId> {
        self.preferred_reviewer.as_ref()
    }

    /// Returns the decomposition the task belongs to, if any.
    #[must_use]
    pub const fn sub_task(&self) -> Option<&SubTaskLink> {
        self.sub_task.as_ref()
    }

    /// Returns the sibling tasks that must be done before this one.
    #[must_use]
    pub fn depends_on(&self) -> &[TaskId] {
        self.sub_task
            .as_ref()
            .map_or(&[][..], |link| link.depends_on.as_slice())
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Returns the current attempt number, starting at 1.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Returns the attempt ceiling.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the builder of the current attempt.
    #[must_use]
    pub const fn builder_id(&self) -> Option<&WorkerId> {
        self.builder_id.as_ref()
    }

    /// Returns the reviewer of the current attempt.
    #[must_use]
    pub const fn reviewer_id(&self) -> Option<&WorkerId> {
        self.reviewer_id.as_ref()
    }

    /// Returns the optimistic version token.
    #[must_use]
    pub const fn version(&self) -> TaskVersion {
        self.version
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the last recorded failure.
    #[must_use]
    pub const fn last_error(&self) -> Option<&TaskError> {
        self.last_error.as_ref()
    }

    /// Returns the ordered transition history.
    #[must_use]
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Returns every worker assignment made for this task.
    #[must_use]
    pub fn assignments(&self) -> &[AssignmentRecord] {
        &self.assignments
    }

    /// Returns the workflow checkpoint.
    #[must_use]
    pub const fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Returns the role and worker the suspended cycle is waiting on.
    #[must_use]
    pub fn awaiting(&self) -> Option<(WorkerRole, &WorkerId)> {
        match self.checkpoint.phase() {
            WorkflowPhase::Build => self
                .builder_id
                .as_ref()
                .map(|builder| (WorkerRole::Builder, builder)),
            WorkflowPhase::Review => self
                .reviewer_id
                .as_ref()
                .map(|reviewer| (WorkerRole::Reviewer, reviewer)),
            WorkflowPhase::Plan | WorkflowPhase::Decide | WorkflowPhase::Finished => None,
        }
    }

    /// Applies a lifecycle transition and returns the appended record.
    ///
    /// Leaving `RETRY` for `ASSIGNED` starts the next attempt. A rejected
    /// transition leaves the task untouched, version included.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] when the edge is not in
    /// the table, [`TaskDomainError::UnauthorizedActor`] when the actor's
    /// role may not take it, or [`TaskDomainError::AttemptsExhausted`] when
    /// a retry would pass the attempt ceiling.
    pub fn transition(
        &mut self,
        to: TaskState,
        actor: Actor,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<TransitionRecord, TaskDomainError> {
        let from = self.state;
        let guard = from
            .guard_for(to)
            .ok_or(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from,
                to,
            })?;
        if !guard.permits(actor.role()) {
            return Err(TaskDomainError::UnauthorizedActor {
                task_id: self.id,
                from,
                to,
                role: actor.role(),
            });
        }

        let starts_new_attempt = from == TaskState::Retry && to == TaskState::Assigned;
        if starts_new_attempt && self.attempt_count >= self.max_attempts {
            return Err(TaskDomainError::AttemptsExhausted {
                task_id: self.id,
                max_attempts: self.max_attempts,
            });
        }

        if starts_new_attempt {
            self.attempt_count = self.attempt_count.saturating_add(1);
        }
        self.state = to;
        self.touch(clock);
        let record = TransitionRecord {
            from,
            to,
            actor,
            reason: reason.into(),
            attempt: self.attempt_count,
            at: self.updated_at,
        };
        self.history.push(record.clone());
        Ok(record)
    }

    /// Assigns the builder for the current attempt and clears any reviewer.
    pub fn assign_builder(&mut self, builder: WorkerId, clock: &impl Clock) {
        self.touch(clock);
        self.assignments.push(AssignmentRecord {
            worker: builder.clone(),
            role: WorkerRole::Builder,
            attempt: self.attempt_count,
            assigned_at: self.updated_at,
        });
        self.builder_id = Some(builder);
        self.reviewer_id = None;
    }

    /// Assigns the reviewer for the current attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ReviewerIsBuilder`] when `reviewer` built
    /// the change under review.
    pub fn assign_reviewer(
        &mut self,
        reviewer: WorkerId,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if self.builder_id.as_ref() == Some(&reviewer) {
            return Err(TaskDomainError::ReviewerIsBuilder(reviewer));
        }
        self.touch(clock);
        self.assignments.push(AssignmentRecord {
            worker: reviewer.clone(),
            role: WorkerRole::Reviewer,
            attempt: self.attempt_count,
            assigned_at: self.updated_at,
        });
        self.reviewer_id = Some(reviewer);
        Ok(())
    }

    /// Applies `update` to the checkpoint.
    pub fn update_checkpoint(&mut self, clock: &impl Clock, update: impl FnOnce(&mut Checkpoint)) {
        update(&mut self.checkpoint);
        self.touch(clock);
    }

    /// Records a failure on the task.
    pub fn record_error(&mut self, error: TaskError, clock: &impl Clock) {
        self.last_error = Some(error);
        self.touch(clock);
    }

    /// Bumps the version and the `updated_at` timestamp.
    fn touch(&mut self, clock: &impl Clock) {
        self.version = self.version.next();
        self.updated_at = clock.utc();
    }
}
