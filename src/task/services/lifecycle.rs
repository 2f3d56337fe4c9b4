//! Service layer for task creation, lookup and validated transitions.

use super::TaskEvent;
use crate::lock::domain::{LockDomainError, ResourcePath};
use crate::routing::domain::{CapabilitySet, RoutingDomainError, WorkerId};
use crate::task::{
    domain::{
        Actor, DecompositionError, DecompositionId, SubTaskLink, Task, TaskDomainError, TaskId,
        TaskSpec, TaskState, TaskVersion, dependency_order,
    },
    ports::{TaskRepository, TaskRepositoryError},
};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

const EVENT_CAPACITY: usize = 256;

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    requirement: String,
    required_capabilities: Vec<String>,
    resources: Vec<String>,
    required_checks: Vec<String>,
    done_criteria: Vec<String>,
    max_attempts: u32,
    preferred_builder: Option<String>,
    preferred_reviewer: Option<String>,
}

impl CreateTaskRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(
        requirement: impl Into<String>,
        required_capabilities: impl IntoIterator<Item = String>,
        max_attempts: u32,
    ) -> Self {
        Self {
            requirement: requirement.into(),
            required_capabilities: required_capabilities.into_iter().collect(),
            resources: Vec::new(),
            required_checks: Vec::new(),
            done_criteria: Vec::new(),
            max_attempts,
            preferred_builder: None,
            preferred_reviewer: None,
        }
    }

    /// Sets the resources the task will change.
    #[must_use]
    pub fn with_resources(mut self, resources: impl IntoIterator<Item = String>) -> Self {
        self.resources = resources.into_iter().collect();
        self
    }

    /// Sets the checks builders must report.
    #[must_use]
    pub fn with_required_checks(mut self, checks: impl IntoIterator<Item = String>) -> Self {
        self.required_checks = checks.into_iter().collect();
        self
    }

    /// Sets the completion criteria.
    #[must_use]
    pub fn with_done_criteria(mut self, criteria: impl IntoIterator<Item = String>) -> Self {
        self.done_criteria = criteria.into_iter().collect();
        self
    }

    /// Pins the builder and reviewer for every attempt.
    #[must_use]
    pub fn with_preferred_workers(
        mut self,
        builder: Option<String>,
        reviewer: Option<String>,
    ) -> Self {
        self.preferred_builder = builder;
        self.preferred_reviewer = reviewer;
        self
    }
}

/// Request payload for one sub-task of a decomposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubTaskRequest {
    key: String,
    request: CreateTaskRequest,
    depends_on: Vec<String>,
}

impl CreateSubTaskRequest {
    /// Creates a sub-task named `key` within its decomposition.
    #[must_use]
    pub fn new(key: impl Into<String>, request: CreateTaskRequest) -> Self {
        Self {
            key: key.into(),
            request,
            depends_on: Vec::new(),
        }
    }

    /// Names the sibling sub-tasks that must be done first.
    #[must_use]
    pub fn with_dependencies(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.depends_on = keys.into_iter().collect();
        self
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Lifecycle rules rejected the request.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// A capability or worker identifier was malformed.
    #[error(transparent)]
    Capability(#[from] RoutingDomainError),
    /// Sub-task keys or dependencies were inconsistent.
    #[error(transparent)]
    Decomposition(#[from] DecompositionError),
    /// A declared resource was malformed.
    #[error(transparent)]
    Resource(#[from] LockDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
#[derive(Clone)]
pub struct TaskLifecycleService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    events: broadcast::Sender<TaskEvent>,
}

impl<R, C> TaskLifecycleService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            repository,
            clock,
            events,
        }
    }

    /// Subscribes to committed task events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Returns the clock used to stamp task mutations.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Validates and stores a new queued task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError`] when input validation fails or the
    /// repository rejects persistence.
    pub async fn create(&self, request: CreateTaskRequest) -> TaskLifecycleResult<Task> {
        let task = Task::new(spec_for(request)?, &*self.clock);
        self.store_new(&task).await?;
        Ok(task)
    }

    /// Validates and stores the sub-tasks of one decomposition, returned in
    /// dependency order.
    ///
    /// Every sub-task is validated before any is stored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Decomposition`] for blank, repeated or
    /// unknown keys and dependency cycles, the errors of
    /// [`TaskLifecycleService::create`] for a malformed sub-task, and
    /// repository errors.
    pub async fn create_decomposition(
        &self,
        parts: Vec<CreateSubTaskRequest>,
    ) -> TaskLifecycleResult<(DecompositionId, Vec<Task>)> {
        let edges: Vec<(String, Vec<String>)> = parts
            .iter()
            .map(|part| (part.key.clone(), part.depends_on.clone()))
            .collect();
        let order = dependency_order(&edges)?;
        let ids: BTreeMap<String, TaskId> = parts
            .iter()
            .map(|part| (part.key.clone(), TaskId::new()))
            .collect();

        let mut ordered: Vec<(usize, CreateSubTaskRequest)> = parts
            .into_iter()
            .enumerate()
            .map(|(index, part)| {
                let position = order.iter().position(|&at| at == index).unwrap_or(index);
                (position, part)
            })
            .collect();
        ordered.sort_by_key(|(position, _)| *position);

        let decomposition = DecompositionId::new();
        let mut tasks = Vec::with_capacity(ordered.len());
        for (position, part) in ordered {
            let id = ids.get(&part.key).copied().unwrap_or_default();
            let depends_on = part
                .depends_on
                .iter()
                .filter_map(|key| ids.get(key).copied())
                .collect();
            let link = SubTaskLink {
                decomposition,
                key: part.key,
                position,
                depends_on,
            };
            let spec = spec_for(part.request)?.with_sub_task(link);
            tasks.push(Task::new_with_id(id, spec, &*self.clock));
        }
        for task in &tasks {
            self.store_new(task).await?;
        }
        info!(
            decomposition = %decomposition,
            sub_tasks = tasks.len(),
            "requirement decomposed"
        );
        Ok((decomposition, tasks))
    }

    async fn store_new(&self, task: &Task) -> TaskLifecycleResult<()> {
        self.repository.store(task).await?;
        info!(task_id = %task.id(), requirement = %task.requirement(), "task queued");
        self.publish(TaskEvent::Created {
            task_id: task.id(),
            version: task.version(),
        });
        Ok(())
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] (wrapped) when the task does
    /// not exist, or a repository error when lookup fails.
    pub async fn get(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::Repository(TaskRepositoryError::NotFound(
                task_id,
            )))
    }

    /// Returns all tasks ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when listing fails.
    pub async fn list(&self) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.list().await?)
    }

    /// Transitions a task the caller last read at `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError`] variants for edges or actors the table
    /// rejects, and [`TaskRepositoryError::StaleTask`] when the stored
    /// version no longer equals `expected`. Either way nothing is written.
    pub async fn transition(
        &self,
        task_id: TaskId,
        expected: TaskVersion,
        to: TaskState,
        actor: Actor,
        reason: &str,
    ) -> TaskLifecycleResult<Task> {
        let current = self.get(task_id).await?;
        if current.version() != expected {
            return Err(TaskRepositoryError::StaleTask {
                task_id,
                expected,
                actual: current.version(),
            }
            .into());
        }
        let mut updated = current.clone();
        updated.transition(to, actor, reason, &*self.clock)?;
        self.commit(&current, &updated).await?;
        Ok(updated)
    }

    /// Persists `updated` over `previous` with compare-and-swap and
    /// publishes an event for each transition it added.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::StaleTask`] when the stored version
    /// moved on since `previous` was read.
    pub async fn commit(&self, previous: &Task, updated: &Task) -> TaskLifecycleResult<()> {
        self.repository.update(updated, previous.version()).await?;
        for record in updated.history().iter().skip(previous.history().len()) {
            info!(
                task_id = %updated.id(),
                from = %record.from,
                to = %record.to,
                actor = %record.actor,
                attempt = record.attempt,
                reason = %record.reason,
                "task transitioned"
            );
            self.publish(TaskEvent::StateChanged {
                task_id: updated.id(),
                from: record.from,
                to: record.to,
                actor: record.actor.clone(),
                attempt: record.attempt,
                version: updated.version(),
            });
        }
        Ok(())
    }

    fn publish(&self, event: TaskEvent) {
        // Sending fails only when nobody is subscribed.
        self.events.send(event).ok();
    }
}

fn spec_for(request: CreateTaskRequest) -> TaskLifecycleResult<TaskSpec> {
    let capabilities = CapabilitySet::parse(&request.required_capabilities)?;
    let resources = request
        .resources
        .into_iter()
        .map(ResourcePath::new)
        .collect::<Result<Vec<_>, _>>()?;
    let builder = request.preferred_builder.map(WorkerId::new).transpose()?;
    let reviewer = request.preferred_reviewer.map(WorkerId::new).transpose()?;
    Ok(
        TaskSpec::new(request.requirement, capabilities, request.max_attempts)?
            .with_resources(resources)
            .with_required_checks(request.required_checks)
            .with_done_criteria(request.done_criteria)
            .with_preferred_workers(builder, reviewer)?,
    )
}
