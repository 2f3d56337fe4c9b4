//! Orchestrator facade.

use crate::artifact::Artifact;
use crate::config::{ConfigError, OrchestratorConfig};
use crate::lock::adapters::filesystem::FsLeaseStore;
use crate::lock::adapters::memory::InMemoryLeaseStore;
use crate::lock::domain::Lease;
use crate::lock::ports::LeaseStore;
use crate::lock::services::LockManager;
use crate::orchestrator::{OrchestratorError, OrchestratorResult};
use crate::routing::adapters::memory::InMemoryWorkerRegistry;
use crate::routing::domain::{CapabilitySet, RoutingDomainError, WorkerId, WorkerRole};
use crate::routing::ports::WorkerRegistry;
use crate::routing::services::CapabilityRouter;
use crate::task::adapters::filesystem::FsTaskRepository;
use crate::task::adapters::memory::InMemoryTaskRepository;
use crate::task::domain::{
    Actor, DecompositionId, DecompositionReport, Task, TaskId, TaskVersion,
};
use crate::task::ports::TaskRepository;
use crate::task::services::{
    CreateSubTaskRequest, CreateTaskRequest, TaskEvent, TaskLifecycleError, TaskLifecycleService,
};
use crate::workflow::adapters::workspace::FsWorkspace;
use crate::workflow::ports::MergeGateway;
use crate::workflow::{TaskStatus, WorkflowEngine, WorkflowError, WorkflowOutcome};
use mockable::Clock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Directory below the state directory that holds the worker workspace.
pub const WORKSPACE_DIR: &str = "workspace";

/// Orchestrator backed by in-memory stores.
pub type InMemoryOrchestrator<C> =
    Orchestrator<InMemoryTaskRepository, InMemoryLeaseStore, InMemoryWorkerRegistry, C>;

/// Orchestrator backed by the filesystem stores under the state directory.
pub type FsOrchestrator<C> = Orchestrator<FsTaskRepository, FsLeaseStore, InMemoryWorkerRegistry, C>;

/// Request to submit a new unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTaskRequest {
    requirement: String,
    required_capabilities: Vec<String>,
    resources: Vec<String>,
    required_checks: Option<Vec<String>>,
    done_criteria: Vec<String>,
    max_attempts: Option<u32>,
    builder: Option<String>,
    reviewer: Option<String>,
}

impl SubmitTaskRequest {
    /// Creates a request for `requirement` routable to workers holding
    /// every one of `capabilities`.
    #[must_use]
    pub fn new(
        requirement: impl Into<String>,
        capabilities: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            requirement: requirement.into(),
            required_capabilities: capabilities.into_iter().map(Into::into).collect(),
            resources: Vec::new(),
            required_checks: None,
            done_criteria: Vec::new(),
            max_attempts: None,
            builder: None,
            reviewer: None,
        }
    }

    /// Declares the resources the task will change.
    #[must_use]
    pub fn with_resources(mut self, resources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the configured default required checks.
    #[must_use]
    pub fn with_required_checks(mut self, checks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_checks = Some(checks.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the completion criteria given to workers.
    #[must_use]
    pub fn with_done_criteria(mut self, criteria: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.done_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the configured attempt ceiling.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Pins the builder of every attempt, bypassing automatic routing.
    #[must_use]
    pub fn with_builder(mut self, worker: impl Into<String>) -> Self {
        self.builder = Some(worker.into());
        self
    }

    /// Pins the reviewer of every attempt, bypassing automatic routing.
    #[must_use]
    pub fn with_reviewer(mut self, worker: impl Into<String>) -> Self {
        self.reviewer = Some(worker.into());
        self
    }
}

/// One sub-task of a requirement split into dependent parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTaskRequest {
    key: String,
    request: SubmitTaskRequest,
    depends_on: Vec<String>,
}

impl SubTaskRequest {
    /// Creates a sub-task named `key`, such as `auth-login`.
    #[must_use]
    pub fn new(key: impl Into<String>, request: SubmitTaskRequest) -> Self {
        Self {
            key: key.into().trim().to_owned(),
            request,
            depends_on: Vec::new(),
        }
    }

    /// Names the sibling sub-tasks that must be done first.
    #[must_use]
    pub fn after(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = keys
            .into_iter()
            .map(|key| key.into().trim().to_owned())
            .collect();
        self
    }
}

/// Single entry point for submitting tasks and artifacts.
pub struct Orchestrator<T, L, W, C>
where
    T: TaskRepository,
    L: LeaseStore,
    W: WorkerRegistry,
    C: Clock + Send + Sync,
{
    engine: WorkflowEngine<T, L, W, C>,
    workspace: Option<FsWorkspace>,
    max_attempts: u32,
    default_required_checks: Vec<String>,
}

impl<C> InMemoryOrchestrator<C>
where
    C: Clock + Send + Sync,
{
    /// Builds an orchestrator over in-memory stores with the workers listed
    /// in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] when `config` is invalid.
    pub fn in_memory(
        config: &OrchestratorConfig,
        clock: Arc<C>,
        merge: Arc<dyn MergeGateway>,
    ) -> OrchestratorResult<Self> {
        config.validate()?;
        let engine = WorkflowEngine::new(
            TaskLifecycleService::new(Arc::new(InMemoryTaskRepository::new()), Arc::clone(&clock)),
            LockManager::new(Arc::new(InMemoryLeaseStore::new()), clock),
            CapabilityRouter::new(Arc::new(InMemoryWorkerRegistry::from_profiles(
                config.workers.clone(),
            )))
            .with_defaults(config.default_builder.clone(), config.default_reviewer.clone()),
            merge,
            config.lease_ttl().map_err(ConfigError::from)?,
        );
        Ok(Self::new(engine, config))
    }
}

impl<C> FsOrchestrator<C>
where
    C: Clock + Send + Sync,
{
    /// Opens the filesystem stores and workspace under `config.state_dir`.
    ///
    /// Tasks and leases written by an earlier process are picked up as they
    /// were left; call [`Orchestrator::resume`] to continue a task.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] when `config` is invalid and
    /// [`OrchestratorError::Storage`] when the directories cannot be opened.
    pub fn open(
        config: &OrchestratorConfig,
        clock: Arc<C>,
        merge: Arc<dyn MergeGateway>,
    ) -> OrchestratorResult<Self> {
        config.validate()?;
        let workspace = FsWorkspace::open(&config.state_dir.join(WORKSPACE_DIR))
            .map_err(OrchestratorError::Storage)?;
        let engine = WorkflowEngine::new(
            TaskLifecycleService::new(
                Arc::new(FsTaskRepository::open(&config.state_dir)?),
                Arc::clone(&clock),
            ),
            LockManager::new(Arc::new(FsLeaseStore::open(&config.state_dir)?), clock),
            CapabilityRouter::new(Arc::new(InMemoryWorkerRegistry::from_profiles(
                config.workers.clone(),
            )))
            .with_defaults(config.default_builder.clone(), config.default_reviewer.clone()),
            merge,
            config.lease_ttl().map_err(ConfigError::from)?,
        )
        .with_publisher(Arc::new(workspace.clone()));
        info!(state_dir = %config.state_dir, "opened filesystem orchestrator");
        Ok(Self::new(engine, config).with_workspace(workspace))
    }
}

impl<T, L, W, C> Orchestrator<T, L, W, C>
where
    T: TaskRepository,
    L: LeaseStore,
    W: WorkerRegistry,
    C: Clock + Send + Sync,
{
    /// Wraps `engine`, taking task defaults from `config`.
    #[must_use]
    pub fn new(engine: WorkflowEngine<T, L, W, C>, config: &OrchestratorConfig) -> Self {
        Self {
            engine,
            workspace: None,
            max_attempts: config.max_attempts,
            default_required_checks: config.default_required_checks.clone(),
        }
    }

    /// Reads worker submissions from `workspace` in
    /// [`Orchestrator::collect_submission`].
    #[must_use]
    pub fn with_workspace(mut self, workspace: FsWorkspace) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Returns the shared-directory workspace, when one is attached.
    #[must_use]
    pub const fn workspace(&self) -> Option<&FsWorkspace> {
        self.workspace.as_ref()
    }

    /// Returns the underlying workflow engine.
    #[must_use]
    pub const fn engine(&self) -> &WorkflowEngine<T, L, W, C> {
        &self.engine
    }

    /// Stores a new task and plans its first attempt.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the request is malformed or pins a
    /// worker that cannot serve it; nothing is stored then. Returns
    /// [`OrchestratorError::Parked`] when the task was stored but could not
    /// be planned, for example because no builder is eligible or a resource
    /// is locked; it stays `QUEUED` for [`Orchestrator::resume`].
    pub async fn submit_task(&self, request: SubmitTaskRequest) -> OrchestratorResult<TaskId> {
        let create = self.prepare(request).await?;
        let task = self
            .engine
            .tasks()
            .create(create)
            .await
            .map_err(WorkflowError::from)?;
        let task_id = task.id();

        match self.engine.plan(task_id).await {
            Ok(_) => Ok(task_id),
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "task queued without a plan");
                Err(OrchestratorError::Parked {
                    task_id,
                    source: Box::new(err),
                })
            }
        }
    }

    /// Splits a requirement into sub-tasks, each with its own build and
    /// review cycle, and plans the ones that depend on nothing.
    ///
    /// A sub-task is planned once every sub-task it names in
    /// [`SubTaskRequest::after`] is `DONE`. Sub-tasks that cannot be planned
    /// yet stay `QUEUED`; [`Orchestrator::resume`] retries them.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank, repeated or unknown keys, a
    /// dependency cycle, or any malformed sub-task; nothing is stored then.
    pub async fn decompose(
        &self,
        parts: Vec<SubTaskRequest>,
    ) -> OrchestratorResult<DecompositionReport> {
        let mut creates = Vec::with_capacity(parts.len());
        for part in parts {
            let create = self.prepare(part.request).await?;
            creates.push(
                CreateSubTaskRequest::new(part.key, create).with_dependencies(part.depends_on),
            );
        }
        let (decomposition, tasks) = self
            .engine
            .tasks()
            .create_decomposition(creates)
            .await
            .map_err(WorkflowError::from)?;

        for task in tasks.iter().filter(|task| task.depends_on().is_empty()) {
            if let Err(err) = self.engine.plan(task.id()).await {
                warn!(
                    task_id = %task.id(),
                    decomposition = %decomposition,
                    error = %err,
                    "sub-task queued without a plan"
                );
            }
        }
        self.decomposition(decomposition).await
    }

    /// Aggregates the progress of a decomposition's sub-tasks.
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no sub-task carries `id`.
    pub async fn decomposition(
        &self,
        id: DecompositionId,
    ) -> OrchestratorResult<DecompositionReport> {
        let tasks = self
            .engine
            .tasks()
            .list()
            .await
            .map_err(WorkflowError::from)?;
        let report = DecompositionReport::aggregate(id, &tasks);
        if report.sub_tasks.is_empty() {
            return Err(OrchestratorError::UnknownDecomposition(id));
        }
        Ok(report)
    }

    /// Applies configured defaults to `request` and checks its pinned
    /// workers against the registry.
    async fn prepare(&self, request: SubmitTaskRequest) -> OrchestratorResult<CreateTaskRequest> {
        let SubmitTaskRequest {
            requirement,
            required_capabilities,
            resources,
            required_checks,
            done_criteria,
            max_attempts,
            builder,
            reviewer,
        } = request;
        if builder.is_some() || reviewer.is_some() {
            let required = CapabilitySet::parse(&required_capabilities).map_err(invalid_input)?;
            let pins = [
                (WorkerRole::Builder, &builder),
                (WorkerRole::Reviewer, &reviewer),
            ];
            for (role, pinned) in pins {
                let Some(raw) = pinned else {
                    continue;
                };
                let worker = WorkerId::new(raw.as_str()).map_err(invalid_input)?;
                let fits = self
                    .engine
                    .router()
                    .can_serve(&worker, &required)
                    .await
                    .map_err(WorkflowError::from)?;
                if !fits {
                    return Err(OrchestratorError::PinRejected { role, worker });
                }
            }
        }
        Ok(CreateTaskRequest::new(
            requirement,
            required_capabilities,
            max_attempts.unwrap_or(self.max_attempts),
        )
        .with_resources(resources)
        .with_required_checks(
            required_checks.unwrap_or_else(|| self.default_required_checks.clone()),
        )
        .with_done_criteria(done_criteria)
        .with_preferred_workers(builder, reviewer))
    }

    /// Applies a worker artifact to the task it resumes.
    ///
    /// # Errors
    ///
    /// Returns a validation error, without changing the task, when the
    /// artifact does not match what the task awaits. When the artifact was
    /// accepted and recorded but the step it triggered failed, for example
    /// because no reviewer is eligible, returns
    /// [`OrchestratorError::Parked`]; [`Orchestrator::resume`] continues the
    /// task from there.
    pub async fn submit_artifact(
        &self,
        task_id: TaskId,
        artifact: Artifact,
    ) -> OrchestratorResult<WorkflowOutcome> {
        let before = self.task(task_id).await?.version();
        let result = match artifact.role() {
            WorkerRole::Builder => self.engine.submit_builder_artifact(task_id, artifact).await,
            WorkerRole::Reviewer => {
                self.engine.submit_reviewer_artifact(task_id, &artifact).await
            }
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.classify_failure(task_id, before, err).await),
        }
    }

    /// Applies the artifact the awaited worker dropped in the workspace
    /// outbox, if there is one.
    ///
    /// The submission is archived once the task has recorded it. A rejected
    /// submission stays in the outbox for the worker to correct.
    ///
    /// Returns `Ok(None)` when no workspace is attached, the task is not
    /// waiting on a worker, or the worker has not submitted yet.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Workspace`] when the submission cannot
    /// be read, and otherwise the errors of
    /// [`Orchestrator::submit_artifact`].
    pub async fn collect_submission(
        &self,
        task_id: TaskId,
    ) -> OrchestratorResult<Option<WorkflowOutcome>> {
        let Some(workspace) = self.workspace.as_ref() else {
            return Ok(None);
        };
        let task = self.task(task_id).await?;
        let Some((role, _)) = task.awaiting() else {
            return Ok(None);
        };
        let Some(artifact) = workspace.read_submission(task_id, role).await? else {
            return Ok(None);
        };
        let result = self.submit_artifact(task_id, artifact).await;
        if matches!(result, Ok(_) | Err(OrchestratorError::Parked { .. })) {
            let received_at = self.engine.tasks().clock().utc();
            workspace
                .archive_submission(task_id, role, received_at)
                .await?;
        }
        result.map(Some)
    }

    /// Returns the progress summary of a task.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown tasks.
    pub async fn get_status(&self, task_id: TaskId) -> OrchestratorResult<TaskStatus> {
        Ok(TaskStatus::of(&self.task(task_id).await?))
    }

    /// Returns the full task record, including its transition history.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown tasks.
    pub async fn task(&self, task_id: TaskId) -> OrchestratorResult<Task> {
        self.engine
            .tasks()
            .get(task_id)
            .await
            .map_err(|err| OrchestratorError::Workflow(err.into()))
    }

    /// Cancels a task on behalf of an operator, releasing its leases.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error when the task is already terminal.
    pub async fn cancel(&self, task_id: TaskId, reason: &str) -> OrchestratorResult<TaskStatus> {
        let outcome = self
            .engine
            .cancel(task_id, Actor::operator("operator"), reason)
            .await?;
        Ok(outcome.status().clone())
    }

    /// Continues a parked or interrupted task from its checkpoint.
    ///
    /// # Errors
    ///
    /// Returns the error of the step that is re-run.
    pub async fn resume(&self, task_id: TaskId) -> OrchestratorResult<WorkflowOutcome> {
        let before = self.task(task_id).await?.version();
        match self.engine.resume(task_id).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.classify_failure(task_id, before, err).await),
        }
    }

    /// Lists every unexpired lease, ordered by resource.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when lease storage fails.
    pub async fn locks(&self) -> OrchestratorResult<Vec<Lease>> {
        self.engine
            .locks()
            .list()
            .await
            .map_err(|err| OrchestratorError::Workflow(err.into()))
    }

    /// Reports `err` as [`OrchestratorError::Parked`] when the task moved
    /// past `before` despite the failure, so callers can tell a recorded
    /// step from a rejected one.
    async fn classify_failure(
        &self,
        task_id: TaskId,
        before: TaskVersion,
        err: WorkflowError,
    ) -> OrchestratorError {
        match self.engine.tasks().get(task_id).await {
            Ok(task) if task.version() != before => {
                warn!(
                    task_id = %task_id,
                    error = %err,
                    version = %task.version(),
                    "step recorded but its follow-up failed; task parked"
                );
                OrchestratorError::Parked {
                    task_id,
                    source: Box::new(err),
                }
            }
            _ => OrchestratorError::Workflow(err),
        }
    }

    /// Subscribes to committed task events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.engine.tasks().subscribe()
    }
}

fn invalid_input(err: RoutingDomainError) -> OrchestratorError {
    OrchestratorError::Workflow(TaskLifecycleError::Capability(err).into())
}
