//! Shared world state for workflow BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use orchestra::artifact::{Artifact, CheckResult, CheckStatus};
use orchestra::config::OrchestratorConfig;
use orchestra::orchestrator::{InMemoryOrchestrator, OrchestratorError};
use orchestra::routing::domain::{CapabilitySet, WorkerId, WorkerProfile};
use orchestra::task::domain::{Task, TaskId};
use orchestra::workflow::adapters::merge::RecordingMergeGateway;
use rstest::fixture;

/// Orchestrator type driven by the scenarios.
pub type TestOrchestrator = InMemoryOrchestrator<DefaultClock>;

/// Scenario world for workflow behaviour tests.
pub struct WorkflowWorld {
    pub workers: Vec<WorkerProfile>,
    pub orchestrator: Option<TestOrchestrator>,
    pub task_id: Option<TaskId>,
    pub last_error: Option<OrchestratorError>,
}

impl WorkflowWorld {
    /// Creates a world with no workers registered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            workers: Vec::new(),
            orchestrator: None,
            task_id: None,
            last_error: None,
        }
    }

    /// Registers a worker offering comma-separated `capabilities`.
    pub fn add_worker(&mut self, id: &str, capabilities: &str) -> Result<(), eyre::Report> {
        let profile = WorkerProfile::new(
            WorkerId::new(id)?,
            CapabilitySet::parse(capabilities.split(','))?,
            1,
        )?;
        self.workers.push(profile);
        Ok(())
    }

    /// Returns the orchestrator, building it from the registered workers on
    /// first use.
    pub fn orchestrator(&mut self) -> Result<&TestOrchestrator, eyre::Report> {
        if self.orchestrator.is_none() {
            let config = OrchestratorConfig {
                default_required_checks: vec!["test".to_owned()],
                workers: self.workers.clone(),
                ..OrchestratorConfig::default()
            };
            let built = InMemoryOrchestrator::in_memory(
                &config,
                Arc::new(DefaultClock),
                Arc::new(RecordingMergeGateway::new()),
            )?;
            self.orchestrator = Some(built);
        }
        self.orchestrator
            .as_ref()
            .ok_or_else(|| eyre::eyre!("orchestrator was not built"))
    }

    /// Returns the submitted task identifier.
    pub fn task_id(&self) -> Result<TaskId, eyre::Report> {
        self.task_id
            .ok_or_else(|| eyre::eyre!("missing submitted task in scenario world"))
    }

    /// Loads the submitted task.
    pub fn task(&mut self) -> Result<Task, eyre::Report> {
        let task_id = self.task_id()?;
        let orchestrator = self.orchestrator()?;
        Ok(run_async(orchestrator.task(task_id))?)
    }

    /// Submits a builder artifact with a passing `test` check on behalf of
    /// the awaited builder, recording any failure.
    pub fn submit_passing_build(&mut self) -> Result<(), eyre::Report> {
        let task = self.task()?;
        let builder = task
            .builder_id()
            .cloned()
            .ok_or_else(|| eyre::eyre!("task has no builder"))?;
        let mut artifact = Artifact::builder(task.id(), builder, "Implemented the change")
            .with_check("test", CheckResult::new(CheckStatus::Pass, "12 passed"));
        for resource in task.resources() {
            artifact = artifact.with_changed_resource(resource.as_str());
        }
        self.apply(artifact)
    }

    /// Applies `artifact`, keeping the error for later assertions.
    pub fn apply(&mut self, artifact: Artifact) -> Result<(), eyre::Report> {
        let task_id = self.task_id()?;
        let orchestrator = self.orchestrator()?;
        let result = run_async(orchestrator.submit_artifact(task_id, artifact));
        self.last_error = result.err();
        Ok(())
    }
}

impl Default for WorkflowWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> WorkflowWorld {
    WorkflowWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
