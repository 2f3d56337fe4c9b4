//! Shared fixtures for workflow engine tests.

use std::sync::Arc;

use crate::artifact::{Artifact, CheckResult, CheckStatus, ReviewDecision};
use crate::lock::{adapters::memory::InMemoryLeaseStore, domain::LeaseTtl, services::LockManager};
use crate::routing::{
    adapters::memory::InMemoryWorkerRegistry,
    domain::{CapabilitySet, WorkerId, WorkerProfile},
    services::CapabilityRouter,
};
use crate::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::TaskId,
    services::{CreateTaskRequest, TaskLifecycleService},
};
use crate::test_support::ManualClock;
use crate::workflow::WorkflowEngine;
use crate::workflow::adapters::memory::InMemoryInbox;
use crate::workflow::ports::MergeGateway;

pub(super) type TestEngine = WorkflowEngine<
    InMemoryTaskRepository,
    InMemoryLeaseStore,
    InMemoryWorkerRegistry,
    ManualClock,
>;

pub(super) const LEASE_SECS: u64 = 600;

pub(super) struct Harness {
    pub(super) engine: TestEngine,
    pub(super) clock: ManualClock,
    pub(super) registry: Arc<InMemoryWorkerRegistry>,
    pub(super) inbox: InMemoryInbox,
}

impl Harness {
    pub(super) fn new(workers: &[&str], merge: Arc<dyn MergeGateway>) -> Self {
        let clock = ManualClock::new();
        let shared_clock = Arc::new(clock.clone());
        let registry = Arc::new(InMemoryWorkerRegistry::from_profiles(
            workers.iter().copied().map(profile),
        ));
        let inbox = InMemoryInbox::new();
        let engine = WorkflowEngine::new(
            TaskLifecycleService::new(
                Arc::new(InMemoryTaskRepository::new()),
                Arc::clone(&shared_clock),
            ),
            LockManager::new(Arc::new(InMemoryLeaseStore::new()), shared_clock),
            CapabilityRouter::new(Arc::clone(&registry)),
            merge,
            LeaseTtl::from_secs(LEASE_SECS).expect("valid ttl"),
        )
        .with_publisher(Arc::new(inbox.clone()));
        Self {
            engine,
            clock,
            registry,
            inbox,
        }
    }

    /// Creates a task needing `rust` that will change `resources` and must
    /// report the `test` check.
    pub(super) async fn create(&self, max_attempts: u32, resources: &[&str]) -> TaskId {
        let request = CreateTaskRequest::new(
            "Make the parser accept empty input",
            ["rust".to_owned()],
            max_attempts,
        )
        .with_resources(resources.iter().map(|path| (*path).to_owned()))
        .with_required_checks(["test".to_owned()]);
        self.engine
            .tasks()
            .create(request)
            .await
            .expect("task is created")
            .id()
    }
}

pub(super) fn worker(raw: &str) -> WorkerId {
    WorkerId::new(raw).expect("valid worker id")
}

pub(super) fn profile(raw: &str) -> WorkerProfile {
    WorkerProfile::new(
        worker(raw),
        CapabilitySet::parse(["rust"]).expect("valid capabilities"),
        1,
    )
    .expect("valid profile")
}

pub(super) fn build(task_id: TaskId, builder: &str) -> Artifact {
    Artifact::builder(task_id, worker(builder), "Guarded the empty slice")
        .with_changed_resource("src/parser.rs")
        .with_check("test", CheckResult::new(CheckStatus::Pass, "12 passed"))
}

pub(super) fn review(task_id: TaskId, reviewer: &str, decision: ReviewDecision) -> Artifact {
    if decision == ReviewDecision::Approved {
        return Artifact::reviewer(task_id, worker(reviewer), decision, "Empty input handled");
    }
    Artifact::reviewer(task_id, worker(reviewer), decision, "Empty input still panics")
        .with_evidence("tests/parser.rs:12 index out of bounds")
}
