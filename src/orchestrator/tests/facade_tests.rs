//! Facade tests over the in-memory stores.

use std::sync::Arc;

use crate::artifact::{Artifact, CheckResult, CheckStatus, ReviewDecision};
use crate::config::OrchestratorConfig;
use crate::error::ErrorKind;
use crate::orchestrator::{InMemoryOrchestrator, SubTaskRequest, SubmitTaskRequest};
use crate::routing::domain::{CapabilitySet, WorkerId, WorkerProfile, WorkerRole};
use crate::task::domain::{DecompositionId, DecompositionOutcome, TaskId, TaskState};
use crate::task::services::TaskEvent;
use crate::test_support::ManualClock;
use crate::workflow::adapters::merge::RecordingMergeGateway;
use rstest::{fixture, rstest};

fn worker(raw: &str) -> WorkerId {
    WorkerId::new(raw).expect("valid worker id")
}

fn config(workers: &[&str]) -> OrchestratorConfig {
    OrchestratorConfig {
        default_required_checks: vec!["test".to_owned()],
        workers: workers
            .iter()
            .map(|id| {
                WorkerProfile::new(
                    worker(id),
                    CapabilitySet::parse(["backend", "review"]).expect("valid capabilities"),
                    1,
                )
                .expect("valid profile")
            })
            .collect(),
        ..OrchestratorConfig::default()
    }
}

fn orchestrator(workers: &[&str]) -> InMemoryOrchestrator<ManualClock> {
    InMemoryOrchestrator::in_memory(
        &config(workers),
        Arc::new(ManualClock::new()),
        Arc::new(RecordingMergeGateway::new()),
    )
    .expect("orchestrator builds")
}

#[fixture]
fn pair() -> InMemoryOrchestrator<ManualClock> {
    orchestrator(&["alpha", "beta"])
}

fn request() -> SubmitTaskRequest {
    SubmitTaskRequest::new("Add a null check to the order handler", ["backend"])
        .with_resources(["src/orders.rs"])
}

fn build(task_id: TaskId) -> Artifact {
    Artifact::builder(task_id, worker("alpha"), "Added the null check")
        .with_changed_resource("src/orders.rs")
        .with_check("test", CheckResult::new(CheckStatus::Pass, ""))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn submitted_task_is_planned_with_configured_defaults(
    pair: InMemoryOrchestrator<ManualClock>,
) {
    let task_id = pair.submit_task(request()).await.expect("task is submitted");

    let status = pair.get_status(task_id).await.expect("status is readable");
    let task = pair.task(task_id).await.expect("task is readable");

    assert_eq!(status.state, TaskState::Running);
    assert_eq!(status.max_attempts, 3);
    assert_eq!(status.awaiting_role, Some(WorkerRole::Builder));
    assert_eq!(status.awaiting_worker, Some(worker("alpha")));
    assert_eq!(task.required_checks(), ["test".to_owned()]);
    let locks = pair.locks().await.expect("locks are readable");
    assert_eq!(locks.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn task_overrides_beat_configured_defaults(pair: InMemoryOrchestrator<ManualClock>) {
    let task_id = pair
        .submit_task(
            request()
                .with_required_checks(["lint", "test"])
                .with_max_attempts(5),
        )
        .await
        .expect("task is submitted");

    let task = pair.task(task_id).await.expect("task is readable");

    assert_eq!(task.max_attempts(), 5);
    assert_eq!(task.required_checks(), ["lint".to_owned(), "test".to_owned()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn artifacts_are_dispatched_by_role(pair: InMemoryOrchestrator<ManualClock>) {
    let task_id = pair.submit_task(request()).await.expect("task is submitted");

    let built = pair
        .submit_artifact(task_id, build(task_id))
        .await
        .expect("builder artifact accepted");
    assert_eq!(built.status().awaiting_worker, Some(worker("beta")));

    let approval = Artifact::reviewer(
        task_id,
        worker("beta"),
        ReviewDecision::Approved,
        "Null check covers the empty order",
    );
    let done = pair
        .submit_artifact(task_id, approval)
        .await
        .expect("review accepted");

    assert!(done.is_terminal());
    assert_eq!(done.status().state, TaskState::Done);
    assert!(pair.locks().await.expect("locks are readable").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn blank_requirement_is_a_validation_error(pair: InMemoryOrchestrator<ManualClock>) {
    let error = pair
        .submit_task(SubmitTaskRequest::new("   ", ["backend"]))
        .await
        .expect_err("blank requirement is rejected");

    assert_eq!(error.kind(), ErrorKind::ValidationError);
    assert_eq!(error.parked_task(), None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unroutable_task_is_parked_in_the_queue() {
    let facade = orchestrator(&[]);

    let error = facade
        .submit_task(request())
        .await
        .expect_err("no builder is registered");

    assert_eq!(error.kind(), ErrorKind::NoEligibleAgent);
    let task_id = error.parked_task().expect("parked task is reported");
    let status = facade.get_status(task_id).await.expect("status is readable");
    assert_eq!(status.state, TaskState::Queued);
    assert_eq!(status.version, crate::task::domain::TaskVersion::INITIAL);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_artifact_names_the_offending_field(pair: InMemoryOrchestrator<ManualClock>) {
    let task_id = pair.submit_task(request()).await.expect("task is submitted");
    let incomplete = Artifact::builder(task_id, worker("alpha"), "Added the null check");

    let error = pair
        .submit_artifact(task_id, incomplete)
        .await
        .expect_err("missing check is rejected");

    assert_eq!(error.kind(), ErrorKind::ValidationError);
    assert_eq!(error.field().as_deref(), Some("check_results.test"));
    assert_eq!(error.parked_task(), None);
    let status = pair.get_status(task_id).await.expect("status is readable");
    assert_eq!(status.state, TaskState::Running);
    assert_eq!(status.awaiting_role, Some(WorkerRole::Builder));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn accepted_build_without_a_reviewer_parks_the_task() {
    let facade = orchestrator(&["alpha"]);
    let task_id = facade.submit_task(request()).await.expect("task is submitted");

    let error = facade
        .submit_artifact(task_id, build(task_id))
        .await
        .expect_err("no reviewer is eligible");

    assert_eq!(error.kind(), ErrorKind::NoEligibleAgent);
    assert_eq!(error.parked_task(), Some(task_id));
    let task = facade.task(task_id).await.expect("task is readable");
    assert_eq!(task.state(), TaskState::Verifying);
    assert!(task.checkpoint().builder_artifact().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_task_is_not_found(pair: InMemoryOrchestrator<ManualClock>) {
    let error = pair
        .get_status(TaskId::new())
        .await
        .expect_err("task does not exist");

    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_reports_the_failed_status(pair: InMemoryOrchestrator<ManualClock>) {
    let task_id = pair.submit_task(request()).await.expect("task is submitted");
    let mut events = pair.subscribe();

    let status = pair
        .cancel(task_id, "requirement withdrawn")
        .await
        .expect("cancel succeeds");

    assert_eq!(status.state, TaskState::Failed);
    assert!(pair.locks().await.expect("locks are readable").is_empty());
    match events.try_recv().expect("cancel is broadcast") {
        TaskEvent::StateChanged { task_id: id, to, .. } => {
            assert_eq!(id, task_id);
            assert_eq!(to, TaskState::Failed);
        }
        other @ TaskEvent::Created { .. } => panic!("unexpected event {other:?}"),
    }
}

#[rstest]
fn invalid_configuration_is_refused() {
    let config = OrchestratorConfig {
        max_attempts: 0,
        ..OrchestratorConfig::default()
    };

    let result = InMemoryOrchestrator::in_memory(
        &config,
        Arc::new(ManualClock::new()),
        Arc::new(RecordingMergeGateway::new()),
    );

    assert!(matches!(result, Err(ref error) if error.kind() == ErrorKind::ValidationError));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pinned_workers_replace_automatic_routing(pair: InMemoryOrchestrator<ManualClock>) {
    let task_id = pair
        .submit_task(request().with_builder("beta").with_reviewer("alpha"))
        .await
        .expect("task is submitted");

    let planned = pair.get_status(task_id).await.expect("status is readable");
    assert_eq!(planned.awaiting_worker, Some(worker("beta")));

    let built = Artifact::builder(task_id, worker("beta"), "Added the null check")
        .with_changed_resource("src/orders.rs")
        .with_check("test", CheckResult::new(CheckStatus::Pass, ""));
    let outcome = pair
        .submit_artifact(task_id, built)
        .await
        .expect("builder artifact accepted");
    assert_eq!(outcome.status().awaiting_worker, Some(worker("alpha")));
}

#[rstest]
#[case(request().with_builder("gamma"), "builder")]
#[case(
    SubmitTaskRequest::new("Port the billing job", ["python"]).with_reviewer("alpha"),
    "reviewer"
)]
#[tokio::test(flavor = "multi_thread")]
async fn pin_that_cannot_serve_the_task_is_rejected(
    pair: InMemoryOrchestrator<ManualClock>,
    #[case] pinned: SubmitTaskRequest,
    #[case] field: &str,
) {
    let error = pair
        .submit_task(pinned)
        .await
        .expect_err("pin is rejected");

    assert_eq!(error.kind(), ErrorKind::ValidationError);
    assert_eq!(error.field().as_deref(), Some(field));
    assert_eq!(error.parked_task(), None);
    let stored = pair.engine().tasks().list().await.expect("tasks list");
    assert!(stored.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn same_pinned_builder_and_reviewer_is_rejected(pair: InMemoryOrchestrator<ManualClock>) {
    let error = pair
        .submit_task(request().with_builder("alpha").with_reviewer("alpha"))
        .await
        .expect_err("a worker cannot review its own build");

    assert_eq!(error.kind(), ErrorKind::ValidationError);
    assert!(pair.engine().tasks().list().await.expect("tasks list").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn configured_default_builder_is_preferred() {
    let config = OrchestratorConfig {
        default_builder: Some(worker("beta")),
        ..config(&["alpha", "beta"])
    };
    let orchestrator = InMemoryOrchestrator::in_memory(
        &config,
        Arc::new(ManualClock::new()),
        Arc::new(RecordingMergeGateway::new()),
    )
    .expect("orchestrator builds");

    let task_id = orchestrator
        .submit_task(request())
        .await
        .expect("task is submitted");

    let status = orchestrator.get_status(task_id).await.expect("status is readable");
    assert_eq!(status.awaiting_worker, Some(worker("beta")));
}

fn sub_task(key: &str, requirement: &str) -> SubTaskRequest {
    SubTaskRequest::new(key, SubmitTaskRequest::new(requirement, ["backend"]))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn decomposed_requirement_runs_in_dependency_order(
    pair: InMemoryOrchestrator<ManualClock>,
) {
    let report = pair
        .decompose(vec![
            sub_task("api", "Expose the orders endpoint").after(["schema"]),
            sub_task("schema", "Add the orders table"),
        ])
        .await
        .expect("requirement is decomposed");

    let keys: Vec<&str> = report.sub_tasks.iter().map(|part| part.key.as_str()).collect();
    assert_eq!(keys, ["schema", "api"]);
    let states: Vec<TaskState> = report.sub_tasks.iter().map(|part| part.state).collect();
    assert_eq!(states, [TaskState::Running, TaskState::Queued]);
    assert_eq!(report.outcome, DecompositionOutcome::InProgress);

    let schema = report
        .sub_tasks
        .first()
        .map(|part| part.task_id)
        .expect("schema sub-task");
    pair.submit_artifact(schema, build(schema))
        .await
        .expect("builder artifact accepted");
    let approval = Artifact::reviewer(
        schema,
        worker("beta"),
        ReviewDecision::Approved,
        "Table matches the model",
    );
    pair.submit_artifact(schema, approval)
        .await
        .expect("review accepted");

    let progressed = pair
        .decomposition(report.id)
        .await
        .expect("report is readable");
    let states: Vec<TaskState> = progressed.sub_tasks.iter().map(|part| part.state).collect();
    assert_eq!(states, [TaskState::Done, TaskState::Running]);
    assert_eq!(progressed.completed, 1);
    assert_eq!(
        progressed.sub_tasks.first().and_then(|part| part.summary.as_deref()),
        Some("Added the null check")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cyclic_decomposition_stores_nothing(pair: InMemoryOrchestrator<ManualClock>) {
    let error = pair
        .decompose(vec![
            sub_task("api", "Expose the orders endpoint").after(["schema"]),
            sub_task("schema", "Add the orders table").after(["api"]),
        ])
        .await
        .expect_err("cycle is rejected");

    assert_eq!(error.kind(), ErrorKind::ValidationError);
    assert!(pair.engine().tasks().list().await.expect("tasks list").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_decomposition_is_not_found(pair: InMemoryOrchestrator<ManualClock>) {
    let error = pair
        .decomposition(DecompositionId::new())
        .await
        .expect_err("nothing was decomposed");

    assert_eq!(error.kind(), ErrorKind::NotFound);
}
