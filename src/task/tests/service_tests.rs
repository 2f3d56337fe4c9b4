//! Service tests for task creation, transitions and change events.

use std::sync::Arc;

use crate::lock::domain::ResourcePath;
use crate::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{Actor, DecompositionError, TaskDomainError, TaskState, TaskVersion},
    ports::TaskRepositoryError,
    services::{
        CreateSubTaskRequest, CreateTaskRequest, TaskEvent, TaskLifecycleError,
        TaskLifecycleService,
    },
};
use crate::test_support::ManualClock;
use rstest::{fixture, rstest};

type TestService = TaskLifecycleService<InMemoryTaskRepository, ManualClock>;

#[fixture]
fn service() -> TestService {
    TaskLifecycleService::new(
        Arc::new(InMemoryTaskRepository::new()),
        Arc::new(ManualClock::new()),
    )
}

fn request() -> CreateTaskRequest {
    CreateTaskRequest::new("Fix the parser", ["rust".to_owned()], 3)
        .with_resources(["./src/parser.rs".to_owned()])
        .with_required_checks(["test".to_owned()])
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_stores_a_queued_task(service: TestService) {
    let task = service.create(request()).await.expect("task is created");

    let stored = service.get(task.id()).await.expect("task is stored");
    assert_eq!(stored, task);
    assert_eq!(stored.state(), TaskState::Queued);
    assert_eq!(
        stored.resources().first().map(ResourcePath::as_str),
        Some("src/parser.rs")
    );
    assert_eq!(stored.required_checks(), ["test".to_owned()]);
}

#[rstest]
#[case(CreateTaskRequest::new(" ", ["rust".to_owned()], 3))]
#[case(CreateTaskRequest::new("Fix", [" ".to_owned()], 3))]
#[case(CreateTaskRequest::new("Fix", ["rust".to_owned()], 3).with_resources(["./".to_owned()]))]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_requests_store_nothing(service: TestService, #[case] invalid: CreateTaskRequest) {
    let result = service.create(invalid).await;

    assert!(matches!(
        result,
        Err(TaskLifecycleError::Domain(TaskDomainError::EmptyRequirement)
            | TaskLifecycleError::Capability(_)
            | TaskLifecycleError::Resource(_))
    ));
    assert!(service.list().await.expect("list succeeds").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn transition_with_stale_version_is_rejected(service: TestService) {
    let task = service.create(request()).await.expect("task is created");
    service
        .transition(
            task.id(),
            task.version(),
            TaskState::Assigned,
            Actor::orchestrator(),
            "routed",
        )
        .await
        .expect("first transition succeeds");

    let stale = service
        .transition(
            task.id(),
            task.version(),
            TaskState::Failed,
            Actor::operator("ops"),
            "cancel",
        )
        .await;

    assert!(matches!(
        stale,
        Err(TaskLifecycleError::Repository(TaskRepositoryError::StaleTask { .. }))
    ));
    let stored = service.get(task.id()).await.expect("task is stored");
    assert_eq!(stored.state(), TaskState::Assigned);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_transition_is_not_persisted(service: TestService) {
    let task = service.create(request()).await.expect("task is created");

    let result = service
        .transition(
            task.id(),
            task.version(),
            TaskState::Merged,
            Actor::orchestrator(),
            "skip ahead",
        )
        .await;

    assert!(matches!(
        result,
        Err(TaskLifecycleError::Domain(TaskDomainError::InvalidTransition { .. }))
    ));
    let stored = service.get(task.id()).await.expect("task is stored");
    assert_eq!(stored.version(), TaskVersion::INITIAL);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_task_is_not_found(service: TestService) {
    let result = service.get(crate::task::domain::TaskId::new()).await;

    assert!(matches!(
        result,
        Err(TaskLifecycleError::Repository(TaskRepositoryError::NotFound(_)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn subscribers_see_every_committed_change(service: TestService) {
    let mut events = service.subscribe();

    let task = service.create(request()).await.expect("task is created");
    let assigned = service
        .transition(
            task.id(),
            task.version(),
            TaskState::Assigned,
            Actor::orchestrator(),
            "routed",
        )
        .await
        .expect("transition succeeds");

    assert_eq!(
        events.try_recv().expect("created event"),
        TaskEvent::Created {
            task_id: task.id(),
            version: TaskVersion::INITIAL,
        }
    );
    assert_eq!(
        events.try_recv().expect("state change event"),
        TaskEvent::StateChanged {
            task_id: task.id(),
            from: TaskState::Queued,
            to: TaskState::Assigned,
            actor: Actor::orchestrator(),
            attempt: 1,
            version: assigned.version(),
        }
    );
    assert!(events.try_recv().is_err());
}

fn part(key: &str, requirement: &str, after: &[&str]) -> CreateSubTaskRequest {
    CreateSubTaskRequest::new(
        key,
        CreateTaskRequest::new(requirement, ["rust".to_owned()], 3),
    )
    .with_dependencies(after.iter().map(|dep| (*dep).to_owned()))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn decomposition_is_stored_in_dependency_order(service: TestService) {
    let (decomposition, tasks) = service
        .create_decomposition(vec![
            part("api", "Expose the endpoint", &["schema"]),
            part("schema", "Add the orders table", &[]),
            part("docs", "Document the endpoint", &["api"]),
        ])
        .await
        .expect("decomposition is stored");

    let keys: Vec<&str> = tasks
        .iter()
        .filter_map(|task| task.sub_task().map(|link| link.key.as_str()))
        .collect();
    assert_eq!(keys, ["schema", "api", "docs"]);
    let [schema, api, docs] = tasks.as_slice() else {
        panic!("expected three sub-tasks");
    };
    assert!(schema.depends_on().is_empty());
    assert_eq!(api.depends_on(), [schema.id()]);
    assert_eq!(docs.depends_on(), [api.id()]);
    for task in &tasks {
        let link = task.sub_task().expect("sub-task link is set");
        assert_eq!(link.decomposition, decomposition);
        let stored = service.get(task.id()).await.expect("sub-task is stored");
        assert_eq!(&stored, task);
        assert_eq!(stored.state(), TaskState::Queued);
    }
}

#[rstest]
#[case(vec![part("api", "Expose", &["api"])], DecompositionError::Cycle("api".to_owned()))]
#[case(
    vec![part("api", "Expose", &["schema"]), part("schema", "Add", &["api"])],
    DecompositionError::Cycle("api".to_owned())
)]
#[case(
    vec![part("api", "Expose", &["auth"])],
    DecompositionError::UnknownDependency { key: "api".to_owned(), dependency: "auth".to_owned() }
)]
#[case(
    vec![part("api", "Expose", &[]), part("api", "Again", &[])],
    DecompositionError::DuplicateKey("api".to_owned())
)]
#[case(vec![], DecompositionError::Empty)]
#[tokio::test(flavor = "multi_thread")]
async fn inconsistent_decomposition_stores_nothing(
    service: TestService,
    #[case] parts: Vec<CreateSubTaskRequest>,
    #[case] expected: DecompositionError,
) {
    let result = service.create_decomposition(parts).await;

    assert!(matches!(result, Err(TaskLifecycleError::Decomposition(ref err)) if *err == expected));
    assert!(service.list().await.expect("list succeeds").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_sub_task_stores_none_of_its_siblings(service: TestService) {
    let result = service
        .create_decomposition(vec![
            part("schema", "Add the orders table", &[]),
            part("api", "   ", &["schema"]),
        ])
        .await;

    assert!(matches!(
        result,
        Err(TaskLifecycleError::Domain(TaskDomainError::EmptyRequirement))
    ));
    assert!(service.list().await.expect("list succeeds").is_empty());
}

#[rstest]
#[case(Some("alpha"), Some("alpha"))]
#[case(Some("Not Valid"), None)]
#[tokio::test(flavor = "multi_thread")]
async fn unusable_worker_pins_are_rejected(
    service: TestService,
    #[case] builder: Option<&str>,
    #[case] reviewer: Option<&str>,
) {
    let pinned = request().with_preferred_workers(
        builder.map(str::to_owned),
        reviewer.map(str::to_owned),
    );

    let result = service.create(pinned).await;

    assert!(matches!(
        result,
        Err(TaskLifecycleError::Domain(TaskDomainError::ReviewerIsBuilder(_))
            | TaskLifecycleError::Capability(_))
    ));
    assert!(service.list().await.expect("list succeeds").is_empty());
}
