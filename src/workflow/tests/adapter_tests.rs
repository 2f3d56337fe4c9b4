//! Adapter tests for the filesystem workspace and the merge ledger.

use super::support::{build, worker};
use crate::artifact::{BuilderBrief, render_builder_handoff};
use crate::routing::domain::WorkerRole;
use crate::task::domain::TaskId;
use crate::test_support::ManualClock;
use crate::workflow::adapters::{
    merge::RecordingMergeGateway,
    workspace::{FsWorkspace, WorkspaceError},
};
use crate::workflow::ports::{HandoffPublisher, MergeGateway, MergeRequest};
use camino::Utf8PathBuf;
use mockable::Clock;
use rstest::{fixture, rstest};

#[fixture]
fn temp_workspace() -> (tempfile::TempDir, FsWorkspace) {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().join("workspace")).expect("utf-8 temp path");
    let workspace = FsWorkspace::open(&root).expect("workspace opens");
    (dir, workspace)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn published_handoff_lands_in_the_inbox(temp_workspace: (tempfile::TempDir, FsWorkspace)) {
    let (_guard, workspace) = temp_workspace;
    let task_id = TaskId::new();
    let brief = BuilderBrief {
        task_id,
        attempt: 1,
        max_attempts: 3,
        builder: worker("alpha"),
        requirement: "Make the parser accept empty input".to_owned(),
        done_criteria: Vec::new(),
        required_checks: Vec::new(),
        resources: Vec::new(),
        prior_feedback: Vec::new(),
        prerequisites: Vec::new(),
    };
    let document =
        render_builder_handoff(&brief, ManualClock::new().utc()).expect("hand-off renders");

    workspace
        .publish(task_id, &document)
        .await
        .expect("publish succeeds");

    let path = workspace.inbox_path(task_id, WorkerRole::Builder);
    let written = std::fs::read_to_string(&path).expect("inbox file exists");
    assert_eq!(written, document.body());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn submission_stays_until_archived(temp_workspace: (tempfile::TempDir, FsWorkspace)) {
    let (_guard, workspace) = temp_workspace;
    let task_id = TaskId::new();
    let artifact = build(task_id, "alpha");
    let path = workspace.outbox_path(task_id, WorkerRole::Builder);
    let parent = path.parent().expect("outbox file has a parent");
    std::fs::create_dir_all(parent).expect("outbox task dir");
    std::fs::write(
        &path,
        serde_json::to_vec(&artifact).expect("artifact serializes"),
    )
    .expect("write submission");
    let clock = ManualClock::new();

    let first = workspace
        .read_submission(task_id, WorkerRole::Builder)
        .await
        .expect("submission reads");
    let again = workspace
        .read_submission(task_id, WorkerRole::Builder)
        .await
        .expect("submission reads again");
    assert_eq!(first, Some(artifact.clone()));
    assert_eq!(again, Some(artifact));
    assert!(path.exists());

    workspace
        .archive_submission(task_id, WorkerRole::Builder, clock.utc())
        .await
        .expect("submission archives");
    let after = workspace
        .read_submission(task_id, WorkerRole::Builder)
        .await
        .expect("empty outbox reads");

    assert_eq!(after, None);
    assert!(!path.exists());
    workspace
        .archive_submission(task_id, WorkerRole::Builder, clock.utc())
        .await
        .expect("archiving twice is a no-op");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_submission_stays_in_the_outbox(temp_workspace: (tempfile::TempDir, FsWorkspace)) {
    let (_guard, workspace) = temp_workspace;
    let task_id = TaskId::new();
    let path = workspace.outbox_path(task_id, WorkerRole::Reviewer);
    let parent = path.parent().expect("outbox file has a parent");
    std::fs::create_dir_all(parent).expect("outbox task dir");
    std::fs::write(&path, "{\"decision\": ").expect("write submission");

    let result = workspace
        .read_submission(task_id, WorkerRole::Reviewer)
        .await;

    assert!(matches!(result, Err(WorkspaceError::Malformed { .. })));
    assert!(path.exists());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn merge_ledger_is_idempotent_per_task() {
    let ledger = RecordingMergeGateway::new();
    let request = MergeRequest {
        task_id: TaskId::new(),
        attempt: 1,
        builder: worker("alpha"),
        reviewer: worker("beta"),
        summary: "Guarded the empty slice".to_owned(),
        changed_resources: Vec::new(),
    };

    let first = ledger.merge(&request).await.expect("merge succeeds");
    let retried = ledger
        .merge(&MergeRequest {
            attempt: 2,
            ..request.clone()
        })
        .await
        .expect("merge succeeds");

    assert_eq!(first, retried);
    assert_eq!(first.reference, format!("merge-{}-1", request.task_id));
    assert_eq!(ledger.merged().expect("ledger readable"), vec![request]);
}
