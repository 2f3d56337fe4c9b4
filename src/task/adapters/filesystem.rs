//! Task repository persisted as one JSON document per task.

use async_trait::async_trait;
use camino::Utf8Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::storage::{JsonDir, run_blocking};
use crate::task::{
    domain::{Task, TaskId, TaskVersion},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

const TASKS_DIR: &str = "tasks";

/// Task repository stored under `<state_dir>/tasks/<task_id>.json`.
///
/// The version check and the atomic rename run under one in-process guard,
/// so concurrent writers through the same repository never lose updates.
#[derive(Debug, Clone)]
pub struct FsTaskRepository {
    dir: JsonDir,
    write_guard: Arc<Mutex<()>>,
}

impl FsTaskRepository {
    /// Opens (or creates) the task directory below `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the directory cannot
    /// be created or opened.
    pub fn open(state_dir: &Utf8Path) -> TaskRepositoryResult<Self> {
        let dir = JsonDir::open(state_dir, TASKS_DIR).map_err(TaskRepositoryError::persistence)?;
        Ok(Self {
            dir,
            write_guard: Arc::new(Mutex::new(())),
        })
    }
}

#[async_trait]
impl TaskRepository for FsTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let _guard = self.write_guard.lock().await;
        let dir = self.dir.clone();
        let record = task.clone();
        run_blocking(move || {
            let key = record.id().to_string();
            if dir.read::<Task>(&key)?.is_some() {
                return Ok(Err(TaskRepositoryError::DuplicateTask(record.id())));
            }
            dir.write(&key, &record)?;
            Ok(Ok(()))
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }

    async fn update(&self, task: &Task, expected: TaskVersion) -> TaskRepositoryResult<()> {
        let _guard = self.write_guard.lock().await;
        let dir = self.dir.clone();
        let record = task.clone();
        run_blocking(move || {
            let key = record.id().to_string();
            let Some(stored) = dir.read::<Task>(&key)? else {
                return Ok(Err(TaskRepositoryError::NotFound(record.id())));
            };
            if stored.version() != expected {
                return Ok(Err(TaskRepositoryError::StaleTask {
                    task_id: record.id(),
                    expected,
                    actual: stored.version(),
                }));
            }
            dir.write(&key, &record)?;
            Ok(Ok(()))
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let dir = self.dir.clone();
        run_blocking(move || dir.read::<Task>(&id.to_string()))
            .await
            .map_err(TaskRepositoryError::persistence)
    }

    async fn list(&self) -> TaskRepositoryResult<Vec<Task>> {
        let dir = self.dir.clone();
        let mut all = run_blocking(move || dir.read_all::<Task>())
            .await
            .map_err(TaskRepositoryError::persistence)?;
        all.sort_by_key(|task| (task.created_at(), task.id()));
        Ok(all)
    }
}
