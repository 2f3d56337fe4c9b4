//! Shared-directory workspace through which workers exchange documents.
//!
//! The layout below the workspace root is:
//!
//! - `inbox/<task_id>/<role>.md` holds the current hand-off for a worker.
//! - `outbox/<task_id>/<role>.json` is where a worker drops its artifact.
//! - `history/<task_id>/` keeps every applied artifact.

use crate::artifact::{Artifact, HandoffDocument};
use crate::routing::domain::WorkerRole;
use crate::storage::{run_blocking, write_atomic};
use crate::task::domain::TaskId;
use crate::workflow::ports::{HandoffPublisher, PublishError};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use chrono::{DateTime, Utc};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const INBOX: &str = "inbox";
const OUTBOX: &str = "outbox";
const HISTORY: &str = "history";

/// Errors raised while reading worker submissions.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The submission file is not a valid artifact document.
    #[error("malformed artifact at {path}: {source}")]
    Malformed {
        /// Workspace-relative path of the offending file.
        path: Utf8PathBuf,
        /// Decoder error.
        source: serde_json::Error,
    },
    /// Filesystem access failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Filesystem workspace rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: Utf8PathBuf,
    dir: Arc<Dir>,
}

impl FsWorkspace {
    /// Opens the workspace at `root`, creating its directories when missing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directories cannot be created.
    pub fn open(root: &Utf8Path) -> io::Result<Self> {
        Dir::create_ambient_dir_all(root, ambient_authority())?;
        let dir = Dir::open_ambient_dir(root, ambient_authority())?;
        for name in [INBOX, OUTBOX, HISTORY] {
            dir.create_dir_all(name)?;
        }
        Ok(Self {
            root: root.to_owned(),
            dir: Arc::new(dir),
        })
    }

    /// Returns the absolute path of the hand-off for `task_id` and `role`.
    #[must_use]
    pub fn inbox_path(&self, task_id: TaskId, role: WorkerRole) -> Utf8PathBuf {
        self.root.join(inbox_file(task_id, role))
    }

    /// Returns the absolute path where a worker drops its artifact.
    #[must_use]
    pub fn outbox_path(&self, task_id: TaskId, role: WorkerRole) -> Utf8PathBuf {
        self.root.join(outbox_file(task_id, role))
    }

    /// Reads the artifact a worker dropped for `task_id` and `role`,
    /// leaving the file in the outbox.
    ///
    /// Returns `Ok(None)` when nothing was submitted.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Malformed`] when the file does not decode
    /// and [`WorkspaceError::Io`] when filesystem access fails.
    pub async fn read_submission(
        &self,
        task_id: TaskId,
        role: WorkerRole,
    ) -> Result<Option<Artifact>, WorkspaceError> {
        let dir = Arc::clone(&self.dir);
        let source = outbox_file(task_id, role);
        let path = source.clone();
        let contents = run_blocking(move || match dir.read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        })
        .await?;
        let Some(text) = contents else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| WorkspaceError::Malformed {
                path: source,
                source: err,
            })
    }

    /// Moves an applied submission into the task's history, stamped with
    /// `received_at`, so it is not read again.
    ///
    /// Archiving a submission that is already gone is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when the file cannot be moved.
    pub async fn archive_submission(
        &self,
        task_id: TaskId,
        role: WorkerRole,
        received_at: DateTime<Utc>,
    ) -> Result<(), WorkspaceError> {
        let dir = Arc::clone(&self.dir);
        let source = outbox_file(task_id, role);
        let archived = format!(
            "{HISTORY}/{task_id}/{}-{}.json",
            role.as_str(),
            received_at.format("%Y%m%dT%H%M%S%3fZ")
        );
        let history_dir = format!("{HISTORY}/{task_id}");
        let destination = archived.clone();
        run_blocking(move || {
            dir.create_dir_all(&history_dir)?;
            match dir.rename(&source, &dir, &destination) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        })
        .await?;
        info!(
            task_id = %task_id,
            role = %role,
            archived = %archived,
            "archived worker submission"
        );
        Ok(())
    }
}

#[async_trait]
impl HandoffPublisher for FsWorkspace {
    async fn publish(&self, task_id: TaskId, document: &HandoffDocument) -> Result<(), PublishError> {
        let dir = Arc::clone(&self.dir);
        let role = document.role();
        let body = document.body().to_owned();
        run_blocking(move || {
            let task_dir = dir.create_dir_all(format!("{INBOX}/{task_id}")).and_then(|()| {
                dir.open_dir(format!("{INBOX}/{task_id}"))
            })?;
            write_atomic(&task_dir, &format!("{}.md", role.as_str()), body.as_bytes())
        })
        .await
        .map_err(|err| PublishError::new(task_id, err))?;
        debug!(
            task_id = %task_id,
            role = %role,
            path = %self.inbox_path(task_id, role),
            "published hand-off"
        );
        Ok(())
    }
}

fn inbox_file(task_id: TaskId, role: WorkerRole) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{INBOX}/{task_id}/{}.md", role.as_str()))
}

fn outbox_file(task_id: TaskId, role: WorkerRole) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{OUTBOX}/{task_id}/{}.json", role.as_str()))
}
