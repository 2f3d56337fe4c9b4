//! Sub-tasks split from a larger requirement.
//!
//! Each sub-task is an ordinary [`Task`] with its own build and review
//! cycle. A [`SubTaskLink`] ties it to its siblings and names the sibling
//! tasks that must be `DONE` before it may be planned.

use super::{Task, TaskId, TaskState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identifier shared by the sub-tasks split from one requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecompositionId(Uuid);

impl DecompositionId {
    /// Creates a new random decomposition identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DecompositionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DecompositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Membership of a task in a decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskLink {
    /// Decomposition the task belongs to.
    pub decomposition: DecompositionId,
    /// Key naming the sub-task within its decomposition.
    pub key: String,
    /// Position in dependency order.
    pub position: usize,
    /// Sibling tasks that must be done first.
    pub depends_on: Vec<TaskId>,
}

/// Errors raised while ordering sub-tasks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecompositionError {
    /// No sub-tasks were given.
    #[error("a decomposition needs at least one sub-task")]
    Empty,

    /// A sub-task key is blank.
    #[error("sub-task key must not be empty")]
    EmptyKey,

    /// Two sub-tasks share a key.
    #[error("sub-task '{0}' is listed more than once")]
    DuplicateKey(String),

    /// A dependency names no sibling.
    #[error("sub-task '{key}' depends on unknown sub-task '{dependency}'")]
    UnknownDependency {
        /// Dependent sub-task.
        key: String,
        /// Missing sibling.
        dependency: String,
    },

    /// The dependencies form a cycle.
    #[error("sub-tasks form a dependency cycle through '{0}'")]
    Cycle(String),
}

/// Orders `(key, dependencies)` pairs so every sub-task follows the
/// sub-tasks it depends on, returning indices into `parts`.
///
/// Independent sub-tasks keep their given order.
///
/// # Errors
///
/// Returns [`DecompositionError`] for an empty list, blank or repeated keys,
/// unknown dependencies and cycles (including a sub-task naming itself).
pub fn dependency_order(parts: &[(String, Vec<String>)]) -> Result<Vec<usize>, DecompositionError> {
    if parts.is_empty() {
        return Err(DecompositionError::Empty);
    }
    let mut keys = BTreeSet::new();
    for (key, _) in parts {
        if key.trim().is_empty() {
            return Err(DecompositionError::EmptyKey);
        }
        if !keys.insert(key.as_str()) {
            return Err(DecompositionError::DuplicateKey(key.clone()));
        }
    }
    for (key, dependencies) in parts {
        if let Some(unknown) = dependencies
            .iter()
            .find(|dependency| !keys.contains(dependency.as_str()))
        {
            return Err(DecompositionError::UnknownDependency {
                key: key.clone(),
                dependency: unknown.clone(),
            });
        }
    }

    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut order = Vec::with_capacity(parts.len());
    while order.len() < parts.len() {
        let ready = parts.iter().enumerate().find(|(_, (key, dependencies))| {
            !placed.contains(key.as_str())
                && dependencies
                    .iter()
                    .all(|dependency| placed.contains(dependency.as_str()))
        });
        let Some((index, (key, _))) = ready else {
            let stuck = parts
                .iter()
                .map(|(key, _)| key)
                .find(|key| !placed.contains(key.as_str()))
                .cloned()
                .unwrap_or_default();
            return Err(DecompositionError::Cycle(stuck));
        };
        placed.insert(key.as_str());
        order.push(index);
    }
    Ok(order)
}

/// Overall progress of a decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionOutcome {
    /// Some sub-task is still live.
    InProgress,
    /// Every sub-task is done.
    Done,
    /// A sub-task failed or was escalated.
    Failed,
}

/// Progress of one sub-task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskSummary {
    /// Key of the sub-task.
    pub key: String,
    /// Task running the sub-task.
    pub task_id: TaskId,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Attempts started so far.
    pub attempts: u32,
    /// Summary of the latest builder artifact, if any.
    pub summary: Option<String>,
}

/// Aggregate view over the sub-tasks of one decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompositionReport {
    /// Decomposition being reported.
    pub id: DecompositionId,
    /// Sub-tasks in dependency order.
    pub sub_tasks: Vec<SubTaskSummary>,
    /// Number of sub-tasks that reached `DONE`.
    pub completed: usize,
    /// Keys of sub-tasks that failed or were escalated.
    pub failed: Vec<String>,
    /// Retries spent across all sub-tasks.
    pub total_retries: u32,
    /// Resources changed by completed sub-tasks, sorted and unique.
    pub changed_resources: Vec<String>,
    /// Overall progress.
    pub outcome: DecompositionOutcome,
}

impl DecompositionReport {
    /// Builds the report for `id` from `tasks`, ignoring tasks outside it.
    #[must_use]
    pub fn aggregate(id: DecompositionId, tasks: &[Task]) -> Self {
        let mut members: Vec<(&SubTaskLink, &Task)> = tasks
            .iter()
            .filter_map(|task| task.sub_task().map(|link| (link, task)))
            .filter(|(link, _)| link.decomposition == id)
            .collect();
        members.sort_by_key(|(link, _)| link.position);

        let mut changed = BTreeSet::new();
        let mut failed = Vec::new();
        let mut completed = 0;
        let mut total_retries: u32 = 0;
        let mut sub_tasks = Vec::with_capacity(members.len());
        for (link, task) in members {
            let artifact = task.checkpoint().builder_artifact();
            match task.state() {
                TaskState::Done => {
                    completed += 1;
                    if let Some(built) = artifact {
                        changed.extend(built.changed_resources().iter().cloned());
                    }
                }
                TaskState::Failed | TaskState::Escalated => failed.push(link.key.clone()),
                _ => {}
            }
            total_retries = total_retries.saturating_add(task.attempt_count().saturating_sub(1));
            sub_tasks.push(SubTaskSummary {
                key: link.key.clone(),
                task_id: task.id(),
                state: task.state(),
                attempts: task.attempt_count(),
                summary: artifact.map(|built| built.summary().to_owned()),
            });
        }

        let outcome = if !failed.is_empty() {
            DecompositionOutcome::Failed
        } else if completed == sub_tasks.len() && !sub_tasks.is_empty() {
            DecompositionOutcome::Done
        } else {
            DecompositionOutcome::InProgress
        };
        Self {
            id,
            sub_tasks,
            completed,
            failed,
            total_retries,
            changed_resources: changed.into_iter().collect(),
            outcome,
        }
    }
}
