//! Artifact records submitted by builders and reviewers.

use crate::routing::domain::{WorkerId, WorkerRole};
use crate::task::domain::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of one quality gate reported by a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The check ran and passed.
    Pass,
    /// The check ran and failed.
    Fail,
    /// The check was not run.
    Skip,
}

impl CheckStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Gate outcome.
    pub status: CheckStatus,
    /// Free-form detail such as a failure excerpt.
    #[serde(default)]
    pub detail: String,
}

impl CheckResult {
    /// Creates a check result.
    #[must_use]
    pub fn new(status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

/// Reviewer verdict on a builder's change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    /// Accept the change for merging.
    Approved,
    /// Send the change back to a builder with feedback.
    Retry,
    /// Stop and hand the task to a human.
    Escalated,
}

impl ReviewDecision {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Retry => "RETRY",
            Self::Escalated => "ESCALATED",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured record a worker submits to resume a suspended task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    task_id: TaskId,
    worker_id: WorkerId,
    role: WorkerRole,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    changed_resources: Vec<String>,
    #[serde(default)]
    check_results: BTreeMap<String, CheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decision: Option<ReviewDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    evidence: Vec<String>,
}

impl Artifact {
    /// Starts a builder artifact.
    #[must_use]
    pub fn builder(task_id: TaskId, worker_id: WorkerId, summary: impl Into<String>) -> Self {
        Self::new(task_id, worker_id, WorkerRole::Builder, summary.into())
    }

    /// Starts a reviewer artifact carrying `decision` and `rationale`.
    #[must_use]
    pub fn reviewer(
        task_id: TaskId,
        worker_id: WorkerId,
        decision: ReviewDecision,
        rationale: impl Into<String>,
    ) -> Self {
        let rationale_text = rationale.into();
        let mut artifact = Self::new(task_id, worker_id, WorkerRole::Reviewer, rationale_text.clone());
        artifact.decision = Some(decision);
        artifact.rationale = Some(rationale_text);
        artifact
    }

    const fn new(task_id: TaskId, worker_id: WorkerId, role: WorkerRole, summary: String) -> Self {
        Self {
            task_id,
            worker_id,
            role,
            summary,
            changed_resources: Vec::new(),
            check_results: BTreeMap::new(),
            decision: None,
            rationale: None,
            evidence: Vec::new(),
        }
    }

    /// Replaces the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Adds a changed resource path.
    #[must_use]
    pub fn with_changed_resource(mut self, path: impl Into<String>) -> Self {
        self.changed_resources.push(path.into());
        self
    }

    /// Records the result of a named check.
    #[must_use]
    pub fn with_check(mut self, name: impl Into<String>, result: CheckResult) -> Self {
        self.check_results.insert(name.into(), result);
        self
    }

    /// Sets the review decision.
    #[must_use]
    pub const fn with_decision(mut self, decision: ReviewDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Sets the review rationale.
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Adds one piece of failing evidence.
    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    /// Returns the task the artifact answers.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the submitting worker.
    #[must_use]
    pub const fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Returns the role the worker claims.
    #[must_use]
    pub const fn role(&self) -> WorkerRole {
        self.role
    }

    /// Returns the summary.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Returns the raw changed resource paths.
    #[must_use]
    pub fn changed_resources(&self) -> &[String] {
        &self.changed_resources
    }

    /// Returns the reported checks keyed by name.
    #[must_use]
    pub const fn check_results(&self) -> &BTreeMap<String, CheckResult> {
        &self.check_results
    }

    /// Returns the review decision, if any.
    #[must_use]
    pub const fn decision(&self) -> Option<ReviewDecision> {
        self.decision
    }

    /// Returns the review rationale, if any.
    #[must_use]
    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }

    /// Returns the failing evidence.
    #[must_use]
    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }
}
