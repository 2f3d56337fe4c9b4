//! Hand-off documents rendered for the next worker.

use crate::artifact::{CheckResult, ReviewDecision};
use crate::lock::domain::ResourcePath;
use crate::routing::domain::{WorkerId, WorkerRole};
use crate::task::domain::TaskId;
use chrono::{DateTime, Utc};
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const BUILDER_TEMPLATE: &str = include_str!("../../templates/builder.md.j2");
const REVIEWER_TEMPLATE: &str = include_str!("../../templates/reviewer.md.j2");

/// Self-contained instructions for one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffDocument {
    role: WorkerRole,
    worker_id: WorkerId,
    attempt: u32,
    body: String,
    rendered_at: DateTime<Utc>,
}

impl HandoffDocument {
    /// Returns the role the document addresses.
    #[must_use]
    pub const fn role(&self) -> WorkerRole {
        self.role
    }

    /// Returns the addressed worker.
    #[must_use]
    pub const fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Returns the attempt the document belongs to.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the rendered Markdown.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns when the document was rendered.
    #[must_use]
    pub const fn rendered_at(&self) -> DateTime<Utc> {
        self.rendered_at
    }
}

/// Error raised when a hand-off template fails to render.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to render {role} hand-off: {reason}")]
pub struct HandoffRenderError {
    /// Role of the document being rendered.
    pub role: WorkerRole,
    /// Renderer message.
    pub reason: String,
}

/// Reviewer feedback carried into a later builder hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorFeedback {
    /// Attempt the feedback judged.
    pub attempt: u32,
    /// Reviewer who gave it.
    pub reviewer: WorkerId,
    /// Decision taken.
    pub decision: ReviewDecision,
    /// Rejection rationale.
    pub rationale: String,
    /// Failing evidence.
    pub evidence: Vec<String>,
}

/// Finished sub-task whose output a dependent builder builds on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrerequisiteSummary {
    /// Key of the finished sub-task.
    pub key: String,
    /// Summary its builder reported.
    pub summary: String,
    /// Resources it changed.
    pub changed_resources: Vec<String>,
}

/// Template input for a builder hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuilderBrief {
    /// Task being built.
    pub task_id: TaskId,
    /// Current attempt number.
    pub attempt: u32,
    /// Attempt ceiling.
    pub max_attempts: u32,
    /// Assigned builder.
    pub builder: WorkerId,
    /// Requirement text.
    pub requirement: String,
    /// Completion criteria.
    pub done_criteria: Vec<String>,
    /// Checks the builder must report.
    pub required_checks: Vec<String>,
    /// Resources the builder may change.
    pub resources: Vec<ResourcePath>,
    /// Feedback from earlier attempts, oldest first.
    pub prior_feedback: Vec<PriorFeedback>,
    /// Sub-tasks this one depends on, in dependency order.
    pub prerequisites: Vec<PrerequisiteSummary>,
}

#[derive(Debug, Serialize)]
struct CheckLine<'a> {
    name: &'a str,
    status: &'a str,
    detail: &'a str,
}

/// Template input for a reviewer hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerBrief {
    /// Task under review.
    pub task_id: TaskId,
    /// Current attempt number.
    pub attempt: u32,
    /// Assigned reviewer.
    pub reviewer: WorkerId,
    /// Builder whose change is reviewed.
    pub builder: WorkerId,
    /// Requirement text.
    pub requirement: String,
    /// Completion criteria.
    pub done_criteria: Vec<String>,
    /// Builder summary.
    pub summary: String,
    /// Resources the builder changed.
    pub changed_resources: Vec<String>,
    /// Checks the builder reported.
    pub check_results: BTreeMap<String, CheckResult>,
    /// Failing gates to weigh.
    pub gate_warnings: Vec<String>,
}

/// Renders the builder hand-off.
///
/// # Errors
///
/// Returns [`HandoffRenderError`] when the template fails to render.
pub fn render_builder_handoff(
    brief: &BuilderBrief,
    rendered_at: DateTime<Utc>,
) -> Result<HandoffDocument, HandoffRenderError> {
    let body = render(WorkerRole::Builder, BUILDER_TEMPLATE, brief)?;
    Ok(HandoffDocument {
        role: WorkerRole::Builder,
        worker_id: brief.builder.clone(),
        attempt: brief.attempt,
        body,
        rendered_at,
    })
}

/// Renders the reviewer hand-off embedding the builder's output.
///
/// # Errors
///
/// Returns [`HandoffRenderError`] when the template fails to render.
pub fn render_reviewer_handoff(
    brief: &ReviewerBrief,
    rendered_at: DateTime<Utc>,
) -> Result<HandoffDocument, HandoffRenderError> {
    let check_results: Vec<CheckLine<'_>> = brief
        .check_results
        .iter()
        .map(|(name, result)| CheckLine {
            name,
            status: result.status.as_str(),
            detail: result.detail.trim(),
        })
        .collect();
    let context = minijinja::context! {
        task_id => brief.task_id.to_string(),
        attempt => brief.attempt,
        reviewer => brief.reviewer.as_str(),
        builder => brief.builder.as_str(),
        requirement => brief.requirement.as_str(),
        done_criteria => &brief.done_criteria,
        summary => brief.summary.as_str(),
        changed_resources => &brief.changed_resources,
        check_results => check_results,
        gate_warnings => &brief.gate_warnings,
    };
    let body = render(WorkerRole::Reviewer, REVIEWER_TEMPLATE, &context)?;
    Ok(HandoffDocument {
        role: WorkerRole::Reviewer,
        worker_id: brief.reviewer.clone(),
        attempt: brief.attempt,
        body,
        rendered_at,
    })
}

fn render(
    role: WorkerRole,
    template: &str,
    context: &impl Serialize,
) -> Result<String, HandoffRenderError> {
    let environment = Environment::new();
    environment
        .render_str(template, context)
        .map_err(|error| HandoffRenderError {
            role,
            reason: error.to_string(),
        })
}
