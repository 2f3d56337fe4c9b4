//! Workflow checkpoint persisted with each task.
//!
//! A checkpoint is written at every suspension point and holds everything
//! needed to resume the cycle in a fresh process: the phase, the leases the
//! task holds, all reviewer feedback so far, the accepted builder artifact
//! awaiting review and the hand-off document issued to the awaited worker.

use crate::artifact::{Artifact, HandoffDocument, ReviewDecision};
use crate::lock::domain::{FencingToken, Lease, ResourcePath};
use crate::routing::domain::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the plan, build, review and decide cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    /// Waiting to route a builder and take leases.
    #[default]
    Plan,
    /// Suspended until the builder submits.
    Build,
    /// Suspended until the reviewer submits.
    Review,
    /// Applying an approval (merge pending).
    Decide,
    /// The cycle has ended.
    Finished,
}

impl WorkflowPhase {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Build => "build",
            Self::Review => "review",
            Self::Decide => "decide",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lease recorded in the checkpoint so it can be renewed or released
/// after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldLease {
    /// Leased resource.
    pub resource: ResourcePath,
    /// Token proving ownership.
    pub token: FencingToken,
    /// Expiry at the time of the checkpoint.
    pub expires_at: DateTime<Utc>,
}

impl From<&Lease> for HeldLease {
    fn from(lease: &Lease) -> Self {
        Self {
            resource: lease.resource().clone(),
            token: lease.token(),
            expires_at: lease.expires_at(),
        }
    }
}

/// Reviewer judgement carried forward to later attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    /// Attempt that was judged.
    pub attempt: u32,
    /// Reviewer who judged it.
    pub reviewer: WorkerId,
    /// Decision as applied (after any forced escalation).
    pub decision: ReviewDecision,
    /// Reviewer rationale.
    pub rationale: String,
    /// Failing evidence.
    pub evidence: Vec<String>,
    /// When the decision was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Durable snapshot of the workflow cycle for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    phase: WorkflowPhase,
    #[serde(default)]
    held_leases: Vec<HeldLease>,
    #[serde(default)]
    feedback: Vec<ReviewFeedback>,
    #[serde(default)]
    builder_artifact: Option<Artifact>,
    #[serde(default)]
    gate_warnings: Vec<String>,
    #[serde(default)]
    handoff: Option<HandoffDocument>,
}

impl Checkpoint {
    /// Creates the checkpoint of a task that has not been planned.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// Returns the leases the task holds.
    #[must_use]
    pub fn held_leases(&self) -> &[HeldLease] {
        &self.held_leases
    }

    /// Returns the lease held on `resource`, if any.
    #[must_use]
    pub fn lease_for(&self, resource: &ResourcePath) -> Option<&HeldLease> {
        self.held_leases
            .iter()
            .find(|held| &held.resource == resource)
    }

    /// Returns all reviewer feedback, oldest first.
    #[must_use]
    pub fn feedback(&self) -> &[ReviewFeedback] {
        &self.feedback
    }

    /// Returns the accepted builder artifact awaiting review.
    #[must_use]
    pub const fn builder_artifact(&self) -> Option<&Artifact> {
        self.builder_artifact.as_ref()
    }

    /// Returns gate warnings raised by the accepted builder artifact.
    #[must_use]
    pub fn gate_warnings(&self) -> &[String] {
        &self.gate_warnings
    }

    /// Returns the hand-off issued to the awaited worker.
    #[must_use]
    pub const fn handoff(&self) -> Option<&HandoffDocument> {
        self.handoff.as_ref()
    }

    /// Moves the cycle to `phase`.
    pub const fn enter(&mut self, phase: WorkflowPhase) {
        self.phase = phase;
    }

    /// Replaces the recorded leases.
    pub fn set_held_leases(&mut self, leases: Vec<HeldLease>) {
        self.held_leases = leases;
    }

    /// Removes and returns the recorded leases.
    pub fn take_held_leases(&mut self) -> Vec<HeldLease> {
        std::mem::take(&mut self.held_leases)
    }

    /// Appends reviewer feedback.
    pub fn push_feedback(&mut self, feedback: ReviewFeedback) {
        self.feedback.push(feedback);
    }

    /// Records the accepted builder artifact with its gate warnings, or
    /// clears both.
    pub fn set_builder_artifact(&mut self, artifact: Option<Artifact>, gate_warnings: Vec<String>) {
        self.builder_artifact = artifact;
        self.gate_warnings = gate_warnings;
    }

    /// Replaces the pending hand-off document.
    pub fn set_handoff(&mut self, handoff: Option<HandoffDocument>) {
        self.handoff = handoff;
    }
}
