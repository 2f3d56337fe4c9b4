//! Lifecycle states, actors and the transition table.

use super::ParseTaskStateError;
use crate::routing::domain::WorkerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Submitted and waiting for a builder.
    Queued,
    /// A builder has been chosen for the current attempt.
    Assigned,
    /// The builder is working.
    Running,
    /// The builder's change is awaiting review.
    Verifying,
    /// The reviewer accepted the change.
    Approved,
    /// The reviewer sent the change back.
    Retry,
    /// The change has been merged.
    Merged,
    /// Completed successfully.
    Done,
    /// Handed to a human.
    Escalated,
    /// Cancelled or abandoned.
    Failed,
}

impl TaskState {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 10] = [
        Self::Queued,
        Self::Assigned,
        Self::Running,
        Self::Verifying,
        Self::Approved,
        Self::Retry,
        Self::Merged,
        Self::Done,
        Self::Escalated,
        Self::Failed,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Assigned => "ASSIGNED",
            Self::Running => "RUNNING",
            Self::Verifying => "VERIFYING",
            Self::Approved => "APPROVED",
            Self::Retry => "RETRY",
            Self::Merged => "MERGED",
            Self::Done => "DONE",
            Self::Escalated => "ESCALATED",
            Self::Failed => "FAILED",
        }
    }

    /// Returns whether the state ends the lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Escalated | Self::Failed)
    }

    /// Returns who may take the edge from `self` to `target`, or `None` when
    /// the edge is not in the transition table.
    #[must_use]
    pub const fn guard_for(self, target: Self) -> Option<EdgeGuard> {
        match (self, target) {
            (Self::Queued | Self::Retry, Self::Assigned)
            | (Self::Approved, Self::Merged)
            | (Self::Merged, Self::Done) => Some(EdgeGuard::Role(ActorRole::Orchestrator)),
            (Self::Assigned, Self::Running) | (Self::Running, Self::Verifying) => {
                Some(EdgeGuard::Role(ActorRole::Worker))
            }
            (Self::Verifying, Self::Approved | Self::Retry | Self::Escalated) => {
                Some(EdgeGuard::Role(ActorRole::Reviewer))
            }
            (from, Self::Failed) if !from.is_terminal() => Some(EdgeGuard::AnyActor),
            _ => None,
        }
    }

    /// Returns whether the edge from `self` to `target` is in the
    /// transition table, regardless of actor.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        self.guard_for(target).is_some()
    }
}

impl TryFrom<&str> for TaskState {
    type Error = ParseTaskStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| ParseTaskStateError(value.to_owned()))
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization rule attached to one edge of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeGuard {
    /// Only actors with this role may take the edge.
    Role(ActorRole),
    /// Any actor may take the edge.
    AnyActor,
}

impl EdgeGuard {
    /// Returns whether an actor with `role` passes the guard.
    #[must_use]
    pub fn permits(self, role: ActorRole) -> bool {
        match self {
            Self::Role(required) => required == role,
            Self::AnyActor => true,
        }
    }
}

/// Role under which an actor requests a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// The workflow engine itself.
    Orchestrator,
    /// The builder assigned to the current attempt.
    Worker,
    /// The reviewer assigned to the current attempt.
    Reviewer,
    /// A human operator.
    Operator,
}

impl ActorRole {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Worker => "worker",
            Self::Reviewer => "reviewer",
            Self::Operator => "operator",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Party responsible for a transition, as recorded in the history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    role: ActorRole,
    id: String,
}

impl Actor {
    /// Name recorded for engine-driven transitions.
    pub const ORCHESTRATOR_ID: &'static str = "orchestrator";

    /// Creates an actor.
    #[must_use]
    pub fn new(role: ActorRole, id: impl Into<String>) -> Self {
        Self {
            role,
            id: id.into(),
        }
    }

    /// The workflow engine.
    #[must_use]
    pub fn orchestrator() -> Self {
        Self::new(ActorRole::Orchestrator, Self::ORCHESTRATOR_ID)
    }

    /// A builder acting on its own attempt.
    #[must_use]
    pub fn worker(id: &WorkerId) -> Self {
        Self::new(ActorRole::Worker, id.as_str())
    }

    /// A reviewer acting on its own attempt.
    #[must_use]
    pub fn reviewer(id: &WorkerId) -> Self {
        Self::new(ActorRole::Reviewer, id.as_str())
    }

    /// A human operator.
    #[must_use]
    pub fn operator(name: impl Into<String>) -> Self {
        Self::new(ActorRole::Operator, name)
    }

    /// Returns the actor's role.
    #[must_use]
    pub const fn role(&self) -> ActorRole {
        self.role
    }

    /// Returns the actor's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}
