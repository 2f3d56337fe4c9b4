//! Worker artifacts and engine hand-off documents.
//!
//! Workers exchange structured records with the orchestrator through a
//! shared directory rather than a live protocol. This module defines the
//! submitted [`Artifact`], the structural checks applied before the workflow
//! accepts one, and the self-contained [`HandoffDocument`] the workflow
//! renders for the next worker.

mod domain;
mod handoff;
mod validation;

pub use domain::{Artifact, CheckResult, CheckStatus, ReviewDecision};
pub use handoff::{
    BuilderBrief, HandoffDocument, HandoffRenderError, PrerequisiteSummary, PriorFeedback,
    ReviewerBrief,
    render_builder_handoff, render_reviewer_handoff,
};
pub use validation::{
    ArtifactExpectation, ArtifactValidationError, BuildReport, validate_builder_artifact,
    validate_reviewer_artifact,
};

#[cfg(test)]
mod tests;
