//! When steps for workflow BDD scenarios.

use super::world::WorkflowWorld;
use orchestra::artifact::{Artifact, ReviewDecision};
use rstest_bdd_macros::when;

#[when("the builder submits passing checks")]
fn builder_submits(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    world.submit_passing_build()
}

#[when(r#"the reviewer decides "{decision}" with rationale "{rationale}""#)]
fn reviewer_decides(
    world: &mut WorkflowWorld,
    decision: String,
    rationale: String,
) -> Result<(), eyre::Report> {
    let parsed: ReviewDecision = serde_json::from_value(serde_json::Value::String(decision))?;
    let task = world.task()?;
    let reviewer = task
        .reviewer_id()
        .cloned()
        .ok_or_else(|| eyre::eyre!("task has no reviewer"))?;
    let mut artifact = Artifact::reviewer(task.id(), reviewer, parsed, rationale.as_str());
    if parsed != ReviewDecision::Approved {
        artifact = artifact.with_evidence(rationale);
    }
    world.apply(artifact)
}
