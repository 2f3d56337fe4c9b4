//! Then steps for workflow BDD scenarios.

use super::world::{WorkflowWorld, run_async};
use orchestra::task::domain::TaskState;
use rstest_bdd_macros::then;

fn parse_state(state: &str) -> Result<TaskState, eyre::Report> {
    TaskState::try_from(state)
        .map_err(|err| eyre::eyre!("invalid expected state in scenario: {err}"))
}

#[then(r#"the task state is "{state}""#)]
fn task_state_is(world: &mut WorkflowWorld, state: String) -> Result<(), eyre::Report> {
    let expected = parse_state(&state)?;
    let task = world.task()?;
    eyre::ensure!(
        task.state() == expected,
        "expected state {expected}, found {}",
        task.state()
    );
    Ok(())
}

#[then(r#"the task was built by "{builder}" and reviewed by "{reviewer}""#)]
fn built_and_reviewed_by(
    world: &mut WorkflowWorld,
    builder: String,
    reviewer: String,
) -> Result<(), eyre::Report> {
    let task = world.task()?;
    let actual_builder = task.builder_id().map(|id| id.as_str().to_owned());
    let actual_reviewer = task.reviewer_id().map(|id| id.as_str().to_owned());
    eyre::ensure!(
        actual_builder.as_deref() == Some(builder.as_str()),
        "expected builder {builder}, found {actual_builder:?}"
    );
    eyre::ensure!(
        actual_reviewer.as_deref() == Some(reviewer.as_str()),
        "expected reviewer {reviewer}, found {actual_reviewer:?}"
    );
    Ok(())
}

#[then("the task is on attempt {attempt:u32}")]
fn task_is_on_attempt(world: &mut WorkflowWorld, attempt: u32) -> Result<(), eyre::Report> {
    let task = world.task()?;
    eyre::ensure!(
        task.attempt_count() == attempt,
        "expected attempt {attempt}, found {}",
        task.attempt_count()
    );
    Ok(())
}

#[then("no leases are held")]
fn no_leases_held(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let orchestrator = world.orchestrator()?;
    let leases = run_async(orchestrator.locks())?;
    eyre::ensure!(leases.is_empty(), "expected no leases, found {leases:?}");
    Ok(())
}

#[then(r#"the builder hand-off mentions "{text}""#)]
fn builder_handoff_mentions(world: &mut WorkflowWorld, text: String) -> Result<(), eyre::Report> {
    let task = world.task()?;
    let handoff = task
        .checkpoint()
        .handoff()
        .ok_or_else(|| eyre::eyre!("task has no pending hand-off"))?;
    eyre::ensure!(
        handoff.body().contains(&text),
        "hand-off does not mention {text:?}:\n{}",
        handoff.body()
    );
    Ok(())
}

#[then(r#"the submission fails with "{code}""#)]
fn submission_fails_with(world: &WorkflowWorld, code: String) -> Result<(), eyre::Report> {
    let error = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("expected the submission to fail"))?;
    eyre::ensure!(
        error.kind().as_str() == code,
        "expected {code}, got {} ({error})",
        error.kind().as_str()
    );
    Ok(())
}

#[then(r#"the last transition entered "{state}""#)]
fn last_transition_entered(world: &mut WorkflowWorld, state: String) -> Result<(), eyre::Report> {
    let expected = parse_state(&state)?;
    let task = world.task()?;
    let last = task
        .history()
        .last()
        .ok_or_else(|| eyre::eyre!("task has no transitions"))?;
    eyre::ensure!(
        last.to == expected,
        "expected last transition to {expected}, found {}",
        last.to
    );
    Ok(())
}

#[then("no reviewer is assigned")]
fn no_reviewer_assigned(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let task = world.task()?;
    eyre::ensure!(
        task.reviewer_id().is_none(),
        "expected no reviewer, found {:?}",
        task.reviewer_id()
    );
    Ok(())
}
