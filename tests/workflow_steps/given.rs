//! Given steps for workflow BDD scenarios.

use super::world::{WorkflowWorld, run_async};
use eyre::WrapErr;
use orchestra::orchestrator::SubmitTaskRequest;
use rstest_bdd_macros::given;

#[given(r#"a worker "{id}" offering "{capabilities}""#)]
fn worker_offering(
    world: &mut WorkflowWorld,
    id: String,
    capabilities: String,
) -> Result<(), eyre::Report> {
    world
        .add_worker(&id, &capabilities)
        .wrap_err("register scenario worker")
}

#[given(r#"a task requiring "{capability}" on "{resource}" has been submitted"#)]
fn task_submitted(
    world: &mut WorkflowWorld,
    capability: String,
    resource: String,
) -> Result<(), eyre::Report> {
    let request = SubmitTaskRequest::new("Return 204 for empty orders", [capability])
        .with_resources([resource])
        .with_done_criteria(["Empty orders return 204"]);
    let orchestrator = world.orchestrator()?;
    let task_id = run_async(orchestrator.submit_task(request)).wrap_err("submit scenario task")?;
    world.task_id = Some(task_id);
    Ok(())
}

#[given("the builder has submitted passing checks")]
fn builder_has_submitted(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    world.submit_passing_build()?;
    if let Some(error) = world.last_error.take() {
        return Err(eyre::Report::new(error).wrap_err("builder artifact rejected"));
    }
    Ok(())
}
