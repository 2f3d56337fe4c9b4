//! Unit tests for the transition table and its actor guards.

use crate::routing::domain::{CapabilitySet, WorkerId};
use crate::task::domain::{
    Actor, ActorRole, EdgeGuard, Task, TaskDomainError, TaskSpec, TaskState,
};
use crate::test_support::ManualClock;
use rstest::rstest;

/// Route from `QUEUED` that reaches each state.
fn route_to(state: TaskState) -> &'static [TaskState] {
    use TaskState::{Approved, Assigned, Done, Escalated, Failed, Merged, Retry, Running, Verifying};
    match state {
        TaskState::Queued => &[],
        Assigned => &[Assigned],
        Running => &[Assigned, Running],
        Verifying => &[Assigned, Running, Verifying],
        Approved => &[Assigned, Running, Verifying, Approved],
        Retry => &[Assigned, Running, Verifying, Retry],
        Escalated => &[Assigned, Running, Verifying, Escalated],
        Merged => &[Assigned, Running, Verifying, Approved, Merged],
        Done => &[Assigned, Running, Verifying, Approved, Merged, Done],
        Failed => &[Failed],
    }
}

/// An actor the edge guard admits, or an operator where no edge exists.
fn permitted_actor(from: TaskState, to: TaskState) -> Actor {
    let worker = WorkerId::new("alpha").expect("valid worker id");
    match from.guard_for(to) {
        Some(EdgeGuard::Role(ActorRole::Orchestrator)) => Actor::orchestrator(),
        Some(EdgeGuard::Role(ActorRole::Worker)) => Actor::worker(&worker),
        Some(EdgeGuard::Role(ActorRole::Reviewer)) => Actor::reviewer(&worker),
        Some(EdgeGuard::Role(ActorRole::Operator) | EdgeGuard::AnyActor) | None => {
            Actor::operator("ops")
        }
    }
}

fn task_in(state: TaskState, clock: &ManualClock) -> Task {
    let capabilities = CapabilitySet::parse(["rust"]).expect("valid capabilities");
    let spec = TaskSpec::new("Fix the parser", capabilities, 3).expect("valid spec");
    let mut task = Task::new(spec, clock);
    for &next in route_to(state) {
        let actor = permitted_actor(task.state(), next);
        task.transition(next, actor, "setup", clock)
            .expect("route follows the table");
    }
    assert_eq!(task.state(), state);
    task
}

#[rstest]
#[case(TaskState::Queued, TaskState::Assigned, true)]
#[case(TaskState::Queued, TaskState::Running, false)]
#[case(TaskState::Queued, TaskState::Done, false)]
#[case(TaskState::Assigned, TaskState::Running, true)]
#[case(TaskState::Assigned, TaskState::Verifying, false)]
#[case(TaskState::Running, TaskState::Verifying, true)]
#[case(TaskState::Running, TaskState::Approved, false)]
#[case(TaskState::Verifying, TaskState::Approved, true)]
#[case(TaskState::Verifying, TaskState::Retry, true)]
#[case(TaskState::Verifying, TaskState::Escalated, true)]
#[case(TaskState::Verifying, TaskState::Merged, false)]
#[case(TaskState::Approved, TaskState::Merged, true)]
#[case(TaskState::Approved, TaskState::Done, false)]
#[case(TaskState::Retry, TaskState::Assigned, true)]
#[case(TaskState::Retry, TaskState::Running, false)]
#[case(TaskState::Merged, TaskState::Done, true)]
#[case(TaskState::Merged, TaskState::Approved, false)]
#[case(TaskState::Done, TaskState::Queued, false)]
#[case(TaskState::Escalated, TaskState::Retry, false)]
#[case(TaskState::Failed, TaskState::Queued, false)]
fn can_transition_to_returns_expected(
    #[case] from: TaskState,
    #[case] to: TaskState,
    #[case] expected: bool,
) {
    assert_eq!(from.can_transition_to(to), expected);
}

#[rstest]
fn every_pair_follows_the_table() {
    let clock = ManualClock::new();
    for from in TaskState::ALL {
        for to in TaskState::ALL {
            let mut task = task_in(from, &clock);
            let before = task.clone();
            let result = task.transition(to, permitted_actor(from, to), "grid", &clock);

            if from.can_transition_to(to) {
                let record = result.expect("listed edge is taken");
                assert_eq!((record.from, record.to), (from, to), "{from} -> {to}");
                assert_eq!(task.state(), to, "{from} -> {to}");
                assert_eq!(task.version(), before.version().next(), "{from} -> {to}");
            } else {
                assert_eq!(
                    result,
                    Err(TaskDomainError::InvalidTransition {
                        task_id: task.id(),
                        from,
                        to,
                    }),
                    "{from} -> {to}"
                );
                assert_eq!(task, before, "{from} -> {to} left a trace");
            }
        }
    }
}

#[rstest]
fn every_live_state_may_fail() {
    for state in TaskState::ALL {
        let expected = !state.is_terminal();
        assert_eq!(
            state.guard_for(TaskState::Failed),
            expected.then_some(EdgeGuard::AnyActor),
            "{state} -> FAILED"
        );
    }
}

#[rstest]
fn terminal_states_have_no_outgoing_edges() {
    let terminal: Vec<TaskState> = TaskState::ALL
        .into_iter()
        .filter(|state| state.is_terminal())
        .collect();
    assert_eq!(
        terminal,
        vec![TaskState::Done, TaskState::Escalated, TaskState::Failed]
    );
    for from in terminal {
        for to in TaskState::ALL {
            assert!(!from.can_transition_to(to), "{from} -> {to}");
        }
    }
}

#[rstest]
fn no_state_transitions_to_itself() {
    for state in TaskState::ALL {
        assert!(!state.can_transition_to(state), "{state} -> {state}");
    }
}

#[rstest]
#[case(TaskState::Queued, TaskState::Assigned, ActorRole::Orchestrator)]
#[case(TaskState::Retry, TaskState::Assigned, ActorRole::Orchestrator)]
#[case(TaskState::Assigned, TaskState::Running, ActorRole::Worker)]
#[case(TaskState::Running, TaskState::Verifying, ActorRole::Worker)]
#[case(TaskState::Verifying, TaskState::Approved, ActorRole::Reviewer)]
#[case(TaskState::Verifying, TaskState::Retry, ActorRole::Reviewer)]
#[case(TaskState::Verifying, TaskState::Escalated, ActorRole::Reviewer)]
#[case(TaskState::Approved, TaskState::Merged, ActorRole::Orchestrator)]
#[case(TaskState::Merged, TaskState::Done, ActorRole::Orchestrator)]
fn guarded_edges_admit_one_role(
    #[case] from: TaskState,
    #[case] to: TaskState,
    #[case] role: ActorRole,
) {
    let guard = from.guard_for(to).expect("edge exists");
    assert_eq!(guard, EdgeGuard::Role(role));
    for other in [
        ActorRole::Orchestrator,
        ActorRole::Worker,
        ActorRole::Reviewer,
        ActorRole::Operator,
    ] {
        assert_eq!(guard.permits(other), other == role, "{other} on {from} -> {to}");
    }
}

#[rstest]
#[case("QUEUED", TaskState::Queued)]
#[case(" verifying ", TaskState::Verifying)]
#[case("Escalated", TaskState::Escalated)]
fn state_parses_case_insensitively(#[case] raw: &str, #[case] expected: TaskState) {
    assert_eq!(TaskState::try_from(raw), Ok(expected));
}

#[rstest]
fn unknown_state_is_rejected() {
    assert!(TaskState::try_from("PAUSED").is_err());
}
