//! Unit tests for the task module.

mod service_tests;
mod state_transition_tests;
