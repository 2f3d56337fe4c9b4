//! Unit tests for the orchestrator facade.

mod facade_tests;
