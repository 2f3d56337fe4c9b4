//! Unit tests for the workflow engine and its adapters.

mod adapter_tests;
mod support;
