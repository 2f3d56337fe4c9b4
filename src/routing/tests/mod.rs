//! Unit tests for capability routing.
