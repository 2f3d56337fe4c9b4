//! Unit tests for lease management.
