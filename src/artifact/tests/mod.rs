//! Unit tests for artifact validation and hand-off rendering.
