//! Step definitions for the build and review workflow scenarios.

pub mod world;

mod given;
mod then;
mod when;
