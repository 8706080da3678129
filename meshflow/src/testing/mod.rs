//! Testing utilities.
//!
//! This module provides:
//! - `ScriptedRunner`, a [`crate::command::CommandRunner`] that answers from
//!   a script and records every call
//! - a sample install plan mirroring a default OpenShift Service Mesh setup

mod fixtures;
mod runner;

pub use fixtures::sample_plan;
pub use runner::{RecordedCall, ScriptedRunner};
