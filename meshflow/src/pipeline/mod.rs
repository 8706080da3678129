//! Stage sequencing.
//!
//! This module provides:
//! - `StageSequencer`, which runs stages forward (install) or backward
//!   (teardown, each stage replaced by its inverse)
//! - `SequenceReport` with per-stage results and the halt reason
//! - plan validation run before anything touches the cluster

#[cfg(test)]
mod integration_tests;
mod report;
mod sequencer;
mod validate;

pub use report::{Direction, Halt, SequenceReport};
pub use sequencer::StageSequencer;
pub use validate::validate_stages;
