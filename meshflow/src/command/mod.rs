//! External command execution.
//!
//! This module provides:
//! - `CommandRunner`, the single seam through which the cluster is touched
//! - `ClusterCli` for rendering cluster tool argv
//! - the tolerated-failure allowlist

mod cluster;
mod runner;
mod tolerance;

pub use cluster::{ClusterCli, ClusterFlavor, CONDITION_TEMPLATE, IMAGE_JSONPATH};
pub use runner::{summarize_argv, CommandOutput, CommandRunner, ProcessRunner};
pub use tolerance::{ToleranceRule, ToleranceTable, Verb};
