//! # Meshflow
//!
//! Provisioning of service-mesh test environments on a Kubernetes or
//! OpenShift cluster, driven through the cluster's command-line tool.
//!
//! Meshflow installs the mesh operators, a control plane, its member
//! namespaces and a disposable smoke workload, and tears them down again in
//! mirror order. Its core is:
//!
//! - **Stage sequencing**: ordered, fail-fast stages with an explicit
//!   allowlist of tolerated rejections
//! - **Readiness polling**: bounded, cancellable waits on status conditions,
//!   pod listings or resource absence
//! - **Condition extraction**: one isolated parser for the cluster tool's
//!   templated status output
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use meshflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = MeshflowConfig::from_path("meshflow.yaml")?;
//! let cli = config.cluster_cli();
//! let plan = config.into_plan()?;
//!
//! let orchestrator = Orchestrator::new(plan, Arc::new(ProcessRunner::new()), cli);
//! let report = orchestrator.install().await?;
//! println!("{report}");
//! std::process::exit(report.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod command;
pub mod conditions;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod pipeline;
pub mod poll;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{cancel_on_interrupt, CancellationToken};
    pub use crate::command::{ClusterCli, ClusterFlavor, CommandOutput, CommandRunner, ProcessRunner};
    pub use crate::conditions::{extract, ConditionCheck, ConditionSet};
    pub use crate::config::MeshflowConfig;
    pub use crate::errors::{CommandError, ConfigError, MeshflowError, ReadinessSpecError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::orchestrator::{
        Component, InstallReport, MeshInstallPlan, Orchestrator, RunOutcome, UninstallReport,
    };
    pub use crate::pipeline::{SequenceReport, StageSequencer};
    pub use crate::poll::{PollOutcome, ReadinessPoller, ReadinessSpec};
    pub use crate::stages::{Stage, StageResult, StageStatus, TimeoutPolicy};
}
