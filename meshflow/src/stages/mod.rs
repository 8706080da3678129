//! Stages: the unit of install and teardown work.
//!
//! A stage issues one cluster command, classifies the response against the
//! tolerance table, and optionally waits for readiness.

mod result;
mod stage;
mod status;

pub use result::StageResult;
pub use stage::{ManifestSource, Stage, StageAction};
pub use status::{StageKind, StageStatus, TimeoutPolicy};
