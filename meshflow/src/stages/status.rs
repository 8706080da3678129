//! Stage kind, status and timeout policy enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Apply a manifest.
    ApplyManifest,
    /// Delete the resources a manifest declares.
    DeleteManifest,
    /// Create a namespace.
    CreateNamespace,
    /// Delete a namespace.
    DeleteNamespace,
    /// Delete every resource of a kind in a namespace.
    DeleteCollection,
    /// Run an arbitrary command line.
    RunExternalScript,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApplyManifest => write!(f, "apply-manifest"),
            Self::DeleteManifest => write!(f, "delete-manifest"),
            Self::CreateNamespace => write!(f, "create-namespace"),
            Self::DeleteNamespace => write!(f, "delete-namespace"),
            Self::DeleteCollection => write!(f, "delete-collection"),
            Self::RunExternalScript => write!(f, "run-external-script"),
        }
    }
}

/// The final status of an executed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Command accepted and readiness (if any) confirmed.
    Succeeded,
    /// Command rejected with an allowlisted, idempotent error.
    Tolerated,
    /// Readiness wait expired and the stage's policy said to continue.
    TimedOut,
    /// Command rejected, could not start, or an escalated timeout.
    Failed,
    /// The run was cancelled while this stage was executing.
    Cancelled,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "ok"),
            Self::Tolerated => write!(f, "tolerated"),
            Self::TimedOut => write!(f, "timed-out"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Tolerated)
    }

    /// Returns true if the sequence must stop after this stage.
    #[must_use]
    pub fn halts(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

/// What a stage does when its readiness wait times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Log a warning with the last snapshot and carry on.
    #[default]
    Continue,
    /// Fail the stage and halt the sequence.
    Escalate,
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}
