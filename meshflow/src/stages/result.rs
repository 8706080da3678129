//! Per-stage execution records.

use super::{StageKind, StageStatus};
use crate::errors::StageFailure;
use crate::poll::PollOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened when a stage ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub name: String,
    /// Stage kind.
    pub kind: StageKind,
    /// Final status.
    pub status: StageStatus,
    /// Rendered command line, payloads elided.
    pub command: String,
    /// Exit code of the stage command, if it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Captured stderr of a rejected command.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    /// Label of the tolerance rule that matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerated: Option<String>,
    /// Outcome of the readiness wait, if the stage has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollOutcome>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
}

impl StageResult {
    /// Creates a result with the given status and no details.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: StageKind,
        status: StageStatus,
        command: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            status,
            command: command.into(),
            exit_code: None,
            stderr: String::new(),
            tolerated: None,
            poll: None,
            error: None,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Returns true if the stage succeeded or was tolerated.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the failure diagnostic for a failed stage.
    ///
    /// The exit code is only carried when the command itself was rejected;
    /// an accepted command that failed its readiness wait has none.
    #[must_use]
    pub fn failure(&self) -> Option<StageFailure> {
        if self.status != StageStatus::Failed {
            return None;
        }
        let detail = self
            .error
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.stderr.clone());
        Some(StageFailure {
            stage: self.name.clone(),
            command: self.command.clone(),
            exit_code: self.exit_code.filter(|code| *code != 0),
            detail,
        })
    }

    /// One-line summary used in text reports.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!("[{}] {}", self.status, self.name);
        if let Some(ref label) = self.tolerated {
            line.push_str(&format!(" ({label})"));
        }
        match (&self.poll, &self.error) {
            (_, Some(error)) => line.push_str(&format!(": {error}")),
            (Some(outcome), None) => line.push_str(&format!(": {outcome}")),
            (None, None) => {}
        }
        line
    }
}
