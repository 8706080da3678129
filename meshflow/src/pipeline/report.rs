//! Sequence reports.

use crate::stages::{StageResult, StageStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a sequence runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Install order.
    Forward,
    /// Reverse order, each stage replaced by its inverse.
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Why a sequence stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Halt {
    /// Stage that stopped the sequence.
    pub stage: String,
    /// Its status: `failed` or `cancelled`.
    pub status: StageStatus,
    /// Human-readable reason.
    pub reason: String,
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "halted at '{}' ({}): {}", self.stage, self.status, self.reason)
    }
}

/// Ordered stage results plus the reason the sequence halted, if it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Direction of the sequence.
    pub direction: Direction,
    /// One result per attempted stage, in execution order.
    pub results: Vec<StageResult>,
    /// Set when a stage failed or the run was cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<Halt>,
}

impl SequenceReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            results: Vec::new(),
            halted: None,
        }
    }

    /// Returns true if the sequence ran to the end.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.halted.is_none()
    }

    /// Returns true if the sequence was stopped by cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.halted
            .as_ref()
            .is_some_and(|h| h.status == StageStatus::Cancelled)
    }

    /// Returns true if any stage timed out under a continue policy.
    #[must_use]
    pub fn has_timeouts(&self) -> bool {
        self.results.iter().any(|r| r.status == StageStatus::TimedOut)
    }

    /// Returns the result for a stage.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    /// Appends a later sequence of the same run.
    ///
    /// The first halt is kept.
    pub fn absorb(&mut self, other: Self) {
        self.results.extend(other.results);
        if self.halted.is_none() {
            self.halted = other.halted;
        }
    }
}
