//! Event payloads.

use crate::poll::PollOutcome;
use crate::stages::{Stage, StageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// The event type (e.g. `stage.started`).
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl RunEvent {
    /// Creates an event with no data.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns a string data field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// `run.started`.
    #[must_use]
    pub fn run_started(run_id: &str, operation: &str) -> Self {
        Self::new("run.started")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("operation", serde_json::json!(operation))
    }

    /// `run.finished`.
    #[must_use]
    pub fn run_finished(run_id: &str, outcome: &str) -> Self {
        Self::new("run.finished")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("outcome", serde_json::json!(outcome))
    }

    /// `stage.started`.
    #[must_use]
    pub fn stage_started(stage: &Stage, command: &str) -> Self {
        Self::new("stage.started")
            .add_data("stage", serde_json::json!(stage.name))
            .add_data("kind", serde_json::json!(stage.kind().to_string()))
            .add_data("command", serde_json::json!(command))
    }

    /// `stage.completed`, or `stage.failed` for halting statuses.
    #[must_use]
    pub fn stage_finished(result: &StageResult) -> Self {
        let event_type = if result.status.halts() {
            "stage.failed"
        } else {
            "stage.completed"
        };
        let mut event = Self::new(event_type)
            .add_data("stage", serde_json::json!(result.name))
            .add_data("status", serde_json::json!(result.status.to_string()))
            .add_data("duration_ms", serde_json::json!(result.duration_ms()));
        if let Some(ref error) = result.error {
            event = event.add_data("error", serde_json::json!(error));
        }
        event
    }

    /// `poll.finished`.
    #[must_use]
    pub fn poll_finished(stage: &str, outcome: &PollOutcome) -> Self {
        Self::new("poll.finished")
            .add_data("stage", serde_json::json!(stage))
            .add_data(
                "outcome",
                serde_json::to_value(outcome).unwrap_or(serde_json::Value::Null),
            )
    }
}
