//! Error types for meshflow.
//!
//! Stage-level failures (a rejected `apply`, a timed-out wait) are recorded in
//! the run report rather than returned as errors. The types here cover what
//! stops a run before or outside the stage pipeline: malformed readiness
//! specs, configuration problems, a missing cluster session, and process
//! startup failures.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for meshflow operations.
#[derive(Debug, Error)]
pub enum MeshflowError {
    /// A readiness spec failed validation.
    #[error("{0}")]
    MalformedReadinessSpec(#[from] ReadinessSpecError),

    /// The stage plan or configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The external command could not be started.
    #[error("{0}")]
    Command(#[from] CommandError),

    /// A prerequisite (cluster tool, logged-in session) is missing.
    #[error("Missing prerequisite: {what}: {detail}")]
    MissingPrerequisite {
        /// What is missing.
        what: String,
        /// Captured diagnostic output.
        detail: String,
    },

    /// The run was cancelled.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeshflowError {
    /// Creates a missing prerequisite error.
    #[must_use]
    pub fn missing_prerequisite(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MissingPrerequisite {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

impl From<serde_json::Error> for MeshflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure to run an external command at all.
///
/// A nonzero exit status is not an error; see [`crate::command::CommandOutput`].
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be spawned (binary missing, permission denied).
    #[error("failed to start `{program}`: {source}")]
    Startup {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The process started but its pipes could not be driven.
    #[error("I/O error while running `{program}`: {source}")]
    Io {
        /// Program being run.
        program: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The argv was empty.
    #[error("empty command line")]
    EmptyArgv,
}

impl CommandError {
    /// Creates a startup error.
    #[must_use]
    pub fn startup(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Startup {
            program: program.into(),
            source,
        }
    }
}

/// Error raised when a readiness spec is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessSpecError {
    /// Poll interval must be positive.
    #[error("readiness spec for '{resource}': poll interval must be greater than zero")]
    ZeroInterval {
        /// Resource description.
        resource: String,
    },

    /// Timeout must be at least one poll interval.
    #[error(
        "readiness spec for '{resource}': timeout {timeout:?} is shorter than poll interval {interval:?}"
    )]
    TimeoutShorterThanInterval {
        /// Resource description.
        resource: String,
        /// Configured timeout.
        timeout: Duration,
        /// Configured poll interval.
        interval: Duration,
    },

    /// Condition checks need a type and a status to compare against.
    #[error("readiness spec for '{resource}': condition type and required status must be set")]
    EmptyCondition {
        /// Resource description.
        resource: String,
    },

    /// Condition checks query a single named resource.
    #[error("readiness spec for '{resource}': condition checks need a named resource")]
    UnnamedResource {
        /// Resource description.
        resource: String,
    },
}

/// Error raised when configuration or a stage plan is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// Stages or config keys involved.
    pub subjects: Vec<String>,
    /// Optional fix hint.
    pub fix_hint: Option<String>,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            subjects: Vec::new(),
            fix_hint: None,
        }
    }

    /// Sets the subjects involved.
    #[must_use]
    pub fn with_subjects(mut self, subjects: Vec<String>) -> Self {
        self.subjects = subjects;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("subjects".to_string(), serde_json::json!(self.subjects));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        map
    }
}

/// Diagnostic attached to a failed stage, enough for an operator to resume by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Stage that failed.
    pub stage: String,
    /// Rendered command line.
    pub command: String,
    /// Exit code, if the process ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Captured stderr or the failure message.
    pub detail: String,
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage '{}' failed running `{}`", self.stage, self.command)?;
        if let Some(code) = self.exit_code {
            write!(f, " (exit {code})")?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail.trim())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_to_dict() {
        let err = ConfigError::new("bad config")
            .with_subjects(vec!["control_plane.name".to_string()])
            .with_fix_hint("set control_plane.name");

        let dict = err.to_dict();
        assert_eq!(dict.get("message").unwrap(), "bad config");
        assert_eq!(dict.get("fix_hint").unwrap(), "set control_plane.name");
    }

    #[test]
    fn test_readiness_spec_error_display() {
        let err = ReadinessSpecError::TimeoutShorterThanInterval {
            resource: "smcp/basic".to_string(),
            timeout: Duration::from_secs(1),
            interval: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("smcp/basic"));
        assert!(err.to_string().contains("shorter than poll interval"));
    }

    #[test]
    fn test_missing_prerequisite_display() {
        let err = MeshflowError::missing_prerequisite("cluster session", "error: You must be logged in");
        assert!(err.to_string().contains("cluster session"));
        assert!(err.to_string().contains("logged in"));
    }

    #[test]
    fn test_command_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = CommandError::startup("oc", io);
        assert!(err.to_string().contains("failed to start `oc`"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_stage_failure_display() {
        let failure = StageFailure {
            stage: "apply-control-plane".to_string(),
            command: "oc apply -n istio-system -f cr.yaml".to_string(),
            exit_code: Some(1),
            detail: "error: no matches for kind\n".to_string(),
        };
        let text = failure.to_string();
        assert!(text.contains("apply-control-plane"));
        assert!(text.contains("(exit 1)"));
        assert!(text.ends_with("no matches for kind"));
    }
}
