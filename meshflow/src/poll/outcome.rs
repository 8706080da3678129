//! Poll outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a readiness wait ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// The predicate held.
    Satisfied {
        /// Queries issued.
        attempts: u32,
        /// Time spent waiting.
        elapsed_ms: u64,
    },
    /// The budget ran out.
    TimedOut {
        /// Queries issued.
        attempts: u32,
        /// Time spent waiting.
        elapsed_ms: u64,
        /// The last observed state.
        last_snapshot: String,
    },
    /// The query itself could not be run.
    CommandFailed {
        /// Queries issued, including the one that failed.
        attempts: u32,
        /// Why the query could not run.
        error: String,
    },
    /// The run was cancelled during the wait.
    Cancelled {
        /// Queries issued.
        attempts: u32,
        /// Cancellation reason.
        reason: String,
    },
}

impl PollOutcome {
    /// Returns true if the predicate held.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Returns the number of queries issued.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Satisfied { attempts, .. }
            | Self::TimedOut { attempts, .. }
            | Self::CommandFailed { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied { attempts, elapsed_ms } => {
                write!(f, "ready after {attempts} attempt(s), {elapsed_ms}ms")
            }
            Self::TimedOut {
                attempts,
                elapsed_ms,
                last_snapshot,
            } => {
                write!(f, "not ready after {attempts} attempt(s), {elapsed_ms}ms")?;
                if !last_snapshot.is_empty() {
                    write!(f, "; last seen: {}", last_snapshot.replace('\n', " | "))?;
                }
                Ok(())
            }
            Self::CommandFailed { error, .. } => write!(f, "query failed: {error}"),
            Self::Cancelled { reason, .. } => write!(f, "cancelled: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_tagged() {
        let outcome = PollOutcome::TimedOut {
            attempts: 48,
            elapsed_ms: 240_000,
            last_snapshot: "Installed=False".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "timed_out");
        assert_eq!(json["attempts"], 48);
        assert_eq!(json["last_snapshot"], "Installed=False");
    }

    #[test]
    fn test_display_flattens_snapshot() {
        let outcome = PollOutcome::TimedOut {
            attempts: 2,
            elapsed_ms: 10,
            last_snapshot: "a\nb".to_string(),
        };
        assert_eq!(outcome.to_string(), "not ready after 2 attempt(s), 10ms; last seen: a | b");
    }

    #[test]
    fn test_attempts() {
        let outcome = PollOutcome::Cancelled {
            attempts: 3,
            reason: "interrupted".to_string(),
        };
        assert_eq!(outcome.attempts(), 3);
        assert!(!outcome.is_satisfied());
    }
}
