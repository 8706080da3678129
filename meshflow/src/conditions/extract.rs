//! Condition extraction from templated query output.
//!
//! Input is one line per condition:
//!
//! ```text
//! Installed=True, reason=InstallSuccessful, message=Successfully installed all mesh components
//! Reconciled=True, reason=InstallSuccessful, message=Successfully installed all mesh components
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

const REASON_DELIM: &str = ", reason=";
const MESSAGE_DELIM: &str = ", message=";
/// Rendered by go templates for absent fields.
const NO_VALUE: &str = "<no value>";

/// One status condition reported by a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Condition type, e.g. `Installed`.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Condition status, e.g. `True`.
    pub status: String,
    /// Machine-readable reason.
    #[serde(default)]
    pub reason: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}, reason={}, message={}",
            self.condition_type, self.status, self.reason, self.message
        )
    }
}

/// Conditions parsed from a single query, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    /// Returns the condition of the given type.
    #[must_use]
    pub fn get(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Returns the number of conditions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Returns true if no condition was parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Iterates over the conditions.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    /// Renders the set back into one line per condition.
    #[must_use]
    pub fn render(&self) -> String {
        self.conditions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn upsert(&mut self, condition: Condition) {
        // The cluster may re-emit a condition across reconciliation passes.
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
    }
}

/// The condition a readiness check waits for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCheck {
    /// Condition type, e.g. `Installed` or `Ready`.
    pub condition_type: String,
    /// Required status, e.g. `True`.
    pub required_status: String,
    /// When set, the reason or message must contain this substring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_reason: Option<String>,
}

impl ConditionCheck {
    /// Creates a check for `condition_type == required_status`.
    #[must_use]
    pub fn new(condition_type: impl Into<String>, required_status: impl Into<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            required_status: required_status.into(),
            required_reason: None,
        }
    }

    /// Requires the reason or message to contain `reason`.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.required_reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ConditionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.condition_type, self.required_status)?;
        if let Some(ref reason) = self.required_reason {
            write!(f, " (reason contains '{reason}')")?;
        }
        Ok(())
    }
}

/// Parses rendered condition lines.
///
/// Never fails: empty input gives an empty set, lines without a
/// `type=status` head are skipped, and a repeated type replaces the earlier
/// entry.
#[must_use]
pub fn extract(raw: &str) -> ConditionSet {
    let mut set = ConditionSet::default();
    for line in raw.lines() {
        if let Some(condition) = parse_line(line) {
            set.upsert(condition);
        }
    }
    set
}

fn parse_line(line: &str) -> Option<Condition> {
    // Shell-quoted templates leave stray quotes around the output.
    let line = line.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if line.is_empty() {
        return None;
    }

    let (condition_type, rest) = line.split_once('=')?;
    let condition_type = condition_type.trim();
    if condition_type.is_empty() || condition_type.contains(char::is_whitespace) {
        return None;
    }

    let (status, reason, message) = match rest.split_once(REASON_DELIM) {
        Some((status, tail)) => match tail.split_once(MESSAGE_DELIM) {
            Some((reason, message)) => (status, reason, message),
            None => (status, tail, ""),
        },
        None => match rest.split_once(MESSAGE_DELIM) {
            Some((status, message)) => (status, "", message),
            None => (rest.split(',').next().unwrap_or(rest), "", ""),
        },
    };

    let status = status.trim();
    if status.is_empty() {
        return None;
    }

    Some(Condition {
        condition_type: condition_type.to_string(),
        status: status.to_string(),
        reason: clean(reason),
        message: clean(message),
    })
}

fn clean(field: &str) -> String {
    let field = field.trim();
    if field == NO_VALUE {
        String::new()
    } else {
        field.to_string()
    }
}

/// Returns true if `set` contains a condition matching `check`.
#[must_use]
pub fn is_satisfied(set: &ConditionSet, check: &ConditionCheck) -> bool {
    let Some(condition) = set.get(&check.condition_type) else {
        return false;
    };
    if condition.status != check.required_status {
        return false;
    }
    match check.required_reason.as_deref() {
        None | Some("") => true,
        Some(needle) => condition.reason.contains(needle) || condition.message.contains(needle),
    }
}
