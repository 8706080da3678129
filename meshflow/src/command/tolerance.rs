//! Allowlist of command rejections that are treated as success.
//!
//! Creating a namespace that already exists and deleting something that is
//! already gone are both idempotent outcomes, not failures. Every such case is
//! listed here, keyed by stage kind and verb, so the policy can be read in one
//! place.

use super::CommandOutput;
use crate::stages::StageKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The cluster verb a stage issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Create a resource.
    Create,
    /// Apply a manifest.
    Apply,
    /// Delete a resource.
    Delete,
    /// Run an arbitrary command.
    Run,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Apply => write!(f, "apply"),
            Self::Delete => write!(f, "delete"),
            Self::Run => write!(f, "run"),
        }
    }
}

/// One allowlisted rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceRule {
    /// Stage kind the rule applies to.
    pub kind: StageKind,
    /// Verb the rule applies to.
    pub verb: Verb,
    /// Any of these substrings in stderr makes the rejection tolerated.
    pub patterns: Vec<String>,
    /// Short label recorded in the stage result.
    pub label: String,
}

impl ToleranceRule {
    /// Creates a rule.
    #[must_use]
    pub fn new(kind: StageKind, verb: Verb, label: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            kind,
            verb,
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
            label: label.into(),
        }
    }

    fn matches(&self, output: &CommandOutput) -> bool {
        self.patterns
            .iter()
            .any(|p| output.stderr.contains(p.as_str()) || output.stdout.contains(p.as_str()))
    }
}

/// Table of tolerated rejections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceTable {
    rules: Vec<ToleranceRule>,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self {
            rules: vec![
                ToleranceRule::new(
                    StageKind::CreateNamespace,
                    Verb::Create,
                    "namespace-already-exists",
                    &["AlreadyExists", "already exists"],
                ),
                ToleranceRule::new(
                    StageKind::DeleteNamespace,
                    Verb::Delete,
                    "namespace-not-found",
                    &["NotFound", "not found"],
                ),
                ToleranceRule::new(
                    StageKind::DeleteManifest,
                    Verb::Delete,
                    "resource-not-found",
                    &["NotFound", "not found", "the server doesn't have a resource type"],
                ),
                ToleranceRule::new(
                    StageKind::DeleteCollection,
                    Verb::Delete,
                    "resource-type-gone",
                    &["No resources found", "the server doesn't have a resource type"],
                ),
            ],
        }
    }
}

impl ToleranceTable {
    /// Creates an empty table: every rejection is fatal.
    #[must_use]
    pub fn strict() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: ToleranceRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the rules.
    #[must_use]
    pub fn rules(&self) -> &[ToleranceRule] {
        &self.rules
    }

    /// Returns the label of the rule that tolerates this rejection, if any.
    ///
    /// Successful outputs never match.
    #[must_use]
    pub fn tolerated(&self, kind: StageKind, verb: Verb, output: &CommandOutput) -> Option<&str> {
        if output.is_success() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.kind == kind && rule.verb == verb && rule.matches(output))
            .map(|rule| rule.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_already_exists_is_tolerated() {
        let table = ToleranceTable::default();
        let output = CommandOutput::failure(
            1,
            "Error from server (AlreadyExists): project.project.openshift.io \"bookinfo\" already exists",
        );
        assert_eq!(
            table.tolerated(StageKind::CreateNamespace, Verb::Create, &output),
            Some("namespace-already-exists")
        );
    }

    #[test]
    fn test_delete_not_found_is_tolerated() {
        let table = ToleranceTable::default();
        let output = CommandOutput::failure(
            1,
            "Error from server (NotFound): error when deleting \"olm/kiali_subscription.yaml\"",
        );
        assert_eq!(
            table.tolerated(StageKind::DeleteManifest, Verb::Delete, &output),
            Some("resource-not-found")
        );
    }

    #[test]
    fn test_key_must_match_kind_and_verb() {
        let table = ToleranceTable::default();
        let output = CommandOutput::failure(1, "Error from server (NotFound): namespaces \"x\" not found");
        assert!(table
            .tolerated(StageKind::ApplyManifest, Verb::Apply, &output)
            .is_none());
    }

    #[test]
    fn test_success_never_matches() {
        let table = ToleranceTable::default();
        let output = CommandOutput::success("already exists");
        assert!(table
            .tolerated(StageKind::CreateNamespace, Verb::Create, &output)
            .is_none());
    }

    #[test]
    fn test_strict_table() {
        let table = ToleranceTable::strict();
        let output = CommandOutput::failure(1, "AlreadyExists");
        assert!(table
            .tolerated(StageKind::CreateNamespace, Verb::Create, &output)
            .is_none());
    }
}
