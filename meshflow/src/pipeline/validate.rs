//! Stage plan validation.

use crate::errors::{ConfigError, MeshflowError};
use crate::stages::{Stage, StageAction};
use std::collections::HashSet;

/// Checks a stage list before anything is run.
///
/// # Errors
///
/// Returns [`MeshflowError::Config`] for duplicate or empty stage names and
/// empty external commands, and [`MeshflowError::MalformedReadinessSpec`]
/// for any invalid readiness spec (including teardown specs).
pub fn validate_stages(stages: &[Stage]) -> Result<(), MeshflowError> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();

    for stage in stages {
        if stage.name.trim().is_empty() {
            return Err(ConfigError::new("Stage with an empty name")
                .with_fix_hint("Give every stage a unique name")
                .into());
        }
        if !seen.insert(stage.name.as_str()) {
            duplicates.push(stage.name.clone());
        }
        if let StageAction::RunExternalScript { ref argv } = stage.action {
            if argv.is_empty() || argv[0].trim().is_empty() {
                return Err(ConfigError::new(format!("Stage '{}' has an empty command", stage.name))
                    .with_subjects(vec![stage.name.clone()])
                    .into());
            }
        }
        for spec in stage.readiness.iter().chain(stage.teardown_readiness.iter()) {
            spec.validate()?;
        }
    }

    if !duplicates.is_empty() {
        return Err(ConfigError::new(format!(
            "Duplicate stage names: {}",
            duplicates.join(", ")
        ))
        .with_subjects(duplicates)
        .with_fix_hint("Stage names must be unique within a run")
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::ConditionCheck;
    use crate::poll::ReadinessSpec;
    use crate::stages::TimeoutPolicy;
    use std::time::Duration;

    #[test]
    fn test_valid_plan() {
        let stages = vec![
            Stage::create_namespace("istio-system"),
            Stage::apply_file("apply-control-plane", Some("istio-system"), "cr.yaml"),
        ];
        assert!(validate_stages(&stages).is_ok());
    }

    #[test]
    fn test_duplicate_names() {
        let stages = vec![
            Stage::create_namespace("bookinfo"),
            Stage::create_namespace("bookinfo"),
        ];
        let err = validate_stages(&stages).unwrap_err();
        match err {
            MeshflowError::Config(config) => {
                assert_eq!(config.subjects, vec!["create-namespace-bookinfo".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_external_command() {
        let stages = vec![Stage::external("grant", Vec::new())];
        assert!(matches!(validate_stages(&stages), Err(MeshflowError::Config(_))));
    }

    #[test]
    fn test_malformed_teardown_spec() {
        let bad = ReadinessSpec::condition("smcp", "basic", None, ConditionCheck::new("Installed", "True"))
            .with_window(Duration::ZERO, Duration::from_secs(10));
        let stages = vec![Stage::apply_file("apply-control-plane", None, "cr.yaml")
            .with_teardown_readiness(bad, TimeoutPolicy::Continue)];
        assert!(matches!(
            validate_stages(&stages),
            Err(MeshflowError::MalformedReadinessSpec(_))
        ));
    }
}
