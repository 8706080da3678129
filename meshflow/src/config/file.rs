//! Config file loading.

use super::MeshflowConfig;
use crate::errors::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub(super) fn load(path: &Path) -> Result<MeshflowConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        ConfigError::new(format!("Cannot read configuration {}: {e}", path.display()))
            .with_subjects(vec![path.display().to_string()])
    })?;
    let mut config = MeshflowConfig::from_yaml_str(&raw).map_err(|e| ConfigError {
        message: format!("{}: {}", path.display(), e.message),
        ..e
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    resolve_paths(&mut config, base);
    debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Makes every relative manifest and kubeconfig path relative to `base`.
pub fn resolve_paths(config: &mut MeshflowConfig, base: &Path) {
    let resolve = |path: &mut PathBuf| {
        if path.is_relative() {
            *path = base.join(&*path);
        }
    };

    if let Some(ref mut kubeconfig) = config.cluster.kubeconfig {
        resolve(kubeconfig);
    }
    if let Some(ref mut manifest) = config.operators.manifest {
        resolve(manifest);
    }
    if config.operators.manifest.is_none() && config.operators.subscriptions.is_none() {
        config.operators.subscriptions = Some(super::default_subscriptions());
    }
    if let Some(ref mut subscriptions) = config.operators.subscriptions {
        resolve(&mut subscriptions.logging);
        resolve(&mut subscriptions.tracing);
        resolve(&mut subscriptions.dashboard);
        resolve(&mut subscriptions.mesh);
    }
    resolve(&mut config.control_plane.manifest);
    resolve(&mut config.member_roll.manifest);
    resolve(&mut config.smoke.manifest);
}
