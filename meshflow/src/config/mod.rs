//! Configuration.
//!
//! A YAML file describing the cluster, the manifests and the wait policies.
//! Every field has a default matching a stock OpenShift Service Mesh test
//! install, so an empty file is a valid configuration once the manifests
//! exist next to it.
//!
//! ```yaml
//! cluster:
//!   kubeconfig: /home/ci/.kube/config
//! control_plane:
//!   manifest: smcp.yaml
//!   required_reason: InstallSuccessful
//! waits:
//!   control_plane:
//!     timeout_secs: 1800
//! components: [operators, control_plane]
//! package_audit:
//!   pod_filter: istio
//! ```

mod file;

pub use file::resolve_paths;

use crate::command::{ClusterCli, ClusterFlavor};
use crate::conditions::ConditionCheck;
use crate::errors::ConfigError;
use crate::orchestrator::{
    Component, ComponentSet, ControlPlanePlan, MemberRollPlan, MeshInstallPlan, OperatorPlan,
    OperatorSource, OperatorSubscriptions, PackageAuditPlan, PolicyGrant, SmokePlan, WaitPolicies,
    WaitPolicy,
};
use crate::stages::TimeoutPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshflowConfig {
    /// Cluster tool and credentials.
    pub cluster: ClusterConfig,
    /// Operator installation.
    pub operators: OperatorsConfig,
    /// Control plane and member namespaces.
    pub control_plane: ControlPlaneConfig,
    /// Member-roll resource.
    pub member_roll: MemberRollConfig,
    /// Smoke workload.
    pub smoke: SmokeConfig,
    /// Wait overrides per stage family.
    pub waits: WaitsConfig,
    /// Components to run; empty means all.
    pub components: Vec<Component>,
    /// Package audit of the control-plane pods; off when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_audit: Option<PackageAuditConfig>,
}

/// Package audit settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageAuditConfig {
    /// Substring selecting the audited pods.
    pub pod_filter: String,
    /// Substring selecting the reported packages.
    pub package_filter: String,
}

impl Default for PackageAuditConfig {
    fn default() -> Self {
        let plan = PackageAuditPlan::default();
        Self {
            pod_filter: plan.pod_filter,
            package_filter: plan.package_filter,
        }
    }
}

/// Cluster tool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// Cluster tool binary.
    pub tool: String,
    /// Command dialect.
    pub flavor: ClusterFlavor,
    /// Kubeconfig passed to every command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tool: "oc".to_string(),
            flavor: ClusterFlavor::Openshift,
            kubeconfig: None,
        }
    }
}

/// Operator settings. Set either `subscriptions` or `manifest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperatorsConfig {
    /// Namespace the operators run in.
    pub namespace: String,
    /// Subscription manifests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<OperatorSubscriptions>,
    /// A single operator manifest instead of subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    /// `anyuid` grants issued first.
    pub grants: Vec<PolicyGrant>,
    /// Treat an operator namespace with no pods as settled.
    pub allow_empty_namespace: bool,
}

impl Default for OperatorsConfig {
    fn default() -> Self {
        Self {
            namespace: "openshift-operators".to_string(),
            subscriptions: None,
            manifest: None,
            grants: Vec::new(),
            allow_empty_namespace: false,
        }
    }
}

/// Subscription manifests used when neither `subscriptions` nor `manifest` is set.
#[must_use]
pub fn default_subscriptions() -> OperatorSubscriptions {
    OperatorSubscriptions {
        logging: "subscriptions/elasticsearch.yaml".into(),
        tracing: "subscriptions/jaeger.yaml".into(),
        dashboard: "subscriptions/kiali.yaml".into(),
        mesh: "subscriptions/servicemesh.yaml".into(),
    }
}

/// Control-plane settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlPlaneConfig {
    /// Resource name.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Resource kind.
    pub kind: String,
    /// Manifest.
    pub manifest: PathBuf,
    /// Condition type that means installed.
    pub condition: String,
    /// Required status of that condition.
    pub required_status: String,
    /// Substring the reason or message must contain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_reason: Option<String>,
    /// Namespaces enrolled in the mesh.
    pub member_namespaces: Vec<String>,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            name: "basic".to_string(),
            namespace: "istio-system".to_string(),
            kind: "ServiceMeshControlPlane".to_string(),
            manifest: "smcp.yaml".into(),
            condition: "Installed".to_string(),
            required_status: "True".to_string(),
            required_reason: None,
            member_namespaces: vec!["bookinfo".to_string()],
        }
    }
}

/// Member-roll settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemberRollConfig {
    /// Resource name.
    pub name: String,
    /// Resource kind.
    pub kind: String,
    /// Manifest.
    pub manifest: PathBuf,
    /// Condition type that means ready.
    pub condition: String,
}

impl Default for MemberRollConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            kind: "ServiceMeshMemberRoll".to_string(),
            manifest: "smmr.yaml".into(),
            condition: "Ready".to_string(),
        }
    }
}

/// Smoke workload settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmokeConfig {
    /// Test namespace.
    pub namespace: String,
    /// Workload manifest.
    pub manifest: PathBuf,
    /// Containers per pod; `null` accepts any count.
    pub expected_containers: Option<u32>,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            namespace: "bookinfo".to_string(),
            manifest: "bookinfo.yaml".into(),
            expected_containers: Some(2),
        }
    }
}

/// Partial override of one [`WaitPolicy`]; unset fields keep the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitOverride {
    /// Seconds between polls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    /// Total seconds to wait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// What to do on timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_timeout: Option<TimeoutPolicy>,
}

impl WaitOverride {
    /// Applies the override on top of `base`.
    #[must_use]
    pub fn apply(self, base: WaitPolicy) -> WaitPolicy {
        WaitPolicy {
            interval: self.interval_secs.map_or(base.interval, Duration::from_secs),
            timeout: self.timeout_secs.map_or(base.timeout, Duration::from_secs),
            on_timeout: self.on_timeout.unwrap_or(base.on_timeout),
        }
    }
}

/// Wait overrides per stage family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitsConfig {
    /// Operator pods settling.
    pub operator_pods: WaitOverride,
    /// Control-plane condition.
    pub control_plane: WaitOverride,
    /// Member-roll condition.
    pub member_roll: WaitOverride,
    /// Smoke pods ready.
    pub smoke: WaitOverride,
    /// Deletions waiting for absence.
    pub deletion: WaitOverride,
}

impl WaitsConfig {
    /// Resolves the overrides against the default policies.
    #[must_use]
    pub fn policies(&self) -> WaitPolicies {
        let base = WaitPolicies::default();
        WaitPolicies {
            operator_pods: self.operator_pods.apply(base.operator_pods),
            control_plane: self.control_plane.apply(base.control_plane),
            member_roll: self.member_roll.apply(base.member_roll),
            smoke: self.smoke.apply(base.smoke),
            deletion: self.deletion.apply(base.deletion),
        }
    }
}

impl MeshflowConfig {
    /// Loads a config file; relative paths in it are resolved against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        file::load(path.as_ref())
    }

    /// Parses YAML; relative paths are left as they are.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the YAML is invalid or has unknown keys.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::new(format!("Invalid configuration: {e}"))
                .with_fix_hint("Check key names and value types against the documented layout")
        })
    }

    /// Overrides the selected components; an empty list keeps the file's.
    #[must_use]
    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        if !components.is_empty() {
            self.components = components;
        }
        self
    }

    /// Overrides the kubeconfig.
    #[must_use]
    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.cluster.kubeconfig = Some(path.into());
        self
    }

    /// The argv renderer for the configured cluster tool.
    #[must_use]
    pub fn cluster_cli(&self) -> ClusterCli {
        let cli = ClusterCli::new(self.cluster.tool.clone(), self.cluster.flavor);
        match self.cluster.kubeconfig {
            Some(ref kubeconfig) => cli.with_kubeconfig(kubeconfig.clone()),
            None => cli,
        }
    }

    /// Builds and validates the install plan without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the operator source is ambiguous or the
    /// plan fails validation.
    pub fn to_plan(&self) -> Result<MeshInstallPlan, ConfigError> {
        let operators = &self.operators;
        let source = match (&operators.subscriptions, &operators.manifest) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::new("Set either operators.subscriptions or operators.manifest")
                    .with_subjects(vec![
                        "operators.subscriptions".to_string(),
                        "operators.manifest".to_string(),
                    ]));
            }
            (None, Some(manifest)) => OperatorSource::Manifest(manifest.clone()),
            (Some(subscriptions), None) => OperatorSource::Subscriptions(subscriptions.clone()),
            (None, None) => OperatorSource::Subscriptions(default_subscriptions()),
        };

        let cp = &self.control_plane;
        let mut installed = ConditionCheck::new(&cp.condition, &cp.required_status);
        if let Some(ref reason) = cp.required_reason {
            installed = installed.with_reason(reason);
        }
        let roll = &self.member_roll;

        let plan = MeshInstallPlan {
            operators: OperatorPlan {
                namespace: operators.namespace.clone(),
                source,
                grants: operators.grants.clone(),
                allow_empty_namespace: operators.allow_empty_namespace,
            },
            control_plane: ControlPlanePlan {
                name: cp.name.clone(),
                namespace: cp.namespace.clone(),
                kind: cp.kind.clone(),
                manifest: cp.manifest.clone(),
                installed,
            },
            member_roll: MemberRollPlan {
                name: roll.name.clone(),
                kind: roll.kind.clone(),
                manifest: roll.manifest.clone(),
                ready: ConditionCheck::new(&roll.condition, "True"),
            },
            member_namespaces: cp.member_namespaces.iter().cloned().collect::<BTreeSet<_>>(),
            smoke: SmokePlan {
                namespace: self.smoke.namespace.clone(),
                manifest: self.smoke.manifest.clone(),
                expected_containers: self.smoke.expected_containers,
            },
            components: ComponentSet::from_components(&self.components),
            waits: self.waits.policies(),
            package_audit: self.package_audit.as_ref().map(|audit| PackageAuditPlan {
                pod_filter: audit.pod_filter.clone(),
                package_filter: audit.package_filter.clone(),
            }),
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Builds the plan and checks that every manifest the selected
    /// components need exists.
    ///
    /// # Errors
    ///
    /// Same as [`MeshflowConfig::to_plan`], plus missing manifest files.
    pub fn into_plan(self) -> Result<MeshInstallPlan, ConfigError> {
        let plan = self.to_plan()?;
        let missing: Vec<String> = manifests(&plan)
            .into_iter()
            .filter(|path| !path.is_file())
            .map(|path| path.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::new(format!("Missing manifests: {}", missing.join(", ")))
                .with_subjects(missing)
                .with_fix_hint("Paths are relative to the configuration file"));
        }
        Ok(plan)
    }
}

fn manifests(plan: &MeshInstallPlan) -> Vec<&Path> {
    let mut paths = Vec::new();
    let c = plan.components;
    if c.operators {
        match plan.operators.source {
            OperatorSource::Subscriptions(ref subs) => {
                paths.extend(subs.ordered().iter().map(|(_, path)| path.as_path()));
            }
            OperatorSource::Manifest(ref manifest) => paths.push(manifest.as_path()),
        }
    }
    if c.control_plane {
        paths.push(plan.control_plane.manifest.as_path());
        paths.push(plan.member_roll.manifest.as_path());
    }
    if c.smoke {
        paths.push(plan.smoke.manifest.as_path());
    }
    paths
}
