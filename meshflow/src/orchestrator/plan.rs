//! The install plan.

use crate::conditions::ConditionCheck;
use crate::errors::ConfigError;
use crate::poll::ReadinessSpec;
use crate::stages::TimeoutPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A selectable part of the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Operator subscriptions and policy grants.
    Operators,
    /// Control-plane CR, member namespaces and the member-roll.
    ControlPlane,
    /// The transient smoke-test workload.
    Smoke,
    /// Everything.
    All,
}

/// Which components a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSet {
    /// Operators selected.
    pub operators: bool,
    /// Control plane selected.
    pub control_plane: bool,
    /// Smoke workload selected.
    pub smoke: bool,
}

impl Default for ComponentSet {
    fn default() -> Self {
        Self::all()
    }
}

impl ComponentSet {
    /// Every component.
    #[must_use]
    pub fn all() -> Self {
        Self {
            operators: true,
            control_plane: true,
            smoke: true,
        }
    }

    /// Builds a set from a list; an empty list selects everything.
    #[must_use]
    pub fn from_components(components: &[Component]) -> Self {
        if components.is_empty() || components.contains(&Component::All) {
            return Self::all();
        }
        Self {
            operators: components.contains(&Component::Operators),
            control_plane: components.contains(&Component::ControlPlane),
            smoke: components.contains(&Component::Smoke),
        }
    }
}

impl fmt::Display for ComponentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.operators, "operators"),
            (self.control_plane, "control-plane"),
            (self.smoke, "smoke"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

/// Interval, timeout and timeout policy for one kind of wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Sleep between polls.
    pub interval: Duration,
    /// Total budget.
    pub timeout: Duration,
    /// What to do when the budget runs out.
    pub on_timeout: TimeoutPolicy,
}

impl WaitPolicy {
    /// Creates a policy from seconds.
    #[must_use]
    pub const fn from_secs(interval: u64, timeout: u64, on_timeout: TimeoutPolicy) -> Self {
        Self {
            interval: Duration::from_secs(interval),
            timeout: Duration::from_secs(timeout),
            on_timeout,
        }
    }

    /// Applies this window to a spec.
    #[must_use]
    pub fn window(&self, spec: ReadinessSpec) -> ReadinessSpec {
        spec.with_window(self.interval, self.timeout)
    }
}

/// Wait policies per stage family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicies {
    /// Operator pods settling after the last subscription.
    pub operator_pods: WaitPolicy,
    /// Control-plane `Installed` condition.
    pub control_plane: WaitPolicy,
    /// Member-roll `Ready` condition.
    pub member_roll: WaitPolicy,
    /// Smoke workload pods ready.
    pub smoke: WaitPolicy,
    /// Every deletion waiting for absence.
    pub deletion: WaitPolicy,
}

impl Default for WaitPolicies {
    fn default() -> Self {
        Self {
            operator_pods: WaitPolicy::from_secs(5, 240, TimeoutPolicy::Continue),
            control_plane: WaitPolicy::from_secs(5, 1200, TimeoutPolicy::Escalate),
            member_roll: WaitPolicy::from_secs(5, 120, TimeoutPolicy::Continue),
            smoke: WaitPolicy::from_secs(5, 240, TimeoutPolicy::Continue),
            deletion: WaitPolicy::from_secs(5, 300, TimeoutPolicy::Continue),
        }
    }
}

/// The four subscriptions, applied in dependency order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSubscriptions {
    /// Logging backend (elasticsearch).
    pub logging: PathBuf,
    /// Tracing (jaeger).
    pub tracing: PathBuf,
    /// Dashboard (kiali).
    pub dashboard: PathBuf,
    /// The mesh operator itself.
    pub mesh: PathBuf,
}

impl OperatorSubscriptions {
    /// `(role, manifest)` pairs in apply order.
    #[must_use]
    pub fn ordered(&self) -> [(&'static str, &PathBuf); 4] {
        [
            ("logging", &self.logging),
            ("tracing", &self.tracing),
            ("dashboard", &self.dashboard),
            ("mesh", &self.mesh),
        ]
    }
}

/// How the operators get onto the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorSource {
    /// Catalog subscriptions.
    Subscriptions(OperatorSubscriptions),
    /// A single operator manifest applied into the operator namespace.
    Manifest(PathBuf),
}

/// An `anyuid` grant for a service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGrant {
    /// Service account.
    pub service_account: String,
    /// Its namespace.
    pub namespace: String,
}

/// Operator installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorPlan {
    /// Namespace the operator pods run in.
    pub namespace: String,
    /// Subscriptions or a manifest.
    pub source: OperatorSource,
    /// Policy grants issued before the subscriptions.
    #[serde(default)]
    pub grants: Vec<PolicyGrant>,
    /// Treat an operator namespace with no pods as settled.
    #[serde(default)]
    pub allow_empty_namespace: bool,
}

/// The control-plane custom resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlanePlan {
    /// Resource name.
    pub name: String,
    /// Namespace it lives in.
    pub namespace: String,
    /// Resource kind.
    pub kind: String,
    /// Manifest.
    pub manifest: PathBuf,
    /// The condition that means installed.
    pub installed: ConditionCheck,
}

/// The member-roll resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRollPlan {
    /// Resource name.
    pub name: String,
    /// Resource kind.
    pub kind: String,
    /// Manifest.
    pub manifest: PathBuf,
    /// The condition that means ready.
    pub ready: ConditionCheck,
}

/// The smoke workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokePlan {
    /// Test namespace.
    pub namespace: String,
    /// Workload manifest.
    pub manifest: PathBuf,
    /// Containers per pod once the sidecar is injected.
    pub expected_containers: Option<u32>,
}

/// Package audit of the control-plane pods after install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAuditPlan {
    /// Only pods whose name contains this are audited; empty audits all.
    pub pod_filter: String,
    /// Only packages whose name contains this are reported; empty reports all.
    pub package_filter: String,
}

impl Default for PackageAuditPlan {
    fn default() -> Self {
        Self {
            pod_filter: "istio".to_string(),
            package_filter: "servicemesh".to_string(),
        }
    }
}

/// Everything an install or uninstall needs. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshInstallPlan {
    /// Operators.
    pub operators: OperatorPlan,
    /// Control plane.
    pub control_plane: ControlPlanePlan,
    /// Member-roll, applied in the control-plane namespace.
    pub member_roll: MemberRollPlan,
    /// Namespaces enrolled in the mesh.
    pub member_namespaces: BTreeSet<String>,
    /// Smoke workload.
    pub smoke: SmokePlan,
    /// Selected components.
    pub components: ComponentSet,
    /// Wait policies.
    pub waits: WaitPolicies,
    /// Control-plane package audit; off when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_audit: Option<PackageAuditPlan>,
}

impl MeshInstallPlan {
    /// Namespaces created in the control-plane segment (members plus the
    /// test namespace when smoke is selected), minus the control-plane
    /// namespace itself.
    #[must_use]
    pub fn workload_namespaces(&self) -> BTreeSet<String> {
        let mut namespaces = BTreeSet::new();
        if self.components.control_plane {
            namespaces.extend(self.member_namespaces.iter().cloned());
        }
        if self.components.smoke {
            namespaces.insert(self.smoke.namespace.clone());
        }
        namespaces.remove(&self.control_plane.namespace);
        namespaces
    }

    /// Namespaces whose pod images are reported after install.
    #[must_use]
    pub fn touched_namespaces(&self) -> Vec<String> {
        let mut namespaces = Vec::new();
        let mut push = |ns: &str| {
            if !namespaces.iter().any(|n| n == ns) {
                namespaces.push(ns.to_string());
            }
        };
        if self.components.operators {
            push(&self.operators.namespace);
        }
        if self.components.control_plane {
            push(&self.control_plane.namespace);
        }
        if self.components.smoke {
            push(&self.smoke.namespace);
        }
        namespaces
    }

    /// Checks names and selection.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = self.components;
        if !(c.operators || c.control_plane || c.smoke) {
            return Err(ConfigError::new("No components selected")
                .with_fix_hint("Select operators, control_plane, smoke or all"));
        }

        let mut required: Vec<(&str, &str)> = Vec::new();
        if c.operators {
            required.push(("operators.namespace", self.operators.namespace.as_str()));
        }
        if c.control_plane {
            required.extend([
                ("control_plane.name", self.control_plane.name.as_str()),
                ("control_plane.namespace", self.control_plane.namespace.as_str()),
                ("control_plane.kind", self.control_plane.kind.as_str()),
                ("member_roll.name", self.member_roll.name.as_str()),
                ("member_roll.kind", self.member_roll.kind.as_str()),
            ]);
        }
        if c.smoke {
            required.push(("smoke.namespace", self.smoke.namespace.as_str()));
        }
        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| (*key).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::new(format!("Empty required fields: {}", missing.join(", ")))
                .with_subjects(missing));
        }

        if self.member_namespaces.iter().any(|ns| ns.trim().is_empty()) {
            return Err(ConfigError::new("Empty member namespace name")
                .with_subjects(vec!["control_plane.member_namespaces".to_string()]));
        }
        if c.smoke && self.smoke.expected_containers == Some(0) {
            return Err(ConfigError::new("smoke.expected_containers must be at least 1")
                .with_subjects(vec!["smoke.expected_containers".to_string()]));
        }
        Ok(())
    }
}
