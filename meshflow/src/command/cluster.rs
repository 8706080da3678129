//! Argv rendering for the cluster control tool.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Go template that prints one `type=status, reason=..., message=...` line per condition.
pub const CONDITION_TEMPLATE: &str = r#"{{range .status.conditions}}{{printf "%s=%s, reason=%s, message=%s\n" .type .status .reason .message}}{{end}}"#;

/// JSONPath that prints `pod<TAB>image|imageID image|imageID ...` per pod.
pub const IMAGE_JSONPATH: &str = r#"jsonpath={range .items[*]}{.metadata.name}{"\t"}{range .status.containerStatuses[*]}{.image}{"|"}{.imageID}{" "}{end}{"\n"}{end}"#;

/// Which command dialect the cluster tool speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterFlavor {
    /// `oc`: namespaces are projects.
    #[default]
    Openshift,
    /// `kubectl`.
    Kubernetes,
}

impl fmt::Display for ClusterFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Openshift => write!(f, "openshift"),
            Self::Kubernetes => write!(f, "kubernetes"),
        }
    }
}

/// Renders argv for the cluster control tool.
///
/// The kubeconfig is passed per invocation; nothing is read from or written
/// to the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCli {
    tool: String,
    kubeconfig: Option<PathBuf>,
    flavor: ClusterFlavor,
}

impl Default for ClusterCli {
    fn default() -> Self {
        Self::new("oc", ClusterFlavor::Openshift)
    }
}

impl ClusterCli {
    /// Creates a renderer for `tool`.
    #[must_use]
    pub fn new(tool: impl Into<String>, flavor: ClusterFlavor) -> Self {
        Self {
            tool: tool.into(),
            kubeconfig: None,
            flavor,
        }
    }

    /// Sets the kubeconfig passed to every command.
    #[must_use]
    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Returns the flavor.
    #[must_use]
    pub fn flavor(&self) -> ClusterFlavor {
        self.flavor
    }

    /// Renders `<tool> [--kubeconfig k] args...`.
    #[must_use]
    pub fn command<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        let mut argv = vec![self.tool.clone()];
        if let Some(ref kubeconfig) = self.kubeconfig {
            argv.push("--kubeconfig".to_string());
            argv.push(kubeconfig.display().to_string());
        }
        argv.extend(args.iter().map(|a| a.as_ref().to_string()));
        argv
    }

    fn with_namespace(&self, mut args: Vec<String>, namespace: Option<&str>) -> Vec<String> {
        if let Some(ns) = namespace {
            args.push("-n".to_string());
            args.push(ns.to_string());
        }
        self.command(&args)
    }

    /// `apply -f <path>`.
    #[must_use]
    pub fn apply_file(&self, namespace: Option<&str>, path: &Path) -> Vec<String> {
        let mut argv = self.with_namespace(vec!["apply".to_string()], namespace);
        argv.extend(["-f".to_string(), path.display().to_string()]);
        argv
    }

    /// `apply -f -`, manifest on stdin.
    #[must_use]
    pub fn apply_stdin(&self, namespace: Option<&str>) -> Vec<String> {
        let mut argv = self.with_namespace(vec!["apply".to_string()], namespace);
        argv.extend(["-f".to_string(), "-".to_string()]);
        argv
    }

    /// `delete -f <path>`.
    #[must_use]
    pub fn delete_file(&self, namespace: Option<&str>, path: &Path) -> Vec<String> {
        let mut argv = self.with_namespace(vec!["delete".to_string()], namespace);
        argv.extend(["-f".to_string(), path.display().to_string()]);
        argv
    }

    /// `delete -f -`, manifest on stdin.
    #[must_use]
    pub fn delete_stdin(&self, namespace: Option<&str>) -> Vec<String> {
        let mut argv = self.with_namespace(vec!["delete".to_string()], namespace);
        argv.extend(["-f".to_string(), "-".to_string()]);
        argv
    }

    /// Creates a namespace (`new-project` on OpenShift).
    #[must_use]
    pub fn create_namespace(&self, name: &str) -> Vec<String> {
        match self.flavor {
            ClusterFlavor::Openshift => self.command(&["new-project", name]),
            ClusterFlavor::Kubernetes => self.command(&["create", "namespace", name]),
        }
    }

    /// Deletes a namespace (`delete project` on OpenShift).
    #[must_use]
    pub fn delete_namespace(&self, name: &str) -> Vec<String> {
        match self.flavor {
            ClusterFlavor::Openshift => self.command(&["delete", "project", name]),
            ClusterFlavor::Kubernetes => self.command(&["delete", "namespace", name]),
        }
    }

    /// `delete <kind> -n <ns> --all`.
    #[must_use]
    pub fn delete_all(&self, kind: &str, namespace: &str) -> Vec<String> {
        let mut argv = self.with_namespace(vec!["delete".to_string(), kind.to_string()], Some(namespace));
        argv.push("--all".to_string());
        argv
    }

    /// Renders a resource's status conditions through [`CONDITION_TEMPLATE`].
    #[must_use]
    pub fn get_conditions(&self, kind: &str, name: &str, namespace: Option<&str>) -> Vec<String> {
        let mut argv = self.with_namespace(vec!["get".to_string(), format!("{kind}/{name}")], namespace);
        argv.extend([
            "-o".to_string(),
            "go-template".to_string(),
            format!("--template={CONDITION_TEMPLATE}"),
        ]);
        argv
    }

    /// `get pod -n <ns>` in the default table format.
    #[must_use]
    pub fn list_pods(&self, namespace: &str) -> Vec<String> {
        self.with_namespace(vec!["get".to_string(), "pod".to_string()], Some(namespace))
    }

    /// `get <kind>/<name>`; namespaces are queried without `-n`.
    #[must_use]
    pub fn get_named(&self, kind: &str, name: &str, namespace: Option<&str>) -> Vec<String> {
        if is_namespace_kind(kind) {
            return self.command(&["get", kind, name]);
        }
        self.with_namespace(vec!["get".to_string(), format!("{kind}/{name}")], namespace)
    }

    /// `get <kind> -n <ns>`.
    #[must_use]
    pub fn get_collection(&self, kind: &str, namespace: Option<&str>) -> Vec<String> {
        self.with_namespace(vec!["get".to_string(), kind.to_string()], namespace)
    }

    /// `get -f <path>`: the resources a manifest declares.
    #[must_use]
    pub fn get_from_file(&self, namespace: Option<&str>, path: &Path) -> Vec<String> {
        let mut argv = self.with_namespace(vec!["get".to_string()], namespace);
        argv.extend(["-f".to_string(), path.display().to_string()]);
        argv
    }

    /// Per-pod image references and digests, see [`IMAGE_JSONPATH`].
    #[must_use]
    pub fn pod_images(&self, namespace: &str) -> Vec<String> {
        let mut argv = self.with_namespace(vec!["get".to_string(), "pods".to_string()], Some(namespace));
        argv.extend(["-o".to_string(), IMAGE_JSONPATH.to_string()]);
        argv
    }

    /// Lists the RPM packages installed in a pod's default container.
    #[must_use]
    pub fn pod_packages(&self, namespace: &str, pod: &str) -> Vec<String> {
        match self.flavor {
            ClusterFlavor::Openshift => self.command(&["rsh", "-n", namespace, pod, "rpm", "-q", "-a"]),
            ClusterFlavor::Kubernetes => self.command(&["exec", "-n", namespace, pod, "--", "rpm", "-q", "-a"]),
        }
    }

    /// A cheap call that fails when there is no usable session.
    #[must_use]
    pub fn session_probe(&self) -> Vec<String> {
        match self.flavor {
            ClusterFlavor::Openshift => self.command(&["whoami"]),
            ClusterFlavor::Kubernetes => self.command(&["config", "current-context"]),
        }
    }

    /// Grants the `anyuid` SCC to a service account (OpenShift only).
    #[must_use]
    pub fn grant_anyuid(&self, service_account: &str, namespace: &str) -> Vec<String> {
        self.command(&[
            "adm",
            "policy",
            "add-scc-to-user",
            "anyuid",
            "-z",
            service_account,
            "-n",
            namespace,
        ])
    }
}

/// Returns true for the cluster-scoped namespace kinds.
#[must_use]
pub fn is_namespace_kind(kind: &str) -> bool {
    matches!(
        kind.to_ascii_lowercase().as_str(),
        "namespace" | "namespaces" | "ns" | "project" | "projects"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kubeconfig_is_explicit() {
        let cli = ClusterCli::new("oc", ClusterFlavor::Openshift).with_kubeconfig("/tmp/kc");
        assert_eq!(
            cli.apply_file(Some("istio-system"), Path::new("cr.yaml")),
            vec!["oc", "--kubeconfig", "/tmp/kc", "apply", "-n", "istio-system", "-f", "cr.yaml"]
        );
    }

    #[test]
    fn test_namespace_commands_by_flavor() {
        let oc = ClusterCli::new("oc", ClusterFlavor::Openshift);
        assert_eq!(oc.create_namespace("bookinfo"), vec!["oc", "new-project", "bookinfo"]);
        assert_eq!(oc.delete_namespace("bookinfo"), vec!["oc", "delete", "project", "bookinfo"]);

        let kubectl = ClusterCli::new("kubectl", ClusterFlavor::Kubernetes);
        assert_eq!(
            kubectl.create_namespace("bookinfo"),
            vec!["kubectl", "create", "namespace", "bookinfo"]
        );
        assert_eq!(kubectl.session_probe(), vec!["kubectl", "config", "current-context"]);
    }

    #[test]
    fn test_get_conditions_uses_template() {
        let cli = ClusterCli::default();
        let argv = cli.get_conditions("ServiceMeshControlPlane", "basic", Some("istio-system"));
        assert_eq!(argv[1..4].to_vec(), vec!["get", "ServiceMeshControlPlane/basic", "-n"]);
        assert!(argv.last().unwrap().starts_with("--template={{range .status.conditions}}"));
    }

    #[test]
    fn test_get_named_namespace_is_cluster_scoped() {
        let cli = ClusterCli::default();
        assert_eq!(
            cli.get_named("namespace", "bookinfo", Some("ignored")),
            vec!["oc", "get", "namespace", "bookinfo"]
        );
    }

    #[test]
    fn test_pod_packages_by_flavor() {
        let oc = ClusterCli::default();
        assert_eq!(
            oc.pod_packages("istio-system", "istiod-basic-7c9"),
            vec!["oc", "rsh", "-n", "istio-system", "istiod-basic-7c9", "rpm", "-q", "-a"]
        );
        let kubectl = ClusterCli::new("kubectl", ClusterFlavor::Kubernetes);
        assert_eq!(
            kubectl.pod_packages("istio-system", "istiod-basic-7c9"),
            vec!["kubectl", "exec", "-n", "istio-system", "istiod-basic-7c9", "--", "rpm", "-q", "-a"]
        );
    }

    #[test]
    fn test_delete_all() {
        let cli = ClusterCli::default();
        assert_eq!(
            cli.delete_all("csv", "openshift-operators"),
            vec!["oc", "delete", "csv", "-n", "openshift-operators", "--all"]
        );
    }
}
