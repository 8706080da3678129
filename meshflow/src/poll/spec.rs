//! Readiness specifications.

use crate::command::{ClusterCli, CommandOutput};
use crate::conditions::{extract, is_satisfied, parse_pod_table, ConditionCheck};
use crate::errors::ReadinessSpecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default readiness timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);

const NOT_FOUND_MARKERS: &[&str] = &["NotFound", "not found"];
const NO_RESOURCES: &str = "No resources found";

/// What a readiness spec queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ref", rename_all = "snake_case")]
pub enum ResourceRef {
    /// A single resource by kind and name.
    Named {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },
    /// Every resource of a kind.
    Collection {
        /// Resource kind.
        kind: String,
    },
    /// The resources declared by a manifest file.
    Manifest {
        /// Manifest path.
        path: PathBuf,
    },
}

impl ResourceRef {
    /// A single named resource.
    #[must_use]
    pub fn named(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Every resource of `kind`.
    #[must_use]
    pub fn collection(kind: impl Into<String>) -> Self {
        Self::Collection { kind: kind.into() }
    }

    /// The resources declared in a manifest.
    #[must_use]
    pub fn manifest(path: impl Into<PathBuf>) -> Self {
        Self::Manifest { path: path.into() }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { kind, name } => write!(f, "{kind}/{name}"),
            Self::Collection { kind } => write!(f, "{kind}"),
            Self::Manifest { path } => write!(f, "-f {}", path.display()),
        }
    }
}

/// The predicate a poll evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum ReadinessCheck {
    /// A status condition on a named resource.
    Condition(ConditionCheck),
    /// No pod still pending or creating containers.
    PodsSettled {
        /// Accept a namespace with no pods at all.
        #[serde(default)]
        allow_empty: bool,
    },
    /// Every pod running with all containers ready.
    PodsReady {
        /// Required container count per pod, e.g. 2 with an injected sidecar.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_containers: Option<u32>,
    },
    /// The resource no longer exists.
    Absent,
}

impl fmt::Display for ReadinessCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition(check) => write!(f, "{check}"),
            Self::PodsSettled { allow_empty: true } => write!(f, "pods settled (empty ok)"),
            Self::PodsSettled { .. } => write!(f, "pods settled"),
            Self::PodsReady {
                expected_containers: Some(n),
            } => write!(f, "pods ready ({n} containers)"),
            Self::PodsReady { .. } => write!(f, "pods ready"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// One observation of the cluster, judged against a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Whether the check holds.
    pub satisfied: bool,
    /// The observed state, kept for timeout diagnostics.
    pub snapshot: String,
}

impl ReadinessCheck {
    /// Judges one query result.
    ///
    /// A failed query is never satisfied, except that `NotFound` proves
    /// absence.
    #[must_use]
    pub fn evaluate(&self, output: &CommandOutput) -> Observation {
        if !output.is_success() {
            let stderr = output.stderr.trim().to_string();
            let satisfied = matches!(self, Self::Absent)
                && NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m));
            return Observation {
                satisfied,
                snapshot: stderr,
            };
        }

        let stdout = output.stdout.trim();
        match self {
            Self::Condition(check) => {
                let set = extract(stdout);
                let snapshot = if set.is_empty() {
                    "(no conditions reported)".to_string()
                } else {
                    set.render()
                };
                Observation {
                    satisfied: is_satisfied(&set, check),
                    snapshot,
                }
            }
            Self::PodsSettled { allow_empty } => Observation {
                satisfied: {
                    let table = parse_pod_table(stdout);
                    if *allow_empty {
                        table.is_quiet()
                    } else {
                        table.is_settled()
                    }
                },
                snapshot: pod_snapshot(stdout, &output.stderr),
            },
            Self::PodsReady { expected_containers } => Observation {
                satisfied: parse_pod_table(stdout).is_ready(*expected_containers),
                snapshot: pod_snapshot(stdout, &output.stderr),
            },
            Self::Absent => Observation {
                satisfied: stdout.is_empty()
                    || stdout.contains(NO_RESOURCES)
                    || output.stderr.contains(NO_RESOURCES),
                snapshot: stdout.to_string(),
            },
        }
    }
}

fn pod_snapshot(stdout: &str, stderr: &str) -> String {
    if stdout.is_empty() {
        stderr.trim().to_string()
    } else {
        stdout.to_string()
    }
}

/// Describes what to poll, what counts as ready, and for how long to wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessSpec {
    /// The resource queried on each attempt.
    pub resource: ResourceRef,
    /// Namespace of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// The predicate.
    pub check: ReadinessCheck,
    /// Sleep between attempts.
    pub poll_interval: Duration,
    /// Total time budget.
    pub timeout: Duration,
}

impl ReadinessSpec {
    /// Creates a spec with the default window.
    #[must_use]
    pub fn new(resource: ResourceRef, namespace: Option<&str>, check: ReadinessCheck) -> Self {
        Self {
            resource,
            namespace: namespace.map(str::to_string),
            check,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Waits for a status condition on `kind/name`.
    #[must_use]
    pub fn condition(kind: &str, name: &str, namespace: Option<&str>, check: ConditionCheck) -> Self {
        Self::new(ResourceRef::named(kind, name), namespace, ReadinessCheck::Condition(check))
    }

    /// Waits until the pods in `namespace` have left pending/creating phases.
    ///
    /// Unless `allow_empty` is set, at least one pod must exist.
    #[must_use]
    pub fn pods_settled(namespace: &str, allow_empty: bool) -> Self {
        Self::new(
            ResourceRef::collection("pod"),
            Some(namespace),
            ReadinessCheck::PodsSettled { allow_empty },
        )
    }

    /// Waits until every pod in `namespace` is running and ready.
    #[must_use]
    pub fn pods_ready(namespace: &str, expected_containers: Option<u32>) -> Self {
        Self::new(
            ResourceRef::collection("pod"),
            Some(namespace),
            ReadinessCheck::PodsReady { expected_containers },
        )
    }

    /// Waits until `resource` is gone.
    #[must_use]
    pub fn absent(resource: ResourceRef, namespace: Option<&str>) -> Self {
        Self::new(resource, namespace, ReadinessCheck::Absent)
    }

    /// Sets the poll interval and timeout.
    #[must_use]
    pub fn with_window(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.timeout = timeout;
        self
    }

    /// Checks the spec is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessSpecError`] for a zero interval, a timeout shorter
    /// than one interval, an empty condition, or a condition check on
    /// anything but a named resource.
    pub fn validate(&self) -> Result<(), ReadinessSpecError> {
        let resource = self.to_string();
        if self.poll_interval.is_zero() {
            return Err(ReadinessSpecError::ZeroInterval { resource });
        }
        if self.timeout < self.poll_interval {
            return Err(ReadinessSpecError::TimeoutShorterThanInterval {
                resource,
                timeout: self.timeout,
                interval: self.poll_interval,
            });
        }
        if let ReadinessCheck::Condition(ref check) = self.check {
            if check.condition_type.trim().is_empty() || check.required_status.trim().is_empty() {
                return Err(ReadinessSpecError::EmptyCondition { resource });
            }
            if !matches!(self.resource, ResourceRef::Named { .. }) {
                return Err(ReadinessSpecError::UnnamedResource { resource });
            }
        }
        Ok(())
    }

    /// Renders the query issued on each attempt.
    #[must_use]
    pub fn query(&self, cli: &ClusterCli) -> Vec<String> {
        let namespace = self.namespace.as_deref();
        match (&self.check, &self.resource) {
            (ReadinessCheck::Condition(_), ResourceRef::Named { kind, name }) => {
                cli.get_conditions(kind, name, namespace)
            }
            (ReadinessCheck::PodsSettled { .. } | ReadinessCheck::PodsReady { .. }, _) => match namespace {
                Some(ns) => cli.list_pods(ns),
                None => cli.get_collection("pod", None),
            },
            (_, ResourceRef::Named { kind, name }) => cli.get_named(kind, name, namespace),
            (_, ResourceRef::Collection { kind }) => cli.get_collection(kind, namespace),
            (_, ResourceRef::Manifest { path }) => cli.get_from_file(namespace, path),
        }
    }
}

impl fmt::Display for ReadinessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.resource)?;
        if let Some(ref ns) = self.namespace {
            write!(f, "in {ns} ")?;
        }
        write!(f, "{}", self.check)
    }
}
