//! Stage definitions.

use super::{StageKind, TimeoutPolicy};
use crate::command::{ClusterCli, Verb};
use crate::poll::ReadinessSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestSource {
    /// A manifest file on disk.
    File(PathBuf),
    /// Manifest text piped on stdin.
    Inline(String),
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Inline(text) => write!(f, "<inline, {} bytes>", text.len()),
        }
    }
}

/// What a stage does against the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StageAction {
    /// `apply -f`.
    ApplyManifest {
        /// Target namespace; `None` leaves it to the manifest.
        namespace: Option<String>,
        /// The manifest.
        manifest: ManifestSource,
    },
    /// `delete -f`.
    DeleteManifest {
        /// Target namespace; `None` leaves it to the manifest.
        namespace: Option<String>,
        /// The manifest.
        manifest: ManifestSource,
    },
    /// Create a namespace.
    CreateNamespace {
        /// Namespace name.
        name: String,
    },
    /// Delete a namespace.
    DeleteNamespace {
        /// Namespace name.
        name: String,
    },
    /// `delete <kind> --all` in a namespace.
    DeleteCollection {
        /// Resource kind.
        kind: String,
        /// Namespace.
        namespace: String,
    },
    /// An argv executed verbatim.
    RunExternalScript {
        /// Program followed by its arguments.
        argv: Vec<String>,
    },
}

impl StageAction {
    /// Returns the stage kind.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::ApplyManifest { .. } => StageKind::ApplyManifest,
            Self::DeleteManifest { .. } => StageKind::DeleteManifest,
            Self::CreateNamespace { .. } => StageKind::CreateNamespace,
            Self::DeleteNamespace { .. } => StageKind::DeleteNamespace,
            Self::DeleteCollection { .. } => StageKind::DeleteCollection,
            Self::RunExternalScript { .. } => StageKind::RunExternalScript,
        }
    }

    /// Returns the cluster verb the action issues.
    #[must_use]
    pub fn verb(&self) -> Verb {
        match self {
            Self::ApplyManifest { .. } => Verb::Apply,
            Self::CreateNamespace { .. } => Verb::Create,
            Self::DeleteManifest { .. } | Self::DeleteNamespace { .. } | Self::DeleteCollection { .. } => {
                Verb::Delete
            }
            Self::RunExternalScript { .. } => Verb::Run,
        }
    }

    /// Renders the argv and optional stdin for this action.
    #[must_use]
    pub fn render(&self, cli: &ClusterCli) -> (Vec<String>, Option<String>) {
        match self {
            Self::ApplyManifest { namespace, manifest } => match manifest {
                ManifestSource::File(path) => (cli.apply_file(namespace.as_deref(), path), None),
                ManifestSource::Inline(text) => (cli.apply_stdin(namespace.as_deref()), Some(text.clone())),
            },
            Self::DeleteManifest { namespace, manifest } => match manifest {
                ManifestSource::File(path) => (cli.delete_file(namespace.as_deref(), path), None),
                ManifestSource::Inline(text) => (cli.delete_stdin(namespace.as_deref()), Some(text.clone())),
            },
            Self::CreateNamespace { name } => (cli.create_namespace(name), None),
            Self::DeleteNamespace { name } => (cli.delete_namespace(name), None),
            Self::DeleteCollection { kind, namespace } => (cli.delete_all(kind, namespace), None),
            Self::RunExternalScript { argv } => (argv.clone(), None),
        }
    }

    fn inverse(&self) -> Option<Self> {
        match self {
            Self::ApplyManifest { namespace, manifest } => Some(Self::DeleteManifest {
                namespace: namespace.clone(),
                manifest: manifest.clone(),
            }),
            Self::CreateNamespace { name } => Some(Self::DeleteNamespace { name: name.clone() }),
            _ => None,
        }
    }
}

/// One named step of an install or teardown sequence.
///
/// A stage issues exactly one command and optionally waits for readiness.
/// Creation stages carry the readiness spec of their teardown too, so the
/// uninstall sequence is derived from the install sequence rather than
/// maintained by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Unique name within a sequence.
    pub name: String,
    /// The command to issue.
    pub action: StageAction,
    /// Readiness to wait for after the command is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessSpec>,
    /// What to do when the readiness wait times out.
    #[serde(default)]
    pub on_timeout: TimeoutPolicy,
    /// Readiness for the inverse stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_readiness: Option<ReadinessSpec>,
    /// Timeout policy for the inverse stage.
    #[serde(default)]
    pub teardown_on_timeout: TimeoutPolicy,
}

impl Stage {
    /// Creates a stage with no readiness wait.
    #[must_use]
    pub fn new(name: impl Into<String>, action: StageAction) -> Self {
        Self {
            name: name.into(),
            action,
            readiness: None,
            on_timeout: TimeoutPolicy::default(),
            teardown_readiness: None,
            teardown_on_timeout: TimeoutPolicy::default(),
        }
    }

    /// Applies a manifest file.
    #[must_use]
    pub fn apply_file(name: impl Into<String>, namespace: Option<&str>, path: impl Into<PathBuf>) -> Self {
        Self::new(
            name,
            StageAction::ApplyManifest {
                namespace: namespace.map(str::to_string),
                manifest: ManifestSource::File(path.into()),
            },
        )
    }

    /// Creates a namespace; the stage is named `create-namespace-<name>`.
    #[must_use]
    pub fn create_namespace(name: &str) -> Self {
        Self::new(
            format!("create-namespace-{name}"),
            StageAction::CreateNamespace { name: name.to_string() },
        )
    }

    /// Deletes every resource of `kind` in `namespace`.
    #[must_use]
    pub fn delete_collection(name: impl Into<String>, kind: &str, namespace: &str) -> Self {
        Self::new(
            name,
            StageAction::DeleteCollection {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
            },
        )
    }

    /// Runs an argv verbatim.
    #[must_use]
    pub fn external(name: impl Into<String>, argv: Vec<String>) -> Self {
        Self::new(name, StageAction::RunExternalScript { argv })
    }

    /// Waits for `spec` after the command is accepted.
    #[must_use]
    pub fn with_readiness(mut self, spec: ReadinessSpec, on_timeout: TimeoutPolicy) -> Self {
        self.readiness = Some(spec);
        self.on_timeout = on_timeout;
        self
    }

    /// Sets the readiness wait of the inverse stage.
    #[must_use]
    pub fn with_teardown_readiness(mut self, spec: ReadinessSpec, on_timeout: TimeoutPolicy) -> Self {
        self.teardown_readiness = Some(spec);
        self.teardown_on_timeout = on_timeout;
        self
    }

    /// Returns the stage kind.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.action.kind()
    }

    /// Returns the cluster verb.
    #[must_use]
    pub fn verb(&self) -> Verb {
        self.action.verb()
    }

    /// Returns the stage that undoes this one, if it has one.
    ///
    /// Apply becomes delete of the same manifest and namespace creation
    /// becomes namespace deletion. Deletions, collection deletes and external
    /// commands have no inverse.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let action = self.action.inverse()?;
        Some(Self {
            name: inverse_name(&self.name),
            action,
            readiness: self.teardown_readiness.clone(),
            on_timeout: self.teardown_on_timeout,
            teardown_readiness: None,
            teardown_on_timeout: TimeoutPolicy::default(),
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind())?;
        if let Some(ref spec) = self.readiness {
            write!(f, " wait {spec} [{}]", self.on_timeout)?;
        }
        Ok(())
    }
}

fn inverse_name(name: &str) -> String {
    ["apply-", "create-"]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .map_or_else(|| format!("undo-{name}"), |rest| format!("delete-{rest}"))
}
