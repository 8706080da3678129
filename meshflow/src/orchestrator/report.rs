//! Install and uninstall reports.

use crate::conditions::PodImages;
use crate::pipeline::SequenceReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every stage succeeded or was tolerated.
    Succeeded,
    /// Completed, but at least one wait timed out and was continued past.
    Degraded,
    /// A stage failed and the sequence halted.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

impl RunOutcome {
    /// Derives the outcome from a sequence report.
    #[must_use]
    pub fn of(sequence: &SequenceReport) -> Self {
        if sequence.was_cancelled() {
            Self::Cancelled
        } else if !sequence.completed() {
            Self::Failed
        } else if sequence.has_timeouts() {
            Self::Degraded
        } else {
            Self::Succeeded
        }
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Succeeded => 0,
            Self::Failed => 1,
            Self::Degraded => 2,
            Self::Cancelled => 130,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Pod images of one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceImages {
    /// Namespace.
    pub namespace: String,
    /// Pods and their container images.
    pub pods: Vec<PodImages>,
    /// Set when the namespace could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Installed packages of one audited pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodPackages {
    /// Namespace.
    pub namespace: String,
    /// Pod name.
    pub pod: String,
    /// Matching packages in listing order.
    pub packages: Vec<String>,
    /// Set when the pod's packages could not be listed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Image reference and digest of every pod in every touched namespace,
/// plus the package audit when enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReport {
    /// One entry per namespace, in plan order.
    pub namespaces: Vec<NamespaceImages>,
    /// One entry per audited pod.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PodPackages>,
}

impl fmt::Display for ImageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ns in &self.namespaces {
            writeln!(f, "namespace {}", ns.namespace)?;
            if let Some(ref error) = ns.error {
                writeln!(f, "  (unavailable: {error})")?;
                continue;
            }
            if ns.pods.is_empty() {
                writeln!(f, "  (no pods)")?;
            }
            for pod in &ns.pods {
                writeln!(f, "  pod {}", pod.pod)?;
                for container in &pod.containers {
                    writeln!(f, "    image  {}", container.image)?;
                    writeln!(f, "    digest {}", container.digest().unwrap_or(&container.image_id))?;
                }
            }
        }
        for entry in &self.packages {
            writeln!(f, "packages {}/{}", entry.namespace, entry.pod)?;
            if let Some(ref error) = entry.error {
                writeln!(f, "  (unavailable: {error})")?;
                continue;
            }
            for package in &entry.packages {
                writeln!(f, "  {package}")?;
            }
        }
        Ok(())
    }
}

fn render_sequence(
    f: &mut fmt::Formatter<'_>,
    operation: &str,
    run_id: &str,
    sequence: &SequenceReport,
) -> fmt::Result {
    writeln!(f, "{operation} {run_id}: {}", RunOutcome::of(sequence))?;
    for result in &sequence.results {
        writeln!(f, "  {}", result.summary())?;
        if let Some(failure) = result.failure() {
            writeln!(f, "    command: {}", failure.command)?;
            if let Some(code) = failure.exit_code {
                writeln!(f, "    exit code: {code}")?;
            }
        }
    }
    if let Some(ref halt) = sequence.halted {
        writeln!(f, "  {halt}")?;
    }
    Ok(())
}

/// The result of an install run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Run identifier.
    pub run_id: String,
    /// Overall outcome.
    pub outcome: RunOutcome,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
    /// Stage results, smoke stages included.
    pub sequence: SequenceReport,
    /// Pod images, absent when the run was cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageReport>,
}

impl InstallReport {
    /// Process exit code.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render_sequence(f, "install", &self.run_id, &self.sequence)?;
        if let Some(ref images) = self.images {
            writeln!(f, "images:")?;
            write!(f, "{images}")?;
        }
        Ok(())
    }
}

/// The result of an uninstall run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallReport {
    /// Run identifier.
    pub run_id: String,
    /// Overall outcome.
    pub outcome: RunOutcome,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
    /// Stage results, cleanup included.
    pub sequence: SequenceReport,
}

impl UninstallReport {
    /// Process exit code.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

impl fmt::Display for UninstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render_sequence(f, "uninstall", &self.run_id, &self.sequence)
    }
}
