//! Pod listing predicates.
//!
//! Operator and smoke-workload readiness is judged from the default pod
//! table (`NAME READY STATUS RESTARTS AGE`), not from conditions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const NOT_READY_PHASES: &[&str] = &["Pending", "ContainerCreating", "PodInitializing"];
const DONE_PHASES: &[&str] = &["Completed", "Succeeded"];

static READY_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)/(\d+)$").expect("static regex is valid"));

/// One row of the pod table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRow {
    /// Pod name.
    pub name: String,
    /// Ready containers.
    pub ready: u32,
    /// Total containers.
    pub total: u32,
    /// STATUS column (phase or waiting reason).
    pub status: String,
}

impl PodRow {
    /// Returns true if every container is ready and the pod is running.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == "Running" && self.total > 0 && self.ready == self.total
    }

    /// Returns true if the pod ran to completion.
    #[must_use]
    pub fn is_done(&self) -> bool {
        DONE_PHASES.contains(&self.status.as_str())
    }

    /// Returns true if the pod is still being scheduled or created.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        NOT_READY_PHASES.contains(&self.status.as_str()) || self.status.starts_with("Init:")
    }
}

/// Parsed pod listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTable {
    /// Rows in listing order.
    pub pods: Vec<PodRow>,
}

impl PodTable {
    /// Returns true if there are no pods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    /// At least one pod and none still pending or creating containers.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.pods.is_empty() && self.is_quiet()
    }

    /// No pod pending or creating containers. An empty listing is quiet.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        !self.pods.iter().any(PodRow::is_pending)
    }

    /// At least one pod, and every pod is running with all containers ready
    /// (or has completed).
    ///
    /// With `expected_containers`, every running pod must report exactly that
    /// many containers; a missing sidecar shows up as `1/1` instead of `2/2`.
    #[must_use]
    pub fn is_ready(&self, expected_containers: Option<u32>) -> bool {
        if self.pods.is_empty() {
            return false;
        }
        self.pods.iter().all(|pod| {
            if pod.is_done() {
                return true;
            }
            pod.is_ready() && expected_containers.map_or(true, |n| pod.total == n)
        })
    }

    /// Names of pods that are not ready, with their status.
    #[must_use]
    pub fn laggards(&self) -> Vec<String> {
        self.pods
            .iter()
            .filter(|pod| !pod.is_ready() && !pod.is_done())
            .map(|pod| format!("{} {}/{} {}", pod.name, pod.ready, pod.total, pod.status))
            .collect()
    }
}

/// Parses the default pod table. Header and malformed rows are skipped.
#[must_use]
pub fn parse_pod_table(raw: &str) -> PodTable {
    let pods = raw
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?;
            if name == "NAME" {
                return None;
            }
            let ready = columns.next()?;
            let status = columns.next()?;
            let captures = READY_COLUMN.captures(ready)?;
            Some(PodRow {
                name: name.to_string(),
                ready: captures[1].parse().ok()?,
                total: captures[2].parse().ok()?,
                status: status.to_string(),
            })
        })
        .collect();
    PodTable { pods }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOKINFO_READY: &str = "\
NAME                              READY   STATUS    RESTARTS   AGE
details-v1-78d78fbddf-5fh2k       2/2     Running   0          2m
productpage-v1-596598f447-nn6tc   2/2     Running   0          2m
ratings-v1-6c9dbf6b45-9hk2m       2/2     Running   0          2m
";

    const BOOKINFO_CREATING: &str = "\
NAME                              READY   STATUS              RESTARTS   AGE
details-v1-78d78fbddf-5fh2k       0/2     ContainerCreating   0          3s
productpage-v1-596598f447-nn6tc   0/2     Pending             0          3s
";

    #[test]
    fn test_parse_table() {
        let table = parse_pod_table(BOOKINFO_READY);
        assert_eq!(table.pods.len(), 3);
        assert_eq!(table.pods[0].name, "details-v1-78d78fbddf-5fh2k");
        assert_eq!(table.pods[0].ready, 2);
        assert_eq!(table.pods[0].total, 2);
        assert_eq!(table.pods[0].status, "Running");
    }

    #[test]
    fn test_no_resources() {
        let table = parse_pod_table("No resources found in bookinfo namespace.\n");
        assert!(table.is_empty());
        assert!(!table.is_settled());
        assert!(table.is_quiet());
        assert!(!table.is_ready(None));
    }

    #[test]
    fn test_settled() {
        assert!(parse_pod_table(BOOKINFO_READY).is_settled());
        assert!(!parse_pod_table(BOOKINFO_CREATING).is_settled());
        assert!(!parse_pod_table(BOOKINFO_CREATING).is_quiet());
    }

    #[test]
    fn test_ready_with_sidecars() {
        let table = parse_pod_table(BOOKINFO_READY);
        assert!(table.is_ready(None));
        assert!(table.is_ready(Some(2)));
        assert!(!table.is_ready(Some(3)));
    }

    #[test]
    fn test_missing_sidecar_is_not_ready() {
        let raw = "NAME READY STATUS RESTARTS AGE\nreviews-v1-abc 1/1 Running 0 1m\n";
        let table = parse_pod_table(raw);
        assert!(table.is_ready(None));
        assert!(!table.is_ready(Some(2)));
    }

    #[test]
    fn test_partially_ready() {
        let raw = "NAME READY STATUS RESTARTS AGE\nreviews-v1-abc 1/2 Running 0 1m\n";
        let table = parse_pod_table(raw);
        assert!(table.is_settled());
        assert!(!table.is_ready(None));
        assert_eq!(table.laggards(), vec!["reviews-v1-abc 1/2 Running".to_string()]);
    }

    #[test]
    fn test_completed_pods_do_not_block() {
        let raw = "NAME READY STATUS RESTARTS AGE\n\
                   job-xyz 0/1 Completed 0 1m\n\
                   web-abc 1/1 Running 0 1m\n";
        assert!(parse_pod_table(raw).is_ready(None));
    }

    #[test]
    fn test_init_containers_are_pending() {
        let raw = "NAME READY STATUS RESTARTS AGE\nweb-abc 0/2 Init:0/1 0 5s\n";
        assert!(!parse_pod_table(raw).is_settled());
    }
}
