//! Install and uninstall runs.
//!
//! The [`Orchestrator`] turns a [`MeshInstallPlan`] into stage lists and
//! drives them through a [`StageSequencer`]. Entry checks (plan validation,
//! the session probe) are the only failures returned as `Err`; everything
//! that happens once stages start running is recorded in the report.

mod inventory;
mod plan;
mod report;
mod stages;

pub use inventory::{collect_images, collect_packages};
pub use plan::{
    Component, ComponentSet, ControlPlanePlan, MemberRollPlan, MeshInstallPlan, OperatorPlan,
    OperatorSource, OperatorSubscriptions, PackageAuditPlan, PolicyGrant, SmokePlan, WaitPolicies,
    WaitPolicy,
};
pub use report::{ImageReport, InstallReport, NamespaceImages, PodPackages, RunOutcome, UninstallReport};
pub use stages::{cleanup_stages, install_stages, smoke_stages};

use crate::cancellation::CancellationToken;
use crate::command::{ClusterCli, CommandRunner, ToleranceTable};
use crate::errors::MeshflowError;
use crate::events::{EventSink, RunEvent};
use crate::pipeline::{validate_stages, SequenceReport, StageSequencer};
use crate::stages::Stage;
use chrono::Utc;
use std::slice;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs installs and uninstalls of one plan.
#[derive(Debug)]
pub struct Orchestrator {
    plan: MeshInstallPlan,
    sequencer: StageSequencer,
}

impl Orchestrator {
    /// Creates an orchestrator for `plan`.
    #[must_use]
    pub fn new(plan: MeshInstallPlan, runner: Arc<dyn CommandRunner>, cli: ClusterCli) -> Self {
        Self {
            plan,
            sequencer: StageSequencer::new(runner, cli),
        }
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.sequencer = self.sequencer.with_cancellation(cancel);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sequencer = self.sequencer.with_event_sink(sink);
        self
    }

    /// Replaces the tolerance table.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: ToleranceTable) -> Self {
        self.sequencer = self.sequencer.with_tolerance(tolerance);
        self
    }

    /// Returns the plan.
    #[must_use]
    pub fn plan(&self) -> &MeshInstallPlan {
        &self.plan
    }

    /// The stages an install runs, smoke verification and teardown last.
    #[must_use]
    pub fn install_stages(&self) -> Vec<Stage> {
        let mut stages = install_stages(&self.plan, self.sequencer.cli());
        if let Some((verify, teardown)) = smoke_stages(&self.plan) {
            stages.push(verify);
            stages.push(teardown);
        }
        stages
    }

    /// The stages an uninstall runs.
    #[must_use]
    pub fn uninstall_stages(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = install_stages(&self.plan, self.sequencer.cli())
            .iter()
            .rev()
            .filter_map(Stage::inverse)
            .collect();
        stages.extend(cleanup_stages(&self.plan));
        stages
    }

    /// Installs the selected components.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan is invalid, the cluster session is
    /// missing, or the run was cancelled before it started. Stage failures
    /// are reported in the [`InstallReport`].
    pub async fn install(&self) -> Result<InstallReport, MeshflowError> {
        let stages = install_stages(&self.plan, self.sequencer.cli());
        let smoke = smoke_stages(&self.plan);

        let mut all = stages.clone();
        if let Some((ref verify, ref teardown)) = smoke {
            all.extend([verify.clone(), teardown.clone()]);
        }
        self.check_entry(&all).await?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, components = %self.plan.components, "Starting install");
        self.sequencer
            .event_sink()
            .emit(&RunEvent::run_started(&run_id, "install"));

        let mut sequence = self.sequencer.run_forward(&stages).await;
        let images = match smoke {
            Some((verify, teardown)) if sequence.completed() => {
                let verified = self.sequencer.run_forward(slice::from_ref(&verify)).await;
                let verified_ok = verified.completed();
                sequence.absorb(verified);
                let images = self.inventory(&sequence).await;
                if verified_ok {
                    sequence.absorb(self.sequencer.run_forward(slice::from_ref(&teardown)).await);
                }
                images
            }
            _ => self.inventory(&sequence).await,
        };

        let outcome = RunOutcome::of(&sequence);
        info!(run_id = %run_id, outcome = %outcome, stages = sequence.results.len(), "Install finished");
        self.sequencer
            .event_sink()
            .emit(&RunEvent::run_finished(&run_id, &outcome.to_string()));

        Ok(InstallReport {
            run_id,
            outcome,
            started_at,
            ended_at: Utc::now(),
            sequence,
            images,
        })
    }

    /// Removes the selected components in reverse install order, then the
    /// operators' cluster service versions.
    ///
    /// # Errors
    ///
    /// Same entry checks as [`Orchestrator::install`].
    pub async fn uninstall(&self) -> Result<UninstallReport, MeshflowError> {
        let stages = install_stages(&self.plan, self.sequencer.cli());
        let cleanup = cleanup_stages(&self.plan);
        self.check_entry(&self.uninstall_stages()).await?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, components = %self.plan.components, "Starting uninstall");
        self.sequencer
            .event_sink()
            .emit(&RunEvent::run_started(&run_id, "uninstall"));

        let mut sequence = self.sequencer.run_backward(&stages).await;
        if sequence.completed() && !cleanup.is_empty() {
            sequence.absorb(self.sequencer.run_forward(&cleanup).await);
        }

        let outcome = RunOutcome::of(&sequence);
        info!(run_id = %run_id, outcome = %outcome, stages = sequence.results.len(), "Uninstall finished");
        self.sequencer
            .event_sink()
            .emit(&RunEvent::run_finished(&run_id, &outcome.to_string()));

        Ok(UninstallReport {
            run_id,
            outcome,
            started_at,
            ended_at: Utc::now(),
            sequence,
        })
    }

    async fn check_entry(&self, stages: &[Stage]) -> Result<(), MeshflowError> {
        self.plan.validate()?;
        validate_stages(stages)?;
        self.probe_session().await?;
        let cancel = self.sequencer.cancellation();
        if cancel.is_cancelled() {
            return Err(MeshflowError::Cancelled(
                cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
            ));
        }
        Ok(())
    }

    async fn probe_session(&self) -> Result<(), MeshflowError> {
        let cli = self.sequencer.cli();
        let argv = cli.session_probe();
        match self.sequencer.runner().run(&argv, None).await {
            Ok(output) if output.is_success() => {
                debug!("Cluster session: {}", output.stdout.trim());
                Ok(())
            }
            Ok(output) => Err(MeshflowError::missing_prerequisite(
                "cluster session",
                output.stderr.trim(),
            )),
            Err(e) => Err(MeshflowError::missing_prerequisite(
                format!("cluster tool `{}`", cli.tool()),
                e.to_string(),
            )),
        }
    }

    async fn inventory(&self, sequence: &SequenceReport) -> Option<ImageReport> {
        if sequence.was_cancelled() {
            warn!("Skipping image report for a cancelled run");
            return None;
        }
        let runner = self.sequencer.runner().as_ref();
        let cli = self.sequencer.cli();
        let namespaces = self.plan.touched_namespaces();
        let mut report = collect_images(runner, cli, &namespaces).await;

        if let Some(ref audit) = self.plan.package_audit {
            let namespace = &self.plan.control_plane.namespace;
            if let Some(images) = report.namespaces.iter().find(|n| &n.namespace == namespace) {
                report.packages = collect_packages(runner, cli, images, audit).await;
            }
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::events::CollectingEventSink;
    use crate::stages::StageStatus;
    use crate::testing::{sample_plan, ScriptedRunner};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const OPERATOR_PODS: &str = "NAME READY STATUS RESTARTS AGE\n\
                                 istio-operator-6d8f 1/1 Running 0 2m\n\
                                 kiali-operator-55c9 1/1 Running 0 2m";
    const SMOKE_PODS: &str = "NAME READY STATUS RESTARTS AGE\n\
                              productpage-v1-7f9 2/2 Running 0 40s\n\
                              reviews-v1-5c4 2/2 Running 0 40s";

    fn healthy_cluster() -> ScriptedRunner {
        ScriptedRunner::new()
            .on(&["whoami"], vec![CommandOutput::success("kube:admin")])
            .on(
                &["get", "pod", "openshift-operators"],
                vec![CommandOutput::success(OPERATOR_PODS)],
            )
            .on(
                &["ServiceMeshControlPlane/basic", "go-template"],
                vec![CommandOutput::success(
                    "Installed=True, reason=InstallSuccessful, message=Successfully installed all mesh components",
                )],
            )
            .on(
                &["ServiceMeshMemberRoll/default", "go-template"],
                vec![CommandOutput::success("Ready=True, reason=Configured, message=All namespaces configured")],
            )
            .on(
                &["get", "pod", "bookinfo"],
                vec![
                    CommandOutput::success(SMOKE_PODS),
                    CommandOutput::success("No resources found in bookinfo namespace."),
                ],
            )
            .on(
                &["get", "pods", "bookinfo"],
                vec![CommandOutput::success(
                    "productpage-v1-7f9\tquay.io/maistra/productpage:2.4|quay.io/maistra/productpage@sha256:1f2e proxyv2:2.4|quay.io/maistra/proxyv2@sha256:9a8b \n",
                )],
            )
    }

    fn orchestrator(runner: &Arc<ScriptedRunner>) -> Orchestrator {
        Orchestrator::new(sample_plan(), runner.clone(), ClusterCli::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_happy_path() {
        let runner = Arc::new(healthy_cluster());
        let sink = Arc::new(CollectingEventSink::new());
        let report = orchestrator(&runner)
            .with_event_sink(sink.clone())
            .install()
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            report.sequence.stage_names(),
            vec![
                "apply-subscription-logging",
                "apply-subscription-tracing",
                "apply-subscription-dashboard",
                "apply-subscription-mesh",
                "create-namespace-istio-system",
                "apply-control-plane",
                "create-namespace-bookinfo",
                "apply-member-roll",
                "apply-smoke-workload",
                "delete-smoke-workload",
            ]
        );

        // Images are listed while the smoke workload is still running.
        let images_at = runner.position(&["get", "pods", "bookinfo"]).unwrap();
        let teardown_at = runner.position(&["delete", "bookinfo"]).unwrap();
        assert!(images_at < teardown_at);

        let images = report.images.unwrap();
        let namespaces: Vec<&str> = images.namespaces.iter().map(|n| n.namespace.as_str()).collect();
        assert_eq!(namespaces, vec!["openshift-operators", "istio-system", "bookinfo"]);
        assert_eq!(images.namespaces[2].pods[0].containers.len(), 2);

        assert!(images.packages.is_empty());
        assert_eq!(runner.count(&["rsh"]), 0);

        assert_eq!(sink.events_of_type("run.started").len(), 1);
        assert_eq!(sink.events_of_type("run.finished").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_package_audit_of_control_plane_pods() {
        let runner = Arc::new(
            healthy_cluster()
                .on(
                    &["get", "pods", "istio-system"],
                    vec![CommandOutput::success(
                        "istiod-basic-7c9\tpilot:2.4|pilot@sha256:77 \nprometheus-5f6\tprometheus:2.4|prometheus@sha256:88 \n",
                    )],
                )
                .on(
                    &["rsh", "istiod-basic-7c9"],
                    vec![CommandOutput::success(
                        "glibc-2.28-151.el8.x86_64\nservicemesh-pilot-discovery-2.4.0-1.el8.x86_64\n",
                    )],
                ),
        );
        let mut plan = sample_plan();
        plan.package_audit = Some(PackageAuditPlan::default());
        let report = Orchestrator::new(plan, runner.clone(), ClusterCli::default())
            .install()
            .await
            .unwrap();

        let packages = report.images.unwrap().packages;
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].namespace, "istio-system");
        assert_eq!(packages[0].pod, "istiod-basic-7c9");
        assert_eq!(packages[0].packages, vec!["servicemesh-pilot-discovery-2.4.0-1.el8.x86_64"]);
        assert_eq!(runner.count(&["rsh"]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_runs_before_any_stage() {
        let runner = Arc::new(healthy_cluster());
        orchestrator(&runner).install().await.unwrap();
        assert_eq!(runner.position(&["whoami"]), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_session_is_entry_error() {
        let runner = Arc::new(ScriptedRunner::new().on(
            &["whoami"],
            vec![CommandOutput::failure(1, "error: You must be logged in to the server (Unauthorized)")],
        ));
        let err = orchestrator(&runner).install().await.unwrap_err();

        match err {
            MeshflowError::MissingPrerequisite { what, detail } => {
                assert_eq!(what, "cluster session");
                assert!(detail.contains("logged in"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_tool_is_entry_error() {
        let runner = Arc::new(ScriptedRunner::new().fail_to_start(&["whoami"]));
        let err = orchestrator(&runner).uninstall().await.unwrap_err();
        assert!(err.to_string().contains("cluster tool `oc`"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_plan_runs_nothing() {
        let mut plan = sample_plan();
        plan.control_plane.name = String::new();
        let runner = Arc::new(healthy_cluster());
        let err = Orchestrator::new(plan, runner.clone(), ClusterCli::default())
            .install()
            .await
            .unwrap_err();

        assert!(matches!(err, MeshflowError::Config(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_wait_is_entry_error() {
        let mut plan = sample_plan();
        plan.waits.member_roll = WaitPolicy::from_secs(10, 5, crate::stages::TimeoutPolicy::Continue);
        let runner = Arc::new(healthy_cluster());
        let err = Orchestrator::new(plan, runner.clone(), ClusterCli::default())
            .install()
            .await
            .unwrap_err();

        assert!(matches!(err, MeshflowError::MalformedReadinessSpec(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_plane_failure_halts_install() {
        let runner = Arc::new(healthy_cluster().on(
            &["apply", "istio-system"],
            vec![CommandOutput::failure(1, "error: unable to recognize \"smcp.yaml\": no matches for kind")],
        ));
        let report = orchestrator(&runner).install().await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.sequence.results.last().unwrap().name, "apply-control-plane");
        assert_eq!(runner.count(&["new-project", "bookinfo"]), 0);
        assert_eq!(runner.count(&["apply", "bookinfo"]), 0);
        // The partial install is still inventoried.
        assert!(report.images.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_smoke_timeout_degrades_and_still_tears_down() {
        let runner = Arc::new(healthy_cluster().on(
            &["get", "pod", "bookinfo"],
            vec![
                CommandOutput::success("NAME READY STATUS RESTARTS AGE\nproductpage-v1-7f9 1/1 Running 0 40s"),
                CommandOutput::success("No resources found in bookinfo namespace."),
            ],
        ));
        let mut plan = sample_plan();
        plan.waits.smoke = WaitPolicy::from_secs(5, 5, crate::stages::TimeoutPolicy::Continue);
        let report = Orchestrator::new(plan, runner.clone(), ClusterCli::default())
            .install()
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Degraded);
        assert_eq!(report.exit_code(), 2);
        let smoke = report.sequence.result("apply-smoke-workload").unwrap();
        assert_eq!(smoke.status, StageStatus::TimedOut);
        assert!(report.sequence.result("delete-smoke-workload").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_uninstall_order_and_csv_cleanup() {
        let runner = Arc::new(ScriptedRunner::new());
        let report = orchestrator(&runner).uninstall().await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(
            report.sequence.stage_names(),
            vec![
                "delete-member-roll",
                "delete-namespace-bookinfo",
                "delete-control-plane",
                "delete-namespace-istio-system",
                "delete-subscription-mesh",
                "delete-subscription-dashboard",
                "delete-subscription-tracing",
                "delete-subscription-logging",
                "delete-operator-csvs",
            ]
        );
        let last = runner.argvs().into_iter().filter(|a| a.contains(&"delete".to_string())).last().unwrap();
        assert_eq!(last, vec!["oc", "delete", "csv", "-n", "openshift-operators", "--all"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uninstall_waits_for_absence() {
        let runner = Arc::new(ScriptedRunner::new().on(
            &["get", "namespace", "bookinfo"],
            vec![
                CommandOutput::success("NAME STATUS AGE\nbookinfo Terminating 3h"),
                CommandOutput::success("NAME STATUS AGE\nbookinfo Terminating 3h"),
                CommandOutput::failure(1, "Error from server (NotFound): namespaces \"bookinfo\" not found"),
            ],
        ));
        let report = orchestrator(&runner).uninstall().await.unwrap();

        assert!(report.sequence.completed());
        let poll = report
            .sequence
            .result("delete-namespace-bookinfo")
            .unwrap()
            .poll
            .as_ref()
            .unwrap();
        assert!(poll.is_satisfied());
        assert_eq!(poll.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let runner = Arc::new(healthy_cluster());
        let cancel = Arc::new(CancellationToken::new());
        cancel.cancel("interrupted");
        let err = orchestrator(&runner)
            .with_cancellation(cancel)
            .install()
            .await
            .unwrap_err();
        assert!(matches!(err, MeshflowError::Cancelled(ref r) if r == "interrupted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_install_skips_images() {
        let runner = Arc::new(healthy_cluster().on(
            &["ServiceMeshControlPlane/basic", "go-template"],
            vec![CommandOutput::success("Installed=False, reason=InstallInProgress, message=waiting")],
        ));
        let cancel = Arc::new(CancellationToken::new());
        let orchestrator = orchestrator(&runner).with_cancellation(cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            cancel.cancel("interrupted");
        });
        let report = orchestrator.install().await.unwrap();
        canceller.await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.exit_code(), 130);
        assert!(report.images.is_none());
        assert_eq!(runner.count(&["get", "pods"]), 0);
    }

    #[test]
    fn test_stage_previews() {
        let runner = Arc::new(ScriptedRunner::new());
        let orchestrator = orchestrator(&runner);
        let install: Vec<String> = orchestrator.install_stages().iter().map(|s| s.name.clone()).collect();
        assert_eq!(install.last().map(String::as_str), Some("delete-smoke-workload"));
        let uninstall = orchestrator.uninstall_stages();
        assert_eq!(uninstall.first().unwrap().name, "delete-member-roll");
        assert_eq!(uninstall.last().unwrap().name, "delete-operator-csvs");
    }
}
