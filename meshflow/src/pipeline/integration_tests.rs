//! End-to-end sequencing tests against a scripted cluster.

#[cfg(test)]
mod tests {
    use crate::command::{ClusterCli, CommandOutput};
    use crate::conditions::ConditionCheck;
    use crate::pipeline::StageSequencer;
    use crate::poll::{PollOutcome, ReadinessSpec, ResourceRef};
    use crate::stages::{Stage, StageStatus, TimeoutPolicy};
    use crate::testing::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn sequencer(runner: &Arc<ScriptedRunner>) -> StageSequencer {
        StageSequencer::new(runner.clone(), ClusterCli::default())
    }

    fn abc() -> Vec<Stage> {
        ["a", "b", "c"]
            .iter()
            .map(|name| {
                Stage::apply_file(format!("apply-{name}"), Some("ns1"), format!("{name}.yaml")).with_teardown_readiness(
                    ReadinessSpec::absent(ResourceRef::manifest(format!("{name}.yaml")), Some("ns1")),
                    TimeoutPolicy::Continue,
                )
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_plane_converges_on_third_query() {
        let stages = vec![
            Stage::create_namespace("ns1"),
            Stage::apply_file("apply-control-plane", Some("ns1"), "cr.yaml").with_readiness(
                ReadinessSpec::condition(
                    "ServiceMeshControlPlane",
                    "basic",
                    Some("ns1"),
                    ConditionCheck::new("Installed", "True").with_reason("InstallSuccessful"),
                )
                .with_window(Duration::from_secs(1), Duration::from_secs(5)),
                TimeoutPolicy::Escalate,
            ),
        ];
        let not_yet = CommandOutput::success("Installed=False, reason=InstallInProgress, message=installing");
        let runner = Arc::new(ScriptedRunner::new().on(
            &["ServiceMeshControlPlane/basic", "go-template"],
            vec![
                not_yet.clone(),
                not_yet,
                CommandOutput::success("Installed=True, reason=InstallSuccessful, message=all components ready"),
            ],
        ));

        let report = sequencer(&runner).run_forward(&stages).await;

        assert!(report.completed());
        assert_eq!(report.stage_names(), vec!["create-namespace-ns1", "apply-control-plane"]);
        match report.result("apply-control-plane").unwrap().poll {
            Some(PollOutcome::Satisfied { attempts, elapsed_ms }) => {
                assert_eq!(attempts, 3);
                assert!(elapsed_ms >= 2000);
            }
            ref other => panic!("unexpected poll outcome: {other:?}"),
        }
        assert_eq!(runner.count(&["go-template"]), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backward_runs_in_reverse() {
        let runner = Arc::new(ScriptedRunner::new());
        let report = sequencer(&runner).run_backward(&abc()).await;

        assert_eq!(report.stage_names(), vec!["delete-c", "delete-b", "delete-a"]);
        let deletes: Vec<String> = runner
            .argvs()
            .into_iter()
            .filter(|argv| argv[1] == "delete")
            .map(|argv| argv[argv.len() - 1].clone())
            .collect();
        assert_eq!(deletes, vec!["c.yaml", "b.yaml", "a.yaml"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_middle_stage_stops_sequence() {
        let runner = Arc::new(ScriptedRunner::new().on(
            &["apply", "b.yaml"],
            vec![CommandOutput::failure(1, "error: error validating \"b.yaml\"")],
        ));
        let report = sequencer(&runner).run_forward(&abc()).await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].status, StageStatus::Succeeded);
        assert_eq!(report.results[1].status, StageStatus::Failed);
        assert_eq!(report.results[1].exit_code, Some(1));
        assert_eq!(runner.count(&["c.yaml"]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_then_uninstall_round() {
        let runner = Arc::new(ScriptedRunner::new());
        let seq = sequencer(&runner);
        let stages = abc();

        let forward = seq.run_forward(&stages).await;
        let backward = seq.run_backward(&stages).await;

        assert!(forward.completed() && backward.completed());
        let mut mirrored: Vec<&str> = forward.stage_names();
        mirrored.reverse();
        let expected: Vec<String> = mirrored.iter().map(|n| n.replacen("apply-", "delete-", 1)).collect();
        assert_eq!(backward.stage_names(), expected);
    }
}
