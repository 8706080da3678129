//! Stage lists derived from a plan.

use super::plan::{MeshInstallPlan, OperatorSource};
use crate::command::ClusterCli;
use crate::poll::{ReadinessSpec, ResourceRef};
use crate::stages::Stage;

const NAMESPACE_KIND: &str = "namespace";
const CSV_KIND: &str = "csv";

/// The persistent install stages, in order.
///
/// Namespaces are created just before the resources that need them, so
/// inverting this list yields the teardown order: member-roll, workload
/// namespaces, control plane, its namespace, then subscriptions newest first.
#[must_use]
pub fn install_stages(plan: &MeshInstallPlan, cli: &ClusterCli) -> Vec<Stage> {
    let mut stages = Vec::new();
    if plan.components.operators {
        stages.extend(operator_stages(plan, cli));
    }
    if plan.components.control_plane {
        stages.push(namespace_stage(plan, &plan.control_plane.namespace));
        stages.push(control_plane_stage(plan));
    }
    for namespace in plan.workload_namespaces() {
        stages.push(namespace_stage(plan, &namespace));
    }
    if plan.components.control_plane {
        stages.push(member_roll_stage(plan));
    }
    stages
}

/// The smoke workload's deploy stage and its teardown, or `None` when smoke
/// is not selected.
#[must_use]
pub fn smoke_stages(plan: &MeshInstallPlan) -> Option<(Stage, Stage)> {
    if !plan.components.smoke {
        return None;
    }
    let smoke = &plan.smoke;
    let waits = &plan.waits;
    let verify = Stage::apply_file("apply-smoke-workload", Some(smoke.namespace.as_str()), &smoke.manifest)
        .with_readiness(
            waits
                .smoke
                .window(ReadinessSpec::pods_ready(&smoke.namespace, smoke.expected_containers)),
            waits.smoke.on_timeout,
        )
        .with_teardown_readiness(
            waits.deletion.window(ReadinessSpec::absent(
                ResourceRef::collection("pod"),
                Some(smoke.namespace.as_str()),
            )),
            waits.deletion.on_timeout,
        );
    let teardown = verify.inverse()?;
    Some((verify, teardown))
}

/// Stages run after the inverted install list during uninstall.
#[must_use]
pub fn cleanup_stages(plan: &MeshInstallPlan) -> Vec<Stage> {
    if !plan.components.operators {
        return Vec::new();
    }
    let namespace = &plan.operators.namespace;
    vec![Stage::delete_collection("delete-operator-csvs", CSV_KIND, namespace).with_readiness(
        plan.waits
            .deletion
            .window(ReadinessSpec::absent(ResourceRef::collection(CSV_KIND), Some(namespace.as_str()))),
        plan.waits.deletion.on_timeout,
    )]
}

fn operator_stages(plan: &MeshInstallPlan, cli: &ClusterCli) -> Vec<Stage> {
    let operators = &plan.operators;
    let waits = &plan.waits;
    let deletion = waits.deletion;

    let mut stages: Vec<Stage> = operators
        .grants
        .iter()
        .map(|grant| {
            Stage::external(
                format!("grant-anyuid-{}-{}", grant.namespace, grant.service_account),
                cli.grant_anyuid(&grant.service_account, &grant.namespace),
            )
        })
        .collect();

    let applies: Vec<Stage> = match operators.source {
        OperatorSource::Subscriptions(ref subscriptions) => subscriptions
            .ordered()
            .iter()
            .map(|(role, manifest)| {
                Stage::apply_file(format!("apply-subscription-{role}"), None, *manifest).with_teardown_readiness(
                    deletion.window(ReadinessSpec::absent(ResourceRef::manifest(*manifest), None)),
                    deletion.on_timeout,
                )
            })
            .collect(),
        OperatorSource::Manifest(ref manifest) => vec![Stage::apply_file(
            "apply-operator",
            Some(operators.namespace.as_str()),
            manifest,
        )
        .with_teardown_readiness(
            deletion.window(ReadinessSpec::absent(
                ResourceRef::manifest(manifest),
                Some(operators.namespace.as_str()),
            )),
            deletion.on_timeout,
        )],
    };
    stages.extend(applies);

    // Only the last operator waits: the pods of all of them settle together.
    if let Some(last) = stages.pop() {
        stages.push(last.with_readiness(
            waits
                .operator_pods
                .window(ReadinessSpec::pods_settled(&operators.namespace, operators.allow_empty_namespace)),
            waits.operator_pods.on_timeout,
        ));
    }
    stages
}

fn namespace_stage(plan: &MeshInstallPlan, namespace: &str) -> Stage {
    Stage::create_namespace(namespace).with_teardown_readiness(
        plan.waits
            .deletion
            .window(ReadinessSpec::absent(ResourceRef::named(NAMESPACE_KIND, namespace), None)),
        plan.waits.deletion.on_timeout,
    )
}

fn control_plane_stage(plan: &MeshInstallPlan) -> Stage {
    let cp = &plan.control_plane;
    let waits = &plan.waits;
    Stage::apply_file("apply-control-plane", Some(cp.namespace.as_str()), &cp.manifest)
        .with_readiness(
            waits.control_plane.window(ReadinessSpec::condition(
                &cp.kind,
                &cp.name,
                Some(cp.namespace.as_str()),
                cp.installed.clone(),
            )),
            waits.control_plane.on_timeout,
        )
        .with_teardown_readiness(
            waits.deletion.window(ReadinessSpec::absent(
                ResourceRef::named(&cp.kind, &cp.name),
                Some(cp.namespace.as_str()),
            )),
            waits.deletion.on_timeout,
        )
}

fn member_roll_stage(plan: &MeshInstallPlan) -> Stage {
    let roll = &plan.member_roll;
    let namespace = &plan.control_plane.namespace;
    let waits = &plan.waits;
    Stage::apply_file("apply-member-roll", Some(namespace.as_str()), &roll.manifest)
        .with_readiness(
            waits.member_roll.window(ReadinessSpec::condition(
                &roll.kind,
                &roll.name,
                Some(namespace.as_str()),
                roll.ready.clone(),
            )),
            waits.member_roll.on_timeout,
        )
        .with_teardown_readiness(
            waits.deletion.window(ReadinessSpec::absent(
                ResourceRef::named(&roll.kind, &roll.name),
                Some(namespace.as_str()),
            )),
            waits.deletion.on_timeout,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::plan::{Component, ComponentSet, PolicyGrant};
    use crate::pipeline::validate_stages;
    use crate::poll::ReadinessCheck;
    use crate::stages::{StageKind, TimeoutPolicy};
    use crate::testing::sample_plan;
    use pretty_assertions::assert_eq;

    fn names(stages: &[Stage]) -> Vec<String> {
        stages.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn test_install_order() {
        let stages = install_stages(&sample_plan(), &ClusterCli::default());
        assert_eq!(
            names(&stages),
            vec![
                "apply-subscription-logging",
                "apply-subscription-tracing",
                "apply-subscription-dashboard",
                "apply-subscription-mesh",
                "create-namespace-istio-system",
                "apply-control-plane",
                "create-namespace-bookinfo",
                "apply-member-roll",
            ]
        );
        assert!(validate_stages(&stages).is_ok());
    }

    #[test]
    fn test_uninstall_order_is_mirror() {
        let stages = install_stages(&sample_plan(), &ClusterCli::default());
        let inverted: Vec<Stage> = stages.iter().rev().filter_map(Stage::inverse).collect();
        assert_eq!(
            names(&inverted),
            vec![
                "delete-member-roll",
                "delete-namespace-bookinfo",
                "delete-control-plane",
                "delete-namespace-istio-system",
                "delete-subscription-mesh",
                "delete-subscription-dashboard",
                "delete-subscription-tracing",
                "delete-subscription-logging",
            ]
        );
        assert!(inverted
            .iter()
            .all(|s| matches!(s.readiness.as_ref().map(|r| &r.check), Some(ReadinessCheck::Absent))));
    }

    #[test]
    fn test_only_last_subscription_waits_for_pods() {
        let stages = install_stages(&sample_plan(), &ClusterCli::default());
        let waiting: Vec<&str> = stages[..4]
            .iter()
            .filter(|s| s.readiness.is_some())
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(waiting, vec!["apply-subscription-mesh"]);
        assert_eq!(
            stages[3].readiness.as_ref().unwrap().check,
            ReadinessCheck::PodsSettled { allow_empty: false }
        );
    }

    #[test]
    fn test_empty_operator_namespace_can_settle() {
        let mut plan = sample_plan();
        plan.operators.allow_empty_namespace = true;
        let stages = install_stages(&plan, &ClusterCli::default());
        assert_eq!(
            stages[3].readiness.as_ref().unwrap().check,
            ReadinessCheck::PodsSettled { allow_empty: true }
        );
    }

    #[test]
    fn test_control_plane_policy() {
        let stages = install_stages(&sample_plan(), &ClusterCli::default());
        let cp = stages.iter().find(|s| s.name == "apply-control-plane").unwrap();
        assert_eq!(cp.on_timeout, TimeoutPolicy::Escalate);
        let spec = cp.readiness.as_ref().unwrap();
        assert_eq!(spec.timeout.as_secs(), 1200);
        assert_eq!(spec.namespace.as_deref(), Some("istio-system"));
    }

    #[test]
    fn test_grants_come_first_and_have_no_inverse() {
        let mut plan = sample_plan();
        plan.operators.grants.push(PolicyGrant {
            service_account: "default".to_string(),
            namespace: "bookinfo".to_string(),
        });
        let stages = install_stages(&plan, &ClusterCli::default());
        assert_eq!(stages[0].name, "grant-anyuid-bookinfo-default");
        assert_eq!(stages[0].kind(), StageKind::RunExternalScript);
        assert!(stages[0].inverse().is_none());
    }

    #[test]
    fn test_operator_manifest_source() {
        let mut plan = sample_plan();
        plan.operators.source = OperatorSource::Manifest("operator.yaml".into());
        plan.components = ComponentSet::from_components(&[Component::Operators]);
        let stages = install_stages(&plan, &ClusterCli::default());
        assert_eq!(names(&stages), vec!["apply-operator"]);
        assert!(stages[0].readiness.is_some());
    }

    #[test]
    fn test_smoke_only_creates_test_namespace() {
        let mut plan = sample_plan();
        plan.components = ComponentSet::from_components(&[Component::Smoke]);
        let stages = install_stages(&plan, &ClusterCli::default());
        assert_eq!(names(&stages), vec!["create-namespace-bookinfo"]);
        assert!(cleanup_stages(&plan).is_empty());
    }

    #[test]
    fn test_smoke_stages() {
        let (verify, teardown) = smoke_stages(&sample_plan()).unwrap();
        assert_eq!(verify.name, "apply-smoke-workload");
        assert_eq!(
            verify.readiness.as_ref().unwrap().check,
            ReadinessCheck::PodsReady {
                expected_containers: Some(2)
            }
        );
        assert_eq!(teardown.name, "delete-smoke-workload");
        assert_eq!(teardown.kind(), StageKind::DeleteManifest);
        assert_eq!(teardown.readiness.as_ref().unwrap().check, ReadinessCheck::Absent);
    }

    #[test]
    fn test_no_smoke_stages_when_deselected() {
        let mut plan = sample_plan();
        plan.components.smoke = false;
        assert!(smoke_stages(&plan).is_none());
    }

    #[test]
    fn test_cleanup_deletes_csvs() {
        let stages = cleanup_stages(&sample_plan());
        assert_eq!(names(&stages), vec!["delete-operator-csvs"]);
        let (argv, _) = stages[0].action.render(&ClusterCli::default());
        assert_eq!(argv, vec!["oc", "delete", "csv", "-n", "openshift-operators", "--all"]);
    }
}
