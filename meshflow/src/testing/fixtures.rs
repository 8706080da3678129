//! Test fixtures.

use crate::conditions::ConditionCheck;
use crate::orchestrator::{
    ComponentSet, ControlPlanePlan, MemberRollPlan, MeshInstallPlan, OperatorPlan, OperatorSource,
    OperatorSubscriptions, SmokePlan, WaitPolicies,
};
use std::collections::BTreeSet;

/// A full plan with default waits: four subscriptions into
/// `openshift-operators`, control plane `basic` in `istio-system`, and the
/// bookinfo smoke workload as the only member.
#[must_use]
pub fn sample_plan() -> MeshInstallPlan {
    MeshInstallPlan {
        operators: OperatorPlan {
            namespace: "openshift-operators".to_string(),
            source: OperatorSource::Subscriptions(OperatorSubscriptions {
                logging: "subscriptions/elasticsearch.yaml".into(),
                tracing: "subscriptions/jaeger.yaml".into(),
                dashboard: "subscriptions/kiali.yaml".into(),
                mesh: "subscriptions/servicemesh.yaml".into(),
            }),
            grants: Vec::new(),
            allow_empty_namespace: false,
        },
        control_plane: ControlPlanePlan {
            name: "basic".to_string(),
            namespace: "istio-system".to_string(),
            kind: "ServiceMeshControlPlane".to_string(),
            manifest: "smcp.yaml".into(),
            installed: ConditionCheck::new("Installed", "True"),
        },
        member_roll: MemberRollPlan {
            name: "default".to_string(),
            kind: "ServiceMeshMemberRoll".to_string(),
            manifest: "smmr.yaml".into(),
            ready: ConditionCheck::new("Ready", "True"),
        },
        member_namespaces: BTreeSet::from(["bookinfo".to_string()]),
        smoke: SmokePlan {
            namespace: "bookinfo".to_string(),
            manifest: "bookinfo.yaml".into(),
            expected_containers: Some(2),
        },
        components: ComponentSet::all(),
        waits: WaitPolicies::default(),
        package_audit: None,
    }
}
