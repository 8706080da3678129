//! Pod image and package inventory.

use super::plan::PackageAuditPlan;
use super::report::{ImageReport, NamespaceImages, PodPackages};
use crate::command::{ClusterCli, CommandRunner};
use crate::conditions::{parse_image_listing, parse_package_listing};
use tracing::{info, warn};

/// Lists the image and digest of every pod in each namespace.
///
/// A namespace that cannot be read is recorded with its error; it does not
/// fail the run.
pub async fn collect_images(runner: &dyn CommandRunner, cli: &ClusterCli, namespaces: &[String]) -> ImageReport {
    let mut report = ImageReport::default();
    for namespace in namespaces {
        let argv = cli.pod_images(namespace);
        let entry = match runner.run(&argv, None).await {
            Ok(output) if output.is_success() => {
                let pods = parse_image_listing(&output.stdout);
                info!(namespace = %namespace, pods = pods.len(), "Collected pod images");
                NamespaceImages {
                    namespace: namespace.clone(),
                    pods,
                    error: None,
                }
            }
            Ok(output) => {
                warn!(namespace = %namespace, "Could not list pod images: {}", output.stderr.trim());
                NamespaceImages {
                    namespace: namespace.clone(),
                    pods: Vec::new(),
                    error: Some(output.stderr.trim().to_string()),
                }
            }
            Err(e) => {
                warn!(namespace = %namespace, "Could not list pod images: {}", e);
                NamespaceImages {
                    namespace: namespace.clone(),
                    pods: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        report.namespaces.push(entry);
    }
    report
}

/// Lists the installed packages of the pods in `images` selected by the
/// audit's pod filter.
///
/// Pods come from the namespace's image listing, so a namespace that could
/// not be read yields no entries. A pod whose packages cannot be listed is
/// recorded with its error.
pub async fn collect_packages(
    runner: &dyn CommandRunner,
    cli: &ClusterCli,
    images: &NamespaceImages,
    audit: &PackageAuditPlan,
) -> Vec<PodPackages> {
    let mut entries = Vec::new();
    for pod in images.pods.iter().filter(|p| p.pod.contains(&audit.pod_filter)) {
        let argv = cli.pod_packages(&images.namespace, &pod.pod);
        let (packages, error) = match runner.run(&argv, None).await {
            Ok(output) if output.is_success() => {
                let packages = parse_package_listing(&output.stdout, &audit.package_filter);
                info!(namespace = %images.namespace, pod = %pod.pod, packages = packages.len(), "Collected pod packages");
                (packages, None)
            }
            Ok(output) => {
                warn!(pod = %pod.pod, "Could not list pod packages: {}", output.stderr.trim());
                (Vec::new(), Some(output.stderr.trim().to_string()))
            }
            Err(e) => {
                warn!(pod = %pod.pod, "Could not list pod packages: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };
        entries.push(PodPackages {
            namespace: images.namespace.clone(),
            pod: pod.pod.clone(),
            packages,
            error,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::testing::ScriptedRunner;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_collect_records_failures() {
        let runner = ScriptedRunner::new()
            .on(
                &["pods", "bookinfo"],
                vec![CommandOutput::success("web-1\tquay.io/web:1|quay.io/web@sha256:abc \n")],
            )
            .on(
                &["pods", "istio-system"],
                vec![CommandOutput::failure(1, "Error from server (Forbidden)")],
            );
        let namespaces = vec!["istio-system".to_string(), "bookinfo".to_string()];
        let report = collect_images(&runner, &ClusterCli::default(), &namespaces).await;

        assert_eq!(report.namespaces.len(), 2);
        assert_eq!(report.namespaces[0].error.as_deref(), Some("Error from server (Forbidden)"));
        assert_eq!(report.namespaces[1].pods[0].containers[0].digest(), Some("sha256:abc"));
    }

    #[tokio::test]
    async fn test_packages_of_filtered_pods() {
        let runner = ScriptedRunner::new()
            .on(
                &["rsh", "istiod-basic-7c9"],
                vec![CommandOutput::success(
                    "bash-4.4.19-14.el8.x86_64\nservicemesh-pilot-discovery-2.0.0-7.el8.x86_64\n",
                )],
            )
            .on(
                &["rsh", "istio-ingressgateway-5d8"],
                vec![CommandOutput::failure(1, "error: unable to upgrade connection")],
            );
        let images = NamespaceImages {
            namespace: "istio-system".to_string(),
            pods: parse_image_listing(
                "istiod-basic-7c9\tpilot:2.0|pilot@sha256:1 \n\
                 istio-ingressgateway-5d8\tproxyv2:2.0|proxyv2@sha256:2 \n\
                 grafana-6b7\tgrafana:2.0|grafana@sha256:3 \n",
            ),
            error: None,
        };
        let entries =
            collect_packages(&runner, &ClusterCli::default(), &images, &PackageAuditPlan::default()).await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pod, "istiod-basic-7c9");
        assert_eq!(entries[0].packages, vec!["servicemesh-pilot-discovery-2.0.0-7.el8.x86_64"]);
        assert_eq!(entries[1].error.as_deref(), Some("error: unable to upgrade connection"));
        assert_eq!(runner.count(&["grafana-6b7"]), 0);
    }
}
