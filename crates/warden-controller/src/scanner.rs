//! Workload discovery.

use warden_core::ImagePolicySpec;

use crate::cluster::{ClusterClient, ClusterError, Workload};
use crate::image::match_repository;

/// Whether any container in `workload` references `spec.repository`.
pub fn references_repository(
    workload: &Workload,
    spec: &ImagePolicySpec,
    default_registries: &[String],
) -> bool {
    workload
        .containers
        .iter()
        .any(|c| match_repository(&c.image, &spec.repository, default_registries).is_some())
}

/// Candidate workloads for a policy, in namespace then workload order.
///
/// Namespaces are narrowed by `namespaceSelector` (all namespaces when
/// absent), workloads by `workloadSelector`, and only workloads with a
/// container referencing the policy's repository are kept.
pub async fn scan(
    cluster: &dyn ClusterClient,
    spec: &ImagePolicySpec,
    default_registries: &[String],
) -> Result<Vec<Workload>, ClusterError> {
    let namespaces = cluster
        .list_namespaces(spec.namespace_selector.as_ref())
        .await?;

    let mut candidates = Vec::new();
    for ns in &namespaces {
        let workloads = cluster
            .list_workloads(&ns.name, spec.workload_selector.as_ref())
            .await?;
        candidates.extend(
            workloads
                .into_iter()
                .filter(|w| references_repository(w, spec, default_registries)),
        );
    }

    tracing::debug!(
        repository = %spec.repository,
        namespaces = namespaces.len(),
        candidates = candidates.len(),
        "workload scan complete"
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Container, InMemoryCluster};
    use warden_core::{LabelSelector, Labels, Repository};

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn workload(ns: &str, name: &str, image: &str, l: Labels) -> Workload {
        Workload {
            name: name.into(),
            namespace: ns.into(),
            labels: l,
            containers: vec![
                Container {
                    name: "sidecar".into(),
                    image: "envoyproxy/envoy:v1.30".into(),
                },
                Container {
                    name: "app".into(),
                    image: image.into(),
                },
            ],
        }
    }

    fn cluster() -> InMemoryCluster {
        let c = InMemoryCluster::new();
        c.add_namespace("prod", labels(&[("env", "prod")]));
        c.add_namespace("dev", labels(&[("env", "dev")]));
        c.add_workload(workload("prod", "web", "acme/app:1", labels(&[("tier", "web")])));
        c.add_workload(workload("prod", "db", "acme/db:1", labels(&[("tier", "db")])));
        c.add_workload(workload("dev", "web", "docker.io/acme/app:2", labels(&[("tier", "web")])));
        c.add_workload(workload("dev", "other", "acme/application:1", Labels::new()));
        c
    }

    fn spec() -> ImagePolicySpec {
        ImagePolicySpec::for_repository(Repository::new("acme/app").unwrap())
    }

    fn registries() -> Vec<String> {
        vec!["docker.io".into()]
    }

    #[tokio::test]
    async fn absent_namespace_selector_scans_all_namespaces() {
        let found = scan(&cluster(), &spec(), &registries()).await.unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|w| format!("{}/{}", w.namespace, w.name))
            .collect();
        assert_eq!(names, vec!["dev/web", "prod/web"]);
    }

    #[tokio::test]
    async fn namespace_selector_narrows_namespaces() {
        let mut spec = spec();
        spec.namespace_selector = Some(LabelSelector::from_labels([("env", "prod")]));
        let found = scan(&cluster(), &spec, &registries()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].namespace, "prod");
    }

    #[tokio::test]
    async fn workload_selector_narrows_workloads() {
        let mut spec = spec();
        spec.workload_selector = Some(LabelSelector::from_labels([("tier", "db")]));
        assert!(scan(&cluster(), &spec, &registries()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unqualified_registries_exclude_qualified_images() {
        let found = scan(&cluster(), &spec(), &[]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].namespace, "prod");
    }
}
