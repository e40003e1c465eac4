//! Automatic remediation: pin non-compliant workloads to the latest digest.
//!
//! Remediation never touches `WorkloadStatus`. The next cycle's scan observes
//! the rewritten references.

use warden_core::{ImageDigest, Repository, WorkloadStatus};

use crate::cluster::{ClusterClient, ClusterError, Workload};
use crate::config::ControllerConfig;
use crate::image::match_repository;

#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    #[error("no container in {workload} references {repository}")]
    NoMatchingContainer {
        workload: String,
        repository: String,
    },

    #[error("failed to update {workload}: {source}")]
    Update {
        workload: String,
        source: ClusterError,
    },
}

/// Whether the cycle should attempt to remediate this workload.
///
/// Requires a non-compliant verdict, `enforceLatestDigest`, a known latest
/// digest, and the automation opt-in label. A workload already pinned to
/// the latest digest (non-compliant for attestation reasons) is left alone.
pub fn should_remediate(
    status: &WorkloadStatus,
    workload: &Workload,
    enforce_latest_digest: bool,
    latest: Option<&ImageDigest>,
    config: &ControllerConfig,
) -> bool {
    let Some(latest) = latest else {
        return false;
    };
    !status.is_compliant
        && enforce_latest_digest
        && workload.has_label(&config.automation_label, &config.automation_value)
        && status.current_digest.digest() != Some(latest)
}

/// A copy of `workload` with every matching container pinned to `latest`.
pub fn pin_images(
    workload: &Workload,
    repository: &Repository,
    latest: &ImageDigest,
    default_registries: &[String],
) -> Result<Workload, RemediationError> {
    let mut updated = workload.clone();
    let mut rewritten = 0usize;
    for container in &mut updated.containers {
        let pinned = match_repository(&container.image, repository, default_registries)
            .map(|m| m.pinned(latest));
        if let Some(image) = pinned {
            container.image = image;
            rewritten += 1;
        }
    }
    if rewritten == 0 {
        return Err(RemediationError::NoMatchingContainer {
            workload: format!("{}/{}", workload.namespace, workload.name),
            repository: repository.to_string(),
        });
    }
    Ok(updated)
}

/// Pin matching containers and apply the update.
pub async fn remediate(
    cluster: &dyn ClusterClient,
    workload: &Workload,
    repository: &Repository,
    latest: &ImageDigest,
    default_registries: &[String],
) -> Result<(), RemediationError> {
    let updated = pin_images(workload, repository, latest, default_registries)?;
    cluster
        .update_workload(&updated)
        .await
        .map_err(|source| RemediationError::Update {
            workload: format!("{}/{}", workload.namespace, workload.name),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Container, InMemoryCluster};
    use chrono::Utc;
    use warden_core::{CurrentDigest, Labels};

    fn latest() -> ImageDigest {
        ImageDigest::parse(&format!("sha256:{}", "c".repeat(64))).unwrap()
    }

    fn repo() -> Repository {
        Repository::new("acme/app").unwrap()
    }

    fn workload(opt_in: bool) -> Workload {
        let mut labels = Labels::new();
        if opt_in {
            labels.insert("automation".into(), "true".into());
        }
        Workload {
            name: "web".into(),
            namespace: "prod".into(),
            labels,
            containers: vec![
                Container {
                    name: "app".into(),
                    image: "docker.io/acme/app:1.0".into(),
                },
                Container {
                    name: "proxy".into(),
                    image: "envoyproxy/envoy:v1.30".into(),
                },
                Container {
                    name: "worker".into(),
                    image: "acme/app:1.0".into(),
                },
            ],
        }
    }

    fn status(compliant: bool, current: CurrentDigest) -> WorkloadStatus {
        WorkloadStatus {
            name: "web".into(),
            namespace: "prod".into(),
            current_digest: current,
            is_compliant: compliant,
            has_valid_attestation: None,
            attestation_details: None,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn remediation_requires_every_precondition() {
        let cfg = ControllerConfig::default();
        let l = latest();
        let nc = status(false, CurrentDigest::TagBased);

        assert!(should_remediate(&nc, &workload(true), true, Some(&l), &cfg));
        assert!(!should_remediate(&status(true, CurrentDigest::TagBased), &workload(true), true, Some(&l), &cfg));
        assert!(!should_remediate(&nc, &workload(true), false, Some(&l), &cfg));
        assert!(!should_remediate(&nc, &workload(true), true, None, &cfg));
        assert!(!should_remediate(&nc, &workload(false), true, Some(&l), &cfg));
    }

    #[test]
    fn already_pinned_workload_is_not_rewritten() {
        let cfg = ControllerConfig::default();
        let l = latest();
        let s = status(false, CurrentDigest::Digest(l.clone()));
        assert!(!should_remediate(&s, &workload(true), true, Some(&l), &cfg));
    }

    #[test]
    fn pinning_rewrites_only_matching_containers() {
        let registries = vec!["docker.io".to_string()];
        let updated = pin_images(&workload(true), &repo(), &latest(), &registries).unwrap();
        let l = latest();
        assert_eq!(updated.containers[0].image, format!("docker.io/acme/app@{l}"));
        assert_eq!(updated.containers[1].image, "envoyproxy/envoy:v1.30");
        assert_eq!(updated.containers[2].image, format!("acme/app@{l}"));
    }

    #[test]
    fn pinning_without_match_fails() {
        let other = Repository::new("acme/other").unwrap();
        let err = pin_images(&workload(true), &other, &latest(), &[]).unwrap_err();
        assert!(matches!(err, RemediationError::NoMatchingContainer { .. }));
    }

    #[tokio::test]
    async fn remediate_applies_update() {
        let cluster = InMemoryCluster::new();
        cluster.add_workload(workload(true));
        remediate(&cluster, &workload(true), &repo(), &latest(), &[])
            .await
            .unwrap();
        let stored = cluster.workload("prod", "web").unwrap();
        assert_eq!(stored.containers[2].image, format!("acme/app@{}", latest()));
        assert_eq!(stored.containers[0].image, "docker.io/acme/app:1.0");
    }
}
