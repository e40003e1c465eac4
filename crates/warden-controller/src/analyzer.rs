//! Per-workload compliance analysis.
//!
//! The verdict is computed from the first container whose image matches the
//! policy's repository:
//!
//! | Reference | `enforceLatestDigest` | Digest verdict |
//! |-----------|-----------------------|----------------|
//! | `@sha256:..` equal to latest | true | compliant |
//! | `@sha256:..` different, or latest unknown | true | non-compliant |
//! | tag only | true | non-compliant |
//! | anything | false | compliant |
//!
//! When attestation is required the workload is compliant only if the digest
//! verdict and the attestation verdict both pass. Tag-based and unknown
//! digests fail attestation without a lookup.

use chrono::{DateTime, Utc};
use warden_attest::{AttestationResult, AttestationVerifier, VerificationConstraints};
use warden_core::{CurrentDigest, ImageDigest, Repository, WorkloadStatus};

use crate::cluster::Workload;
use crate::image::match_repository;

/// Inputs shared by every workload in one cycle.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub repository: &'a Repository,
    /// `None` when the digest has never been resolved.
    pub latest_digest: Option<&'a ImageDigest>,
    pub enforce_latest_digest: bool,
    /// Present iff the policy requires attestation.
    pub attestation: Option<&'a VerificationConstraints>,
    pub default_registries: &'a [String],
    pub now: DateTime<Utc>,
}

/// Classifies workloads against a policy.
#[derive(Debug, Clone)]
pub struct ComplianceAnalyzer {
    verifier: AttestationVerifier,
}

impl ComplianceAnalyzer {
    pub fn new(verifier: AttestationVerifier) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &AttestationVerifier {
        &self.verifier
    }

    /// Compute a fresh status for `workload`.
    pub async fn analyze(&self, workload: &Workload, ctx: &AnalysisContext<'_>) -> WorkloadStatus {
        let current_digest = workload
            .containers
            .iter()
            .find_map(|c| match_repository(&c.image, ctx.repository, ctx.default_registries))
            .map(|m| m.current_digest())
            .unwrap_or_default();

        let digest_ok = digest_verdict(&current_digest, ctx.latest_digest, ctx.enforce_latest_digest);

        let mut status = WorkloadStatus {
            name: workload.name.clone(),
            namespace: workload.namespace.clone(),
            current_digest,
            is_compliant: digest_ok,
            has_valid_attestation: None,
            attestation_details: None,
            last_updated: ctx.now,
        };

        if let Some(constraints) = ctx.attestation {
            let result = match status.current_digest.digest() {
                Some(d) => self.verifier.verify(d.as_str(), constraints, ctx.now).await,
                None => AttestationResult::failed(
                    format!(
                        "image is not pinned to a digest (currentDigest {:?})",
                        status.current_digest.as_str()
                    ),
                    ctx.now,
                ),
            };
            status.is_compliant = digest_ok && result.verified;
            status.has_valid_attestation = Some(result.verified);
            status.attestation_details = Some(result.details_at(ctx.now));
        }

        tracing::debug!(
            namespace = %status.namespace,
            workload = %status.name,
            digest = status.current_digest.as_str(),
            compliant = status.is_compliant,
            "workload analyzed"
        );
        status
    }
}

/// Digest half of the verdict.
pub fn digest_verdict(current: &CurrentDigest, latest: Option<&ImageDigest>, enforce: bool) -> bool {
    if !enforce {
        return true;
    }
    match (current, latest) {
        (CurrentDigest::Digest(d), Some(latest)) => d == latest,
        _ => false,
    }
}
