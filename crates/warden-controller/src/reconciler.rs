//! # Reconciliation Cycle
//!
//! One cycle for one policy:
//!
//! 1. Load the policy. A missing policy ends the cycle without requeue.
//! 2. Refresh the latest digest if it was never checked or the check
//!    interval has elapsed. A failed refresh keeps the cached digest, marks
//!    the cycle `Error` and sets `Degraded`, and the cycle continues.
//! 3. Scan for candidate workloads and analyze each one.
//! 4. For non-compliant workloads under `enforceLatestDigest`, emit an audit
//!    event and remediate when the preconditions hold.
//! 5. Write the recomputed status once and requeue after the check interval.
//!
//! Every await observes the caller's cancellation token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use warden_attest::{AttestationVerifier, VerificationConstraints};
use warden_core::{ImageDigest, ImagePolicy, PolicyRef, PolicyStatus};
use warden_registry::{DigestResolver, RegistryError};

use crate::analyzer::{AnalysisContext, ComplianceAnalyzer};
use crate::audit::{AuditEvent, AuditEventKind, AuditSink, TracingAuditSink};
use crate::clock::{Clock, SystemClock};
use crate::cluster::{ClusterClient, PolicyStore, Workload};
use crate::config::ControllerConfig;
use crate::error::ReconcileError;
use crate::remediation::{remediate, should_remediate};
use crate::scanner::scan;
use crate::status::{aggregate, set_degraded, set_ready};

/// Delay before retrying a cycle that failed with a retryable error.
pub const ERROR_REQUEUE_DELAY: Duration = Duration::from_secs(10);

/// What the invoking framework should do after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Run again after the delay.
    Requeue(Duration),
    /// The policy is gone; stop.
    Done,
}

/// Drives reconciliation cycles.
pub struct Reconciler {
    cluster: Arc<dyn ClusterClient>,
    policies: Arc<dyn PolicyStore>,
    resolver: Arc<dyn DigestResolver>,
    analyzer: ComplianceAnalyzer,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
}

impl Reconciler {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        policies: Arc<dyn PolicyStore>,
        resolver: Arc<dyn DigestResolver>,
        verifier: AttestationVerifier,
    ) -> Self {
        Self {
            cluster,
            policies,
            resolver,
            analyzer: ComplianceAnalyzer::new(verifier),
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
            config: ControllerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run one cycle for `policy_ref`.
    pub async fn reconcile(
        &self,
        policy_ref: &PolicyRef,
        cancel: &CancellationToken,
    ) -> Result<ReconcileAction, ReconcileError> {
        let result = self.reconcile_inner(policy_ref, cancel).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(ReconcileError::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        metrics::counter!("warden_reconcile_total", "result" => outcome).increment(1);
        result
    }

    async fn reconcile_inner(
        &self,
        policy_ref: &PolicyRef,
        cancel: &CancellationToken,
    ) -> Result<ReconcileAction, ReconcileError> {
        let Some(policy) = until_cancelled(cancel, self.policies.get_policy(policy_ref)).await??
        else {
            tracing::info!(policy = %policy_ref, "policy not found, nothing to reconcile");
            return Ok(ReconcileAction::Done);
        };
        policy.spec.validate()?;

        let spec = &policy.spec;
        let interval = spec.check_interval();
        let enforce = spec.enforce_latest_digest();
        let constraints = spec
            .required_attestation()
            .map(VerificationConstraints::from_policy)
            .transpose()?;

        let now = self.clock.now();
        let mut status = PolicyStatus {
            latest_digest: policy.status.latest_digest.clone(),
            last_checked: policy.status.last_checked,
            conditions: policy.status.conditions.clone(),
            ..PolicyStatus::default()
        };

        let refresh_error = if should_refresh(&policy, now) {
            match self.refresh(&policy, cancel).await {
                Ok(digest) => {
                    status.latest_digest = Some(digest);
                    status.last_checked = Some(now);
                    set_degraded(&mut status.conditions, None, now);
                    None
                }
                Err(RegistryError::Cancelled) => return Err(ReconcileError::Cancelled),
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(
                        policy = %policy_ref,
                        repository = %spec.repository,
                        error = %message,
                        "digest resolution failed, continuing with cached digest"
                    );
                    self.audit.record(AuditEvent::new(
                        AuditEventKind::DigestResolutionFailed,
                        policy_ref,
                        None,
                        format!("failed to resolve latest digest for {}: {message}", spec.repository),
                        now,
                    ));
                    set_degraded(&mut status.conditions, Some(&message), now);
                    Some(message)
                }
            }
        } else {
            None
        };

        let workloads = until_cancelled(
            cancel,
            scan(self.cluster.as_ref(), spec, &self.config.default_registries),
        )
        .await??;

        let latest = status.latest_digest.clone();
        let ctx = AnalysisContext {
            repository: &spec.repository,
            latest_digest: latest.as_ref(),
            enforce_latest_digest: enforce,
            attestation: constraints.as_ref(),
            default_registries: &self.config.default_registries,
            now,
        };

        for workload in &workloads {
            let verdict = until_cancelled(cancel, self.analyzer.analyze(workload, &ctx)).await?;
            if !verdict.is_compliant && enforce {
                let workload_id = format!("{}/{}", workload.namespace, workload.name);
                self.audit.record(AuditEvent::new(
                    AuditEventKind::NonCompliantImage,
                    policy_ref,
                    Some(workload_id.clone()),
                    format!(
                        "workload {workload_id} uses non-compliant image (currentDigest {:?})",
                        verdict.current_digest.as_str()
                    ),
                    now,
                ));
                if should_remediate(&verdict, workload, enforce, latest.as_ref(), &self.config) {
                    if let Some(latest) = latest.as_ref() {
                        self.remediate_one(policy_ref, workload, latest, &ctx, cancel)
                            .await?;
                    }
                }
            }
            status.workload_statuses.push(verdict);
        }

        let total = u32::try_from(status.workload_statuses.len()).unwrap_or(u32::MAX);
        let compliant = u32::try_from(
            status
                .workload_statuses
                .iter()
                .filter(|w| w.is_compliant)
                .count(),
        )
        .unwrap_or(u32::MAX);
        status.total_workloads = total;
        status.compliant_workloads = compliant;
        status.compliance_status = aggregate(total, compliant, refresh_error.is_some());
        set_ready(&mut status.conditions, total, compliant, now);

        until_cancelled(cancel, self.policies.update_status(policy_ref, &status)).await??;

        let policy_label = policy_ref.to_string();
        metrics::gauge!("warden_workloads_total", "policy" => policy_label.clone()).set(f64::from(total));
        metrics::gauge!("warden_workloads_compliant", "policy" => policy_label).set(f64::from(compliant));

        tracing::info!(
            policy = %policy_ref,
            repository = %spec.repository,
            status = %status.compliance_status,
            total,
            compliant,
            requeue_secs = interval.as_secs(),
            "reconciliation complete"
        );
        Ok(ReconcileAction::Requeue(interval))
    }

    async fn refresh(
        &self,
        policy: &ImagePolicy,
        cancel: &CancellationToken,
    ) -> Result<ImageDigest, RegistryError> {
        self.resolver.resolve(&policy.spec.repository, cancel).await
    }

    async fn remediate_one(
        &self,
        policy_ref: &PolicyRef,
        workload: &Workload,
        latest: &ImageDigest,
        ctx: &AnalysisContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let workload_id = format!("{}/{}", workload.namespace, workload.name);
        let result = until_cancelled(
            cancel,
            remediate(
                self.cluster.as_ref(),
                workload,
                ctx.repository,
                latest,
                ctx.default_registries,
            ),
        )
        .await?;

        match result {
            Ok(()) => {
                metrics::counter!("warden_remediations_total", "result" => "ok").increment(1);
                tracing::info!(policy = %policy_ref, workload = %workload_id, digest = %latest, "workload pinned to latest digest");
                self.audit.record(AuditEvent::new(
                    AuditEventKind::AutoRemediated,
                    policy_ref,
                    Some(workload_id.clone()),
                    format!("updated {workload_id} to {}@{latest}", ctx.repository),
                    ctx.now,
                ));
            }
            Err(e) => {
                metrics::counter!("warden_remediations_total", "result" => "error").increment(1);
                tracing::warn!(policy = %policy_ref, workload = %workload_id, error = %e, "remediation failed");
                self.audit.record(AuditEvent::new(
                    AuditEventKind::AutoRemediationFailed,
                    policy_ref,
                    Some(workload_id),
                    e.to_string(),
                    ctx.now,
                ));
            }
        }
        Ok(())
    }

    /// Reconcile `policy_ref` until it disappears, a non-retryable error
    /// occurs, or `cancel` fires.
    pub async fn run(
        &self,
        policy_ref: &PolicyRef,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        loop {
            let delay = match self.reconcile(policy_ref, cancel).await {
                Ok(ReconcileAction::Requeue(delay)) => delay,
                Ok(ReconcileAction::Done) | Err(ReconcileError::Cancelled) => return Ok(()),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(policy = %policy_ref, error = %e, "cycle failed, retrying");
                    ERROR_REQUEUE_DELAY
                }
                Err(e) => return Err(e),
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Whether the cached digest is due for a refresh.
pub fn should_refresh(policy: &ImagePolicy, now: chrono::DateTime<chrono::Utc>) -> bool {
    match policy.status.last_checked {
        None => true,
        Some(last) => match chrono::Duration::from_std(policy.spec.check_interval()) {
            Ok(interval) => now.signed_duration_since(last) > interval,
            Err(_) => false,
        },
    }
}

async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ReconcileError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use warden_core::{ImagePolicySpec, Repository};

    fn policy(last_checked: Option<chrono::DateTime<Utc>>) -> ImagePolicy {
        let mut p = ImagePolicy::new(
            &PolicyRef::new("default", "app"),
            ImagePolicySpec::for_repository(Repository::new("acme/app").unwrap()),
        );
        p.status.last_checked = last_checked;
        p
    }

    #[test]
    fn refresh_due_when_never_checked() {
        assert!(should_refresh(&policy(None), Utc::now()));
    }

    #[test]
    fn refresh_due_only_after_interval() {
        let last = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let p = policy(Some(last));
        assert!(!should_refresh(&p, last + chrono::Duration::seconds(60)));
        assert!(should_refresh(&p, last + chrono::Duration::seconds(61)));
    }

    #[tokio::test]
    async fn until_cancelled_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = until_cancelled(&cancel, std::future::pending::<()>()).await;
        assert!(matches!(out, Err(ReconcileError::Cancelled)));
    }
}
