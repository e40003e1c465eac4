//! # Reconcile Subcommand
//!
//! Loads a YAML cluster snapshot into an in-memory cluster and reconciles
//! its image policies against the live registry and transparency log.
//!
//! ## Modes
//!
//! - One-shot (default): one cycle per policy, then the resulting statuses
//!   are printed as YAML.
//! - `--watch`: every policy runs its own requeue loop until Ctrl-C.
//!
//! With `--write` the snapshot file is rewritten afterwards, carrying the
//! updated statuses and any remediated images.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;
use warden_attest::{verifier_from_config, RekorConfig};
use warden_controller::{ControllerConfig, InMemoryCluster, Reconciler};
use warden_core::{ComplianceStatus, PolicyRef, PolicyStatus};
use warden_registry::{RegistryClient, RegistryConfig};

use crate::snapshot::{load_snapshot, save_snapshot};

/// Arguments for `warden reconcile`.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// YAML file holding namespaces, workloads, and policies.
    #[arg(long, value_name = "PATH")]
    pub snapshot: PathBuf,

    /// Only reconcile this policy (`namespace/name`).
    #[arg(long)]
    pub policy: Option<String>,

    /// Keep reconciling on each policy's check interval until Ctrl-C.
    #[arg(long)]
    pub watch: bool,

    /// Write the reconciled cluster back to the snapshot file.
    #[arg(long)]
    pub write: bool,

    /// Exit 1 unless every reconciled policy is Compliant.
    #[arg(long)]
    pub strict: bool,

    /// Registry API base URL (overrides WARDEN_REGISTRY_URL).
    #[arg(long)]
    pub registry_url: Option<Url>,

    /// Token endpoint (overrides WARDEN_REGISTRY_AUTH_URL).
    #[arg(long)]
    pub auth_url: Option<Url>,

    /// Rekor base URL (overrides WARDEN_REKOR_URL).
    #[arg(long)]
    pub rekor_url: Option<Url>,
}

/// Execute the reconcile subcommand.
pub async fn run_reconcile(args: &ReconcileArgs) -> Result<u8> {
    let snapshot = load_snapshot(&args.snapshot)?;
    let targets = select_policies(
        snapshot.policies.iter().map(|p| p.policy_ref()),
        args.policy.as_deref(),
    )?;
    let cluster = Arc::new(InMemoryCluster::from_snapshot(snapshot));
    let reconciler = Arc::new(build_reconciler(args, cluster.clone())?);
    let cancel = crate::cancel_on_ctrl_c();

    if args.watch {
        watch(&reconciler, &targets, &cancel).await?;
    } else {
        for policy_ref in &targets {
            reconciler
                .reconcile(policy_ref, &cancel)
                .await
                .with_context(|| format!("reconciling {policy_ref}"))?;
        }
    }

    let statuses: BTreeMap<String, PolicyStatus> = targets
        .iter()
        .filter_map(|r| cluster.policy(r).map(|p| (r.to_string(), p.status)))
        .collect();
    println!("{}", serde_yaml::to_string(&statuses)?);

    if args.write {
        save_snapshot(&args.snapshot, &cluster.snapshot())?;
        tracing::info!(path = %args.snapshot.display(), "snapshot written");
    }

    let all_compliant = statuses
        .values()
        .all(|s| s.compliance_status == ComplianceStatus::Compliant);
    Ok(if args.strict && !all_compliant { 1 } else { 0 })
}

fn build_reconciler(args: &ReconcileArgs, cluster: Arc<InMemoryCluster>) -> Result<Reconciler> {
    let mut registry = RegistryConfig::from_env()?;
    if let Some(url) = &args.registry_url {
        registry.registry_url = url.clone();
    }
    if let Some(url) = &args.auth_url {
        registry.auth_url = url.clone();
    }
    let resolver = Arc::new(RegistryClient::new(registry)?);

    let mut rekor = RekorConfig::from_env()?;
    if let Some(url) = &args.rekor_url {
        rekor.base_url = url.clone();
    }
    let verifier = verifier_from_config(rekor)?;

    Ok(
        Reconciler::new(cluster.clone(), cluster, resolver, verifier)
            .with_config(ControllerConfig::from_env()),
    )
}

async fn watch(
    reconciler: &Arc<Reconciler>,
    targets: &[PolicyRef],
    cancel: &CancellationToken,
) -> Result<()> {
    let mut tasks = JoinSet::new();
    for policy_ref in targets.iter().cloned() {
        let reconciler = reconciler.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let result = reconciler.run(&policy_ref, &cancel).await;
            (policy_ref, result)
        });
    }
    tracing::info!(policies = targets.len(), "watching policies");

    while let Some(joined) = tasks.join_next().await {
        let (policy_ref, result) = joined.context("reconcile task panicked")?;
        if let Err(e) = result {
            tracing::error!(policy = %policy_ref, error = %e, "reconcile loop stopped");
        }
    }
    Ok(())
}

/// The policies to reconcile: all of them, or the one named by `only`.
fn select_policies(
    available: impl Iterator<Item = PolicyRef>,
    only: Option<&str>,
) -> Result<Vec<PolicyRef>> {
    let available: Vec<PolicyRef> = available.collect();
    let Some(raw) = only else {
        return Ok(available);
    };
    let wanted = crate::parse_policy_ref(raw)?;
    if !available.contains(&wanted) {
        anyhow::bail!("policy {wanted} is not in the snapshot");
    }
    Ok(vec![wanted])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs() -> Vec<PolicyRef> {
        vec![PolicyRef::new("prod", "api"), PolicyRef::new("prod", "web")]
    }

    #[test]
    fn selects_every_policy_by_default() {
        assert_eq!(select_policies(refs().into_iter(), None).unwrap(), refs());
    }

    #[test]
    fn selects_named_policy() {
        let picked = select_policies(refs().into_iter(), Some("prod/web")).unwrap();
        assert_eq!(picked, vec![PolicyRef::new("prod", "web")]);
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let err = select_policies(refs().into_iter(), Some("staging/web")).unwrap_err();
        assert!(err.to_string().contains("staging/web"));
    }
}
