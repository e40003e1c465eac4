//! # Verify Subcommand
//!
//! Looks up a digest in the transparency log and prints the attestation
//! result as JSON. Exit code 1 when the digest is not verified.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use url::Url;
use warden_attest::{verifier_from_config, AttestationResult, RekorConfig, VerificationConstraints};

/// Arguments for `warden verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Digest in `sha256:<hex>` form.
    #[arg(value_name = "DIGEST")]
    pub digest: String,

    /// Accepted OIDC issuer. Repeatable; none accepts any issuer.
    #[arg(long = "issuer")]
    pub issuers: Vec<String>,

    /// Accepted predicate type (short name or URI). Repeatable.
    #[arg(long = "type")]
    pub types: Vec<String>,

    /// Reject entries older than this (e.g. `24h`, `7d`).
    #[arg(long, value_parser = humantime::parse_duration)]
    pub max_age: Option<Duration>,

    /// Rekor base URL (overrides WARDEN_REKOR_URL).
    #[arg(long)]
    pub rekor_url: Option<Url>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyReport<'a> {
    digest: &'a str,
    verified: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    attestation_type: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    issuer: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_index: Option<i64>,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> VerifyReport<'a> {
    fn new(digest: &'a str, r: &'a AttestationResult) -> Self {
        Self {
            digest,
            verified: r.verified,
            attestation_type: &r.attestation_type,
            issuer: &r.issuer,
            log_index: r.log_index,
            timestamp: r.timestamp.to_rfc3339(),
            error: r.error.as_deref(),
        }
    }
}

/// Execute the verify subcommand.
pub async fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let mut config = RekorConfig::from_env()?;
    if let Some(url) = &args.rekor_url {
        config.base_url = url.clone();
    }
    let verifier = verifier_from_config(config)?;

    let constraints = VerificationConstraints {
        allowed_issuers: args.issuers.iter().cloned().collect::<BTreeSet<_>>(),
        required_types: args.types.iter().cloned().collect::<BTreeSet<_>>(),
        max_age: args.max_age,
    };

    let result = verifier
        .verify(&args.digest, &constraints, chrono::Utc::now())
        .await;
    println!(
        "{}",
        serde_json::to_string_pretty(&VerifyReport::new(&args.digest, &result))?
    );

    Ok(if result.verified { 0 } else { 1 })
}
