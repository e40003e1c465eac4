//! # warden-cli: Command-Line Interface
//!
//! Provides the `warden` binary.
//!
//! ## Subcommands
//!
//! - `warden resolve <owner/name>`: latest digest from the registry.
//! - `warden verify <digest>`: attestation lookup against Rekor.
//! - `warden reconcile --snapshot <file>`: one cycle (or a `--watch` loop)
//!   for every policy in a YAML cluster snapshot.
//!
//! ## Exit Codes
//!
//! `0` success, `1` a negative verdict (unverified digest, non-compliant
//! policy under `--strict`), `2` operational error.
//!
//! ```bash
//! warden resolve library/nginx
//! warden verify sha256:... --issuer https://token.actions.githubusercontent.com
//! warden reconcile --snapshot cluster.yaml --write
//! ```

pub mod reconcile;
pub mod resolve;
pub mod snapshot;
pub mod verify;

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;
use warden_core::PolicyRef;

/// A token cancelled when the process receives Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            trigger.cancel();
        }
    });
    token
}

/// Parse `namespace/name`, or a bare `name` in the `default` namespace.
pub fn parse_policy_ref(raw: &str) -> Result<PolicyRef> {
    match raw.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(PolicyRef::new(ns, name))
        }
        None if !raw.is_empty() => Ok(PolicyRef::new("default", raw)),
        _ => bail!("invalid policy reference {raw:?}: expected `namespace/name`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_ref_parsing() {
        let r = parse_policy_ref("prod/app").unwrap();
        assert_eq!((r.namespace.as_str(), r.name.as_str()), ("prod", "app"));
        let r = parse_policy_ref("app").unwrap();
        assert_eq!(r.namespace, "default");
        assert!(parse_policy_ref("").is_err());
        assert!(parse_policy_ref("a/b/c").is_err());
        assert!(parse_policy_ref("/b").is_err());
    }
}
