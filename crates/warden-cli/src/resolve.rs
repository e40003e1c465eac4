//! # Resolve Subcommand
//!
//! Prints the digest currently behind `<repository>:latest`.

use anyhow::{Context, Result};
use clap::Args;
use url::Url;
use warden_core::Repository;
use warden_registry::{DigestResolver, RegistryClient, RegistryConfig};

/// Arguments for `warden resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Repository in `owner/name` form.
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// Registry API base URL (overrides WARDEN_REGISTRY_URL).
    #[arg(long)]
    pub registry_url: Option<Url>,

    /// Token endpoint (overrides WARDEN_REGISTRY_AUTH_URL).
    #[arg(long)]
    pub auth_url: Option<Url>,
}

/// Execute the resolve subcommand.
pub async fn run_resolve(args: &ResolveArgs) -> Result<u8> {
    let repository = Repository::new(args.repository.as_str())?;
    let mut config = RegistryConfig::from_env()?;
    if let Some(url) = &args.registry_url {
        config.registry_url = url.clone();
    }
    if let Some(url) = &args.auth_url {
        config.auth_url = url.clone();
    }

    let client = RegistryClient::new(config)?;
    let cancel = crate::cancel_on_ctrl_c();
    let digest = client
        .resolve(&repository, &cancel)
        .await
        .with_context(|| format!("failed to resolve latest digest for {repository}"))?;

    println!("{digest}");
    Ok(0)
}
