//! Registry client configuration.
//!
//! Defaults point at Docker Hub. Override via environment variables or
//! explicit construction for private registries and tests.

use std::time::Duration;

use url::Url;

use crate::retry::RetryPolicy;

const DEFAULT_AUTH_URL: &str = "https://auth.docker.io/token";
const DEFAULT_REGISTRY_URL: &str = "https://registry-1.docker.io";
const DEFAULT_SERVICE: &str = "registry.docker.io";

/// Manifest media type requested by default.
pub const DEFAULT_MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Configuration for resolving digests against one registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Token endpoint. Default: <https://auth.docker.io/token>
    pub auth_url: Url,
    /// Registry API base. Default: <https://registry-1.docker.io>
    pub registry_url: Url,
    /// `service` query parameter for the token request.
    pub service: String,
    /// `Accept` header for the manifest request.
    pub manifest_accept: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// 429 retry schedule.
    pub retry: RetryPolicy,
}

impl RegistryConfig {
    /// Docker Hub endpoints with the default retry policy and 30s timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if a default URL fails to parse
    /// (should not occur, but avoids `expect()`).
    pub fn docker_hub() -> Result<Self, ConfigError> {
        Ok(Self {
            auth_url: parse_url("auth_url", DEFAULT_AUTH_URL)?,
            registry_url: parse_url("registry_url", DEFAULT_REGISTRY_URL)?,
            service: DEFAULT_SERVICE.to_string(),
            manifest_accept: DEFAULT_MANIFEST_ACCEPT.to_string(),
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `WARDEN_REGISTRY_AUTH_URL` (default: `https://auth.docker.io/token`)
    /// - `WARDEN_REGISTRY_URL` (default: `https://registry-1.docker.io`)
    /// - `WARDEN_REGISTRY_SERVICE` (default: `registry.docker.io`)
    /// - `WARDEN_REGISTRY_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::docker_hub()?;
        Ok(Self {
            auth_url: env_url("WARDEN_REGISTRY_AUTH_URL", DEFAULT_AUTH_URL)?,
            registry_url: env_url("WARDEN_REGISTRY_URL", DEFAULT_REGISTRY_URL)?,
            service: std::env::var("WARDEN_REGISTRY_SERVICE").unwrap_or(defaults.service),
            timeout_secs: env_secs("WARDEN_REGISTRY_TIMEOUT_SECS", defaults.timeout_secs)?,
            ..defaults
        })
    }

    /// Point both endpoints at a single base URL (token at `{base}/token`).
    ///
    /// Used against local mock registries.
    pub fn local(base: &Url) -> Result<Self, ConfigError> {
        let auth_url = base
            .join("token")
            .map_err(|e| ConfigError::InvalidUrl("local".to_string(), e.to_string()))?;
        Ok(Self {
            auth_url,
            registry_url: base.clone(),
            timeout_secs: 5,
            ..Self::docker_hub()?
        })
    }

    /// Builder: override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(field.to_string(), e.to_string()))
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_secs(var: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
