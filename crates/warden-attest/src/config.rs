//! Rekor client configuration.

use std::time::Duration;

use url::Url;

const DEFAULT_REKOR_URL: &str = "https://rekor.sigstore.dev";

/// Default cap on entries fetched per digest.
pub const DEFAULT_MAX_ENTRIES: usize = 25;

/// Configuration for the Rekor transparency log.
#[derive(Debug, Clone)]
pub struct RekorConfig {
    /// Base URL. Default: <https://rekor.sigstore.dev>
    pub base_url: Url,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Upper bound on entry UUIDs resolved for one digest.
    pub max_entries: usize,
    /// When set, no transparency log is consulted and every check fails closed.
    pub disabled: bool,
}

impl RekorConfig {
    /// The public Sigstore instance.
    pub fn public_good() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(DEFAULT_REKOR_URL)
                .map_err(|e| ConfigError::InvalidUrl("base_url".to_string(), e.to_string()))?,
            timeout_secs: 30,
            max_entries: DEFAULT_MAX_ENTRIES,
            disabled: false,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `WARDEN_REKOR_URL` (default: `https://rekor.sigstore.dev`)
    /// - `WARDEN_REKOR_TIMEOUT_SECS` (default: 30)
    /// - `WARDEN_ATTESTATION_DISABLED` (`1`/`true` disables lookups)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::public_good()?;
        let base_url = match std::env::var("WARDEN_REKOR_URL") {
            Ok(raw) => Url::parse(&raw).map_err(|e| {
                ConfigError::InvalidUrl("WARDEN_REKOR_URL".to_string(), e.to_string())
            })?,
            Err(_) => defaults.base_url.clone(),
        };
        Ok(Self {
            base_url,
            timeout_secs: env_secs("WARDEN_REKOR_TIMEOUT_SECS", defaults.timeout_secs)?,
            disabled: std::env::var("WARDEN_ATTESTATION_DISABLED")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            ..defaults
        })
    }

    /// Point at a local Rekor (tests, air-gapped mirrors).
    pub fn local(base_url: Url) -> Self {
        Self {
            base_url,
            timeout_secs: 5,
            max_entries: DEFAULT_MAX_ENTRIES,
            disabled: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
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
