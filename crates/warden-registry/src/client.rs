//! Typed client for the registry token and manifest endpoints.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `{auth_url}?service=..&scope=repository:<repo>:pull` | Pull token |
//! | GET | `/v2/<repo>/manifests/latest` | Digest via `Docker-Content-Digest` |

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use warden_core::{ImageDigest, Repository};

use crate::config::{ConfigError, RegistryConfig};
use crate::error::RegistryError;
use crate::retry::{retry_with_backoff, RetryError};

/// Response header carrying the manifest digest.
pub const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";

const LATEST_TAG: &str = "latest";

/// Resolves the latest trusted digest of a repository.
#[async_trait]
pub trait DigestResolver: Send + Sync {
    /// Resolve the digest behind the repository's `latest` tag.
    async fn resolve(
        &self,
        repository: &Repository,
        cancel: &CancellationToken,
    ) -> Result<ImageDigest, RegistryError>;
}

/// Token endpoint response. The distribution spec allows either field.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// HTTP client for one registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryConfig,
}

impl RegistryClient {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RegistryError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// A single token + manifest exchange, without retry.
    pub async fn resolve_once(&self, repository: &Repository) -> Result<ImageDigest, RegistryError> {
        let token = self.fetch_token(repository).await?;
        self.fetch_manifest_digest(repository, &token).await
    }

    async fn fetch_token(&self, repository: &Repository) -> Result<String, RegistryError> {
        let endpoint = "GET /token";
        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("service", &self.config.service)
            .append_pair("scope", &format!("repository:{repository}:pull"));

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RegistryError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(RegistryError::RateLimited {
                    endpoint: endpoint.into(),
                })
            }
            status if !status.is_success() => {
                return Err(RegistryError::Auth {
                    repository: repository.to_string(),
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let body: TokenResponse = resp.json().await.map_err(|e| RegistryError::Decode {
            endpoint: endpoint.into(),
            source: e,
        })?;
        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RegistryError::MissingToken {
                repository: repository.to_string(),
            })
    }

    async fn fetch_manifest_digest(
        &self,
        repository: &Repository,
        token: &str,
    ) -> Result<ImageDigest, RegistryError> {
        let endpoint = format!("GET /v2/{repository}/manifests/{LATEST_TAG}");
        let url = self
            .config
            .registry_url
            .join(&format!("v2/{repository}/manifests/{LATEST_TAG}"))
            .map_err(|e| ConfigError::InvalidUrl("registry_url".into(), e.to_string()))?;

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, &self.config.manifest_accept)
            .send()
            .await
            .map_err(|e| RegistryError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(RegistryError::RateLimited { endpoint }),
            status => {
                return Err(RegistryError::UnexpectedStatus {
                    endpoint,
                    status: status.as_u16(),
                })
            }
        }

        let header = resp
            .headers()
            .get(CONTENT_DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RegistryError::MissingDigest {
                repository: repository.to_string(),
            })?;

        Ok(ImageDigest::parse(header)?)
    }
}

#[async_trait]
impl DigestResolver for RegistryClient {
    async fn resolve(
        &self,
        repository: &Repository,
        cancel: &CancellationToken,
    ) -> Result<ImageDigest, RegistryError> {
        tracing::info!(repository = %repository, "fetching latest digest");

        let result = retry_with_backoff(
            &self.config.retry,
            cancel,
            RegistryError::is_retryable,
            |attempt| {
                if attempt > 0 {
                    metrics::counter!("warden_registry_retries_total").increment(1);
                }
                self.resolve_once(repository)
            },
        )
        .await;

        match result {
            Ok(digest) => {
                tracing::info!(repository = %repository, digest = %digest, "resolved latest digest");
                Ok(digest)
            }
            Err(RetryError::Exhausted { attempts, .. }) => Err(RegistryError::RateLimitExhausted {
                repository: repository.to_string(),
                attempts,
            }),
            Err(RetryError::Fatal(e)) => Err(e),
            Err(RetryError::Cancelled) => Err(RegistryError::Cancelled),
        }
    }
}
