//! # warden-registry: Latest-Digest Resolution
//!
//! Resolves the digest behind a repository's `latest` tag using the Docker
//! Registry HTTP API v2 two-hop protocol:
//!
//! 1. `GET {auth_url}?service=<svc>&scope=repository:<repo>:pull` → bearer token
//! 2. `GET {registry_url}/v2/<repo>/manifests/latest` with that token and an
//!    explicit `Accept` header → digest from `Docker-Content-Digest`
//!
//! The JSON manifest body is never consulted for the digest.
//!
//! ## Retry
//!
//! Only HTTP 429 is retried, through [`retry::retry_with_backoff`] with a
//! linear schedule (0s, 5s, 10s by default). Every other failure is returned
//! on the first attempt. Backoff state lives in the call, not in the client,
//! so a rate-limited repository never delays resolution of another.

pub mod client;
pub mod config;
pub mod error;
pub mod retry;

pub use client::{DigestResolver, RegistryClient};
pub use config::{ConfigError, RegistryConfig};
pub use error::RegistryError;
pub use retry::{retry_with_backoff, RetryError, RetryPolicy};
