//! Registry error types.
//!
//! HTTP 429 is the only transient failure. Everything else (auth failure,
//! other non-200 statuses, decode failure, transport failure, a missing or
//! malformed digest header) is permanent for the current cycle.

use warden_core::ValidationError;

use crate::config::ConfigError;

/// Errors from digest resolution.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry or its token service answered 429.
    #[error("{endpoint} returned status 429")]
    RateLimited { endpoint: String },

    /// Every attempt was rate limited.
    #[error("failed to fetch digest for {repository} after {attempts} attempts due to rate limiting")]
    RateLimitExhausted { repository: String, attempts: u32 },

    /// The token service refused the pull scope.
    #[error("token request for {repository} failed with status {status}")]
    Auth { repository: String, status: u16 },

    /// The token response carried neither `token` nor `access_token`.
    #[error("token response for {repository} carried no token")]
    MissingToken { repository: String },

    /// Non-200, non-429 manifest response.
    #[error("{endpoint} returned status {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    /// Transport failure, including the per-request timeout.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Response body could not be decoded.
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The manifest response had no `Docker-Content-Digest` header.
    #[error("no digest found in response headers for {repository}")]
    MissingDigest { repository: String },

    /// The digest header was not `sha256:<64 hex>`.
    #[error("malformed digest header: {0}")]
    MalformedDigest(#[from] ValidationError),

    /// Request URL could not be built.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The caller cancelled resolution.
    #[error("digest resolution cancelled")]
    Cancelled,
}

impl RegistryError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limiting_is_retryable() {
        assert!(RegistryError::RateLimited {
            endpoint: "GET /token".into()
        }
        .is_retryable());
        assert!(!RegistryError::Auth {
            repository: "acme/app".into(),
            status: 401
        }
        .is_retryable());
        assert!(!RegistryError::UnexpectedStatus {
            endpoint: "GET /v2/acme/app/manifests/latest".into(),
            status: 500
        }
        .is_retryable());
        assert!(!RegistryError::RateLimitExhausted {
            repository: "acme/app".into(),
            attempts: 3
        }
        .is_retryable());
    }
}
