//! Transparency-log error types.

use crate::config::ConfigError;

/// Errors from a transparency-log lookup.
///
/// The verifier never propagates these; any lookup failure becomes a
/// fail-closed `verified = false` result carrying the message.
#[derive(Debug, thiserror::Error)]
pub enum TransparencyLogError {
    /// Transport failure, including the per-request timeout.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Non-success response.
    #[error("{endpoint} returned status {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response body did not have the expected shape.
    #[error("failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    /// Request URL could not be built.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The log is not reachable at all.
    #[error("transparency log unavailable: {0}")]
    Unavailable(String),
}
