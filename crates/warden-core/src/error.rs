//! # Error Hierarchy
//!
//! Structured error types for the Digest Warden core, built with `thiserror`.
//! Validation errors carry the offending value so operators can fix the
//! policy without reading source.

use thiserror::Error;

/// Errors raised while validating domain primitives and policy fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Repository does not match the `owner/name` pattern.
    #[error("invalid repository {0:?}: expected lowercase `owner/name`")]
    InvalidRepository(String),

    /// Digest is not `sha256:` followed by 64 lowercase hex characters.
    #[error("invalid digest {0:?}: expected `sha256:<64 lowercase hex>`")]
    InvalidDigest(String),

    /// Check interval outside the accepted bounds.
    #[error("checkIntervalSeconds {value} out of range [{min}, {max}]")]
    CheckIntervalOutOfRange {
        /// The configured value.
        value: u32,
        /// Lower bound (inclusive).
        min: u32,
        /// Upper bound (inclusive).
        max: u32,
    },

    /// `attestationPolicy.maxAge` could not be parsed as a duration.
    #[error("invalid attestation maxAge {value:?}: {reason}")]
    InvalidMaxAge {
        /// The raw value from the policy.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A selector embedded in the policy is malformed.
    #[error("{field}: {source}")]
    Selector {
        /// Which policy field carried the selector.
        field: &'static str,
        /// The selector defect.
        source: SelectorError,
    },
}

/// Errors in label selector construction.
///
/// Mirrors the rules of Kubernetes `LabelSelector`: set-based operators
/// require values, existence operators forbid them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// A requirement or `matchLabels` entry has an empty key.
    #[error("label selector key must not be empty")]
    EmptyKey,

    /// `In` / `NotIn` requirement without values.
    #[error("operator {operator} on key {key:?} requires at least one value")]
    MissingValues {
        /// The requirement key.
        key: String,
        /// The operator name.
        operator: String,
    },

    /// `Exists` / `DoesNotExist` requirement with values.
    #[error("operator {operator} on key {key:?} must not carry values")]
    UnexpectedValues {
        /// The requirement key.
        key: String,
        /// The operator name.
        operator: String,
    },
}
