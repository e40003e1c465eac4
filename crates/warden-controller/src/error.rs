//! Reconciliation errors.
//!
//! Registry failures, remediation failures and attestation failures are not
//! here: they are recorded in status and audit events, and the cycle goes on.
//! Only failures that prevent a status write reach the caller.

use warden_core::{SelectorError, ValidationError};

use crate::cluster::ClusterError;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A namespace or workload selector is malformed.
    #[error("invalid {field}: {source}")]
    Selector {
        field: &'static str,
        source: SelectorError,
    },

    /// The policy failed validation for a reason other than its selectors.
    #[error("invalid policy: {0}")]
    InvalidPolicy(ValidationError),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// The caller cancelled the cycle.
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Whether the invoking framework should retry the cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Cluster(e) => e.is_retryable(),
            Self::Selector { .. } | Self::InvalidPolicy(_) => false,
        }
    }
}

impl From<ValidationError> for ReconcileError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Selector { field, source } => Self::Selector { field, source },
            other => Self::InvalidPolicy(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_validation_errors_become_selector_errors() {
        let e: ReconcileError = ValidationError::Selector {
            field: "namespaceSelector",
            source: SelectorError::EmptyKey,
        }
        .into();
        assert!(matches!(e, ReconcileError::Selector { field: "namespaceSelector", .. }));
        assert!(!e.is_retryable());
    }

    #[test]
    fn cancellation_and_transient_cluster_errors_are_retryable() {
        assert!(ReconcileError::Cancelled.is_retryable());
        assert!(ReconcileError::Cluster(ClusterError::Unavailable("x".into())).is_retryable());
        assert!(!ReconcileError::Cluster(ClusterError::NotFound {
            kind: "workload",
            name: "a/b".into()
        })
        .is_retryable());
    }
}
