//! # warden-attest: Attestation Verification
//!
//! Checks whether a content digest carries a transparency-log attestation
//! that satisfies a policy's issuer, type and age constraints.
//!
//! ## Architecture
//!
//! - [`log::TransparencyLog`] is the lookup seam: entries whose subject is a
//!   digest. [`rekor::RekorClient`] implements it over HTTP and
//!   [`log::InMemoryTransparencyLog`] implements it for tests and snapshots.
//! - [`fulcio`] reads the OIDC issuer out of Fulcio signing certificates.
//! - [`predicate`] maps in-toto predicate URIs to the short names policies use.
//! - [`verifier::AttestationVerifier`] is the capability the controller
//!   holds. It is either present (backed by a log) or absent, and it never
//!   errors: every failure is a `verified = false` result.
//!
//! ## Crate Policy
//!
//! - Depends only on `warden-core` internally.
//! - Fail closed: a lookup failure is never treated as a pass.

pub mod config;
pub mod error;
pub mod fulcio;
pub mod log;
pub mod predicate;
pub mod rekor;
pub mod verifier;

pub use config::{ConfigError, RekorConfig};
pub use error::TransparencyLogError;
pub use log::{InMemoryTransparencyLog, LogEntry, TransparencyLog};
pub use rekor::RekorClient;
pub use verifier::{AttestationResult, AttestationVerifier, VerificationConstraints};

use std::sync::Arc;

/// Build the verifier described by `config`: absent when disabled,
/// otherwise backed by a [`RekorClient`].
pub fn verifier_from_config(config: RekorConfig) -> Result<AttestationVerifier, TransparencyLogError> {
    if config.disabled {
        tracing::info!("attestation lookups disabled; verification will fail closed");
        return Ok(AttestationVerifier::Absent);
    }
    Ok(AttestationVerifier::present(Arc::new(RekorClient::new(config)?)))
}
