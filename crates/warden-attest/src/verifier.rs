//! The attestation verifier capability.
//!
//! [`AttestationVerifier::Present`] delegates to a [`TransparencyLog`];
//! [`AttestationVerifier::Absent`] answers every request with a fixed
//! fail-closed result. Neither variant returns an error: every failure mode
//! becomes `verified = false` with a reason.
//!
//! ## Entry Acceptance
//!
//! An entry is accepted when, in order:
//!
//! 1. its issuer is in `allowed_issuers` (or the set is empty),
//! 2. its predicate type is in `required_types` (or the set is empty),
//! 3. it was integrated no earlier than `now - max_age` (if set).
//!
//! The first accepted entry in log order wins. When none is accepted, the
//! reason names the furthest step any entry reached.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use warden_core::{AttestationDetails, AttestationPolicy, ImageDigest, ValidationError};

use crate::log::{LogEntry, TransparencyLog};
use crate::predicate;

/// Outcome of one verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResult {
    pub verified: bool,
    pub attestation_type: String,
    pub issuer: String,
    /// Only set for positive log indices.
    pub log_index: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl AttestationResult {
    /// A fail-closed result carrying `reason`.
    pub fn failed(reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            verified: false,
            attestation_type: String::new(),
            issuer: String::new(),
            log_index: None,
            timestamp: now,
            error: Some(reason.into()),
        }
    }

    fn accepted(entry: &LogEntry) -> Self {
        Self {
            verified: true,
            attestation_type: entry
                .attestation_type
                .as_deref()
                .map(predicate::display_name)
                .unwrap_or_default(),
            issuer: entry.issuer.clone().unwrap_or_default(),
            log_index: (entry.log_index > 0).then_some(entry.log_index),
            timestamp: entry.integrated_time,
            error: None,
        }
    }
}

impl AttestationResult {
    /// Status details for a check performed at `checked_at`.
    ///
    /// `timestamp` stays the entry's integration time; `last_checked` is when
    /// the lookup ran.
    pub fn details_at(self, checked_at: DateTime<Utc>) -> AttestationDetails {
        AttestationDetails {
            verified: self.verified,
            attestation_type: self.attestation_type,
            issuer: self.issuer,
            log_index: self.log_index,
            last_checked: Some(checked_at),
            error: self.error,
        }
    }
}

/// Policy constraints applied to candidate entries. Empty sets are permissive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationConstraints {
    pub allowed_issuers: BTreeSet<String>,
    pub required_types: BTreeSet<String>,
    pub max_age: Option<Duration>,
}

impl VerificationConstraints {
    /// Constraints from a policy's attestation section.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMaxAge`] if `maxAge` does not parse.
    pub fn from_policy(policy: &AttestationPolicy) -> Result<Self, ValidationError> {
        Ok(Self {
            allowed_issuers: policy.allowed_issuers.clone(),
            required_types: policy.required_types.clone(),
            max_age: policy.max_age()?,
        })
    }
}

/// Why an entry was not accepted, ordered by how far it got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rejection {
    IssuerNotAllowed,
    TypeNotRequired,
    Expired,
}

/// Optional attestation capability.
#[derive(Clone)]
pub enum AttestationVerifier {
    /// Look entries up in a transparency log.
    Present(Arc<dyn TransparencyLog>),
    /// No log configured; every check fails closed.
    Absent,
}

impl std::fmt::Debug for AttestationVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present(_) => f.write_str("AttestationVerifier::Present"),
            Self::Absent => f.write_str("AttestationVerifier::Absent"),
        }
    }
}

impl AttestationVerifier {
    pub fn present(log: Arc<dyn TransparencyLog>) -> Self {
        Self::Present(log)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Verify that `digest` carries an acceptable attestation.
    ///
    /// `digest` is the workload's current digest string, which may be empty.
    pub async fn verify(
        &self,
        digest: &str,
        constraints: &VerificationConstraints,
        now: DateTime<Utc>,
    ) -> AttestationResult {
        if digest.is_empty() {
            return AttestationResult::failed("no digest to verify", now);
        }
        let log = match self {
            Self::Present(log) => log,
            Self::Absent => {
                return AttestationResult::failed(
                    "attestation verification unavailable: no transparency log configured",
                    now,
                )
            }
        };
        let digest = match ImageDigest::parse(digest) {
            Ok(d) => d,
            Err(e) => return AttestationResult::failed(format!("invalid digest format: {e}"), now),
        };

        let entries = match log.entries_for_digest(&digest).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(digest = %digest, error = %e, "transparency log lookup failed");
                return AttestationResult::failed(format!("transparency log lookup failed: {e}"), now);
            }
        };
        if entries.is_empty() {
            return AttestationResult::failed(
                format!("no attestation entries found for {digest}"),
                now,
            );
        }

        let mut furthest: Option<Rejection> = None;
        for entry in &entries {
            match check_entry(entry, constraints, now) {
                Ok(()) => {
                    tracing::debug!(digest = %digest, uuid = %entry.uuid, "attestation accepted");
                    return AttestationResult::accepted(entry);
                }
                Err(rejection) => furthest = furthest.max(Some(rejection)),
            }
        }

        let reason = match furthest {
            Some(Rejection::Expired) => format!(
                "attestation expired: no matching entry for {digest} is younger than {}",
                humantime::format_duration(constraints.max_age.unwrap_or_default())
            ),
            Some(Rejection::TypeNotRequired) => format!(
                "attestation type not required: found {}, required one of {}",
                list(entries.iter().map(|e| e.attestation_type.as_deref())),
                join(&constraints.required_types)
            ),
            Some(Rejection::IssuerNotAllowed) | None => format!(
                "attestation issuer not allowed: found {}, allowed {}",
                list(entries.iter().map(|e| e.issuer.as_deref())),
                join(&constraints.allowed_issuers)
            ),
        };
        AttestationResult::failed(reason, now)
    }
}

fn check_entry(
    entry: &LogEntry,
    constraints: &VerificationConstraints,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    if !constraints.allowed_issuers.is_empty() {
        let allowed = entry
            .issuer
            .as_ref()
            .is_some_and(|i| constraints.allowed_issuers.contains(i));
        if !allowed {
            return Err(Rejection::IssuerNotAllowed);
        }
    }
    if !constraints.required_types.is_empty() {
        let required = entry
            .attestation_type
            .as_deref()
            .is_some_and(|t| predicate::is_required(&constraints.required_types, t));
        if !required {
            return Err(Rejection::TypeNotRequired);
        }
    }
    if let Some(max_age) = constraints.max_age {
        let oldest = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age));
        if let Some(oldest) = oldest {
            if entry.integrated_time < oldest {
                return Err(Rejection::Expired);
            }
        }
    }
    Ok(())
}

fn list<'a>(values: impl Iterator<Item = Option<&'a str>>) -> String {
    let seen: BTreeSet<&str> = values.map(|v| v.unwrap_or("<none>")).collect();
    seen.into_iter().collect::<Vec<_>>().join(", ")
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::InMemoryTransparencyLog;
    use chrono::TimeZone;

    const ISSUER: &str = "https://token.actions.githubusercontent.com";
    const SLSA: &str = "https://slsa.dev/provenance/v0.2";

    fn digest() -> ImageDigest {
        ImageDigest::parse(&format!("sha256:{}", "ab".repeat(32))).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn entry(issuer: Option<&str>, kind: Option<&str>, age_hours: i64, index: i64) -> LogEntry {
        LogEntry {
            uuid: format!("uuid-{index}"),
            log_index: index,
            integrated_time: now() - chrono::Duration::hours(age_hours),
            issuer: issuer.map(str::to_string),
            attestation_type: kind.map(str::to_string),
        }
    }

    fn verifier_with(entries: Vec<LogEntry>) -> AttestationVerifier {
        let log = InMemoryTransparencyLog::new();
        for e in entries {
            log.insert(&digest(), e);
        }
        AttestationVerifier::present(Arc::new(log))
    }

    fn constraints(issuers: &[&str], types: &[&str], max_age: Option<Duration>) -> VerificationConstraints {
        VerificationConstraints {
            allowed_issuers: issuers.iter().map(|s| s.to_string()).collect(),
            required_types: types.iter().map(|s| s.to_string()).collect(),
            max_age,
        }
    }

    #[tokio::test]
    async fn empty_digest_fails_closed() {
        let v = verifier_with(vec![entry(Some(ISSUER), Some(SLSA), 1, 5)]);
        let r = v.verify("", &VerificationConstraints::default(), now()).await;
        assert!(!r.verified);
        assert!(r.error.is_some());
    }

    #[tokio::test]
    async fn absent_verifier_fails_closed() {
        let r = AttestationVerifier::Absent
            .verify(digest().as_str(), &VerificationConstraints::default(), now())
            .await;
        assert!(!r.verified);
        assert!(r.error.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn malformed_digest_fails() {
        let v = verifier_with(vec![]);
        let r = v.verify("tag-based", &VerificationConstraints::default(), now()).await;
        assert!(!r.verified);
        assert!(r.error.unwrap().contains("invalid digest"));
    }

    #[tokio::test]
    async fn permissive_constraints_accept_first_entry() {
        let v = verifier_with(vec![
            entry(Some(ISSUER), Some(SLSA), 1, 12),
            entry(Some("https://other"), None, 1, 13),
        ]);
        let r = v
            .verify(digest().as_str(), &VerificationConstraints::default(), now())
            .await;
        assert!(r.verified);
        assert_eq!(r.issuer, ISSUER);
        assert_eq!(r.attestation_type, "slsaprovenance");
        assert_eq!(r.log_index, Some(12));
        assert_eq!(r.timestamp, now() - chrono::Duration::hours(1));
        assert!(r.error.is_none());
    }

    #[tokio::test]
    async fn zero_log_index_is_not_recorded() {
        let v = verifier_with(vec![entry(Some(ISSUER), Some(SLSA), 1, 0)]);
        let r = v
            .verify(digest().as_str(), &VerificationConstraints::default(), now())
            .await;
        assert!(r.verified);
        assert_eq!(r.log_index, None);
    }

    #[tokio::test]
    async fn later_entry_can_satisfy_constraints() {
        let v = verifier_with(vec![
            entry(Some("https://other"), Some(SLSA), 1, 1),
            entry(Some(ISSUER), Some(SLSA), 1, 2),
        ]);
        let r = v
            .verify(digest().as_str(), &constraints(&[ISSUER], &["slsaprovenance"], None), now())
            .await;
        assert!(r.verified);
        assert_eq!(r.log_index, Some(2));
    }

    #[tokio::test]
    async fn disallowed_issuer_is_named() {
        let v = verifier_with(vec![entry(Some("https://other"), Some(SLSA), 1, 1)]);
        let r = v
            .verify(digest().as_str(), &constraints(&[ISSUER], &[], None), now())
            .await;
        assert!(!r.verified);
        assert!(r.error.unwrap().contains("issuer not allowed"));
    }

    #[tokio::test]
    async fn missing_type_is_named() {
        let v = verifier_with(vec![entry(Some(ISSUER), Some(SLSA), 1, 1)]);
        let r = v
            .verify(digest().as_str(), &constraints(&[ISSUER], &["spdxjson"], None), now())
            .await;
        assert!(!r.verified);
        assert!(r.error.unwrap().contains("type not required"));
    }

    #[tokio::test]
    async fn no_entries_is_named() {
        let v = verifier_with(vec![]);
        let r = v
            .verify(digest().as_str(), &VerificationConstraints::default(), now())
            .await;
        assert!(!r.verified);
        assert!(r.error.unwrap().contains("no attestation entries"));
    }

    #[tokio::test]
    async fn expired_entry_is_rejected() {
        let v = verifier_with(vec![entry(Some(ISSUER), Some(SLSA), 48, 1)]);
        let r = v
            .verify(
                digest().as_str(),
                &constraints(&[], &[], Some(Duration::from_secs(24 * 3600))),
                now(),
            )
            .await;
        assert!(!r.verified);
        assert!(r.error.unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn furthest_rejection_is_reported() {
        let v = verifier_with(vec![
            entry(Some("https://other"), Some(SLSA), 1, 1),
            entry(Some(ISSUER), Some("https://spdx.dev/Document"), 1, 2),
        ]);
        let r = v
            .verify(digest().as_str(), &constraints(&[ISSUER], &["slsaprovenance"], None), now())
            .await;
        assert!(r.error.unwrap().contains("type not required"));
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let log = InMemoryTransparencyLog::new();
        log.set_outage(Some("down".into()));
        let v = AttestationVerifier::present(Arc::new(log));
        let r = v
            .verify(digest().as_str(), &VerificationConstraints::default(), now())
            .await;
        assert!(!r.verified);
        assert!(r.error.unwrap().contains("lookup failed"));
    }

    #[test]
    fn constraints_from_policy_parse_max_age() {
        let policy = AttestationPolicy {
            require_attestation: true,
            allowed_issuers: [ISSUER.to_string()].into_iter().collect(),
            required_types: BTreeSet::new(),
            max_age: Some("24h".into()),
        };
        let c = VerificationConstraints::from_policy(&policy).unwrap();
        assert_eq!(c.max_age, Some(Duration::from_secs(86_400)));
        assert!(c.allowed_issuers.contains(ISSUER));
    }

    #[test]
    fn details_record_check_time_not_entry_time() {
        let integrated = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let checked = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let r = AttestationResult::accepted(&LogEntry {
            uuid: "u1".into(),
            log_index: 7,
            integrated_time: integrated,
            issuer: Some(ISSUER.into()),
            attestation_type: None,
        });
        assert_eq!(r.timestamp, integrated);

        let d = r.details_at(checked);
        assert!(d.verified);
        assert_eq!(d.log_index, Some(7));
        assert_eq!(d.last_checked, Some(checked));
    }

    #[test]
    fn failed_details_keep_reason() {
        let d = AttestationResult::failed("nope", now()).details_at(now());
        assert!(!d.verified);
        assert_eq!(d.error.as_deref(), Some("nope"));
    }
}
