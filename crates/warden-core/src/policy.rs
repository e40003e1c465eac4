//! # Image Policy Resource
//!
//! The declarative description of a repository to monitor and the rules a
//! fleet of workloads must satisfy. The resource itself is owned by the
//! surrounding platform; the controller reads `spec` and writes `status`.
//!
//! Optional fields keep their wire optionality and are resolved to their
//! defaults through accessor methods (`check_interval()`,
//! `enforce_latest_digest()`), so a round-tripped policy never gains
//! fields it did not have.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::repository::Repository;
use crate::selector::LabelSelector;
use crate::status::PolicyStatus;

/// Default `checkIntervalSeconds`.
pub const DEFAULT_CHECK_INTERVAL_SECS: u32 = 60;
/// Lower bound for `checkIntervalSeconds`.
pub const MIN_CHECK_INTERVAL_SECS: u32 = 10;
/// Upper bound for `checkIntervalSeconds`.
pub const MAX_CHECK_INTERVAL_SECS: u32 = 3600;

/// Namespaced name of a policy resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRef {
    pub namespace: String,
    pub name: String,
}

impl PolicyRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Attestation requirements for workloads covered by a policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationPolicy {
    /// When true, workloads without a valid attestation are non-compliant.
    #[serde(default)]
    pub require_attestation: bool,
    /// OIDC issuers accepted on the signing certificate. Empty accepts any.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_issuers: BTreeSet<String>,
    /// Attestation predicate types accepted. Empty accepts any.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub required_types: BTreeSet<String>,
    /// Maximum attestation age as a humantime string (e.g. `24h`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,
}

impl AttestationPolicy {
    /// Parse `maxAge`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMaxAge`] if the value is not a
    /// humantime duration.
    pub fn max_age(&self) -> Result<Option<Duration>, ValidationError> {
        self.max_age
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw).map_err(|e| ValidationError::InvalidMaxAge {
                    value: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

/// Desired state of an image policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePolicySpec {
    pub repository: Repository,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,
    #[serde(
        default,
        alias = "deploymentSelector",
        skip_serializing_if = "Option::is_none"
    )]
    pub workload_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_interval_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_latest_digest: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_policy: Option<AttestationPolicy>,
}

impl ImagePolicySpec {
    /// A spec for `repository` with every optional field unset.
    pub fn for_repository(repository: Repository) -> Self {
        Self {
            repository,
            namespace_selector: None,
            workload_selector: None,
            check_interval_seconds: None,
            enforce_latest_digest: None,
            attestation_policy: None,
        }
    }

    /// Interval between registry refreshes, and the requeue delay.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(u64::from(
            self.check_interval_seconds
                .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS),
        ))
    }

    /// Whether workloads must run the latest digest (default true).
    pub fn enforce_latest_digest(&self) -> bool {
        self.enforce_latest_digest.unwrap_or(true)
    }

    /// The attestation policy, if one is set and requires attestation.
    pub fn required_attestation(&self) -> Option<&AttestationPolicy> {
        self.attestation_policy
            .as_ref()
            .filter(|p| p.require_attestation)
    }

    /// Validate the fields the schema layer is expected to enforce.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found: interval bounds,
    /// malformed selectors, or an unparseable `maxAge`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(value) = self.check_interval_seconds {
            if !(MIN_CHECK_INTERVAL_SECS..=MAX_CHECK_INTERVAL_SECS).contains(&value) {
                return Err(ValidationError::CheckIntervalOutOfRange {
                    value,
                    min: MIN_CHECK_INTERVAL_SECS,
                    max: MAX_CHECK_INTERVAL_SECS,
                });
            }
        }
        if let Some(sel) = &self.namespace_selector {
            sel.validate().map_err(|source| ValidationError::Selector {
                field: "namespaceSelector",
                source,
            })?;
        }
        if let Some(sel) = &self.workload_selector {
            sel.validate().map_err(|source| ValidationError::Selector {
                field: "workloadSelector",
                source,
            })?;
        }
        if let Some(att) = &self.attestation_policy {
            att.max_age()?;
        }
        Ok(())
    }
}

/// An image policy resource: identity, desired state, observed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePolicy {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub spec: ImagePolicySpec,
    #[serde(default)]
    pub status: PolicyStatus,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ImagePolicy {
    pub fn new(policy_ref: &PolicyRef, spec: ImagePolicySpec) -> Self {
        Self {
            name: policy_ref.name.clone(),
            namespace: policy_ref.namespace.clone(),
            spec,
            status: PolicyStatus::default(),
        }
    }

    pub fn policy_ref(&self) -> PolicyRef {
        PolicyRef::new(self.namespace.clone(), self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{LabelSelectorRequirement, SelectorOperator};

    fn spec() -> ImagePolicySpec {
        ImagePolicySpec::for_repository(Repository::new("acme/app").unwrap())
    }

    #[test]
    fn defaults_apply_when_fields_absent() {
        let s = spec();
        assert_eq!(s.check_interval(), Duration::from_secs(60));
        assert!(s.enforce_latest_digest());
        assert!(s.required_attestation().is_none());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn interval_bounds_are_enforced() {
        for (value, ok) in [(9, false), (10, true), (3600, true), (3601, false)] {
            let mut s = spec();
            s.check_interval_seconds = Some(value);
            assert_eq!(s.validate().is_ok(), ok, "interval {value}");
        }
    }

    #[test]
    fn malformed_selector_is_reported_with_field() {
        let mut s = spec();
        s.workload_selector = Some(LabelSelector {
            match_expressions: vec![LabelSelectorRequirement {
                key: "app".into(),
                operator: SelectorOperator::In,
                values: vec![],
            }],
            ..Default::default()
        });
        match s.validate() {
            Err(ValidationError::Selector { field, .. }) => assert_eq!(field, "workloadSelector"),
            other => panic!("expected selector error, got {other:?}"),
        }
    }

    #[test]
    fn max_age_parses_humantime() {
        let att = AttestationPolicy {
            max_age: Some("24h".into()),
            ..Default::default()
        };
        assert_eq!(att.max_age().unwrap(), Some(Duration::from_secs(86_400)));

        let bad = AttestationPolicy {
            max_age: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(matches!(bad.max_age(), Err(ValidationError::InvalidMaxAge { .. })));
    }

    #[test]
    fn required_attestation_ignores_disabled_policy() {
        let mut s = spec();
        s.attestation_policy = Some(AttestationPolicy::default());
        assert!(s.required_attestation().is_none());
        s.attestation_policy = Some(AttestationPolicy {
            require_attestation: true,
            ..Default::default()
        });
        assert!(s.required_attestation().is_some());
    }

    #[test]
    fn deserializes_policy_document() {
        let json = serde_json::json!({
            "name": "demo",
            "namespace": "security",
            "spec": {
                "repository": "jonlimpw/demo-app",
                "deploymentSelector": {"matchLabels": {"app": "demo"}},
                "checkIntervalSeconds": 120,
                "enforceLatestDigest": false,
                "attestationPolicy": {
                    "requireAttestation": true,
                    "allowedIssuers": ["https://token.actions.githubusercontent.com"],
                    "requiredTypes": ["slsaprovenance"]
                }
            }
        });
        let policy: ImagePolicy = serde_json::from_value(json).unwrap();
        assert_eq!(policy.policy_ref().to_string(), "security/demo");
        assert!(policy.spec.workload_selector.is_some());
        assert!(!policy.spec.enforce_latest_digest());
        assert_eq!(policy.spec.check_interval(), Duration::from_secs(120));
        let att = policy.spec.required_attestation().unwrap();
        assert!(att.required_types.contains("slsaprovenance"));
    }
}
