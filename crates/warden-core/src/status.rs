//! # Policy Status
//!
//! Observed state written by the controller once per reconciliation cycle.
//! Every field except `conditions` is recomputed from scratch each cycle;
//! `conditions` is merged by type (see `warden-controller::status`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::{CurrentDigest, ImageDigest};

/// Aggregate compliance of all workloads covered by a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComplianceStatus {
    /// Every covered workload is compliant (and there is at least one).
    Compliant,
    /// At least one covered workload is non-compliant.
    NonCompliant,
    /// No workloads are covered.
    #[default]
    Unknown,
    /// Digest resolution failed this cycle.
    Error,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "Compliant",
            Self::NonCompliant => "NonCompliant",
            Self::Unknown => "Unknown",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition types maintained on a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionType {
    /// The policy has been evaluated and its status is current.
    Ready,
    /// Reserved for long-running evaluations.
    Progressing,
    /// The registry could not be reached on the last refresh.
    Degraded,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Progressing => "Progressing",
            Self::Degraded => "Degraded",
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A typed, timestamped boolean-state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default)]
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

/// Attestation outcome recorded on a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationDetails {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub attestation_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    /// Transparency log index; only recorded when positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compliance verdict for a single workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub current_digest: CurrentDigest,
    pub is_compliant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_valid_attestation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_details: Option<AttestationDetails>,
    pub last_updated: DateTime<Utc>,
}

/// Observed state of an image policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_digest: Option<ImageDigest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compliance_status: ComplianceStatus,
    #[serde(default, alias = "monitoredDeployments")]
    pub workload_statuses: Vec<WorkloadStatus>,
    #[serde(default, alias = "totalDeployments")]
    pub total_workloads: u32,
    #[serde(default, alias = "compliantDeployments")]
    pub compliant_workloads: u32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl PolicyStatus {
    /// Look up a condition by type.
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_camel_case_with_type_key() {
        let now = Utc::now();
        let status = PolicyStatus {
            compliance_status: ComplianceStatus::NonCompliant,
            total_workloads: 2,
            compliant_workloads: 1,
            conditions: vec![Condition {
                condition_type: ConditionType::Ready,
                status: ConditionStatus::True,
                reason: "NonCompliant".into(),
                message: "1 of 2 workloads are non-compliant".into(),
                last_transition_time: now,
            }],
            ..Default::default()
        };
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["complianceStatus"], "NonCompliant");
        assert_eq!(v["totalWorkloads"], 2);
        assert_eq!(v["conditions"][0]["type"], "Ready");
        assert!(v.get("latestDigest").is_none());
    }

    #[test]
    fn default_status_is_unknown() {
        let status = PolicyStatus::default();
        assert_eq!(status.compliance_status, ComplianceStatus::Unknown);
        assert!(status.condition(ConditionType::Ready).is_none());
    }
}
