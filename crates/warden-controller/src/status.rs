//! Summary status and condition bookkeeping.

use chrono::{DateTime, Utc};
use warden_core::{ComplianceStatus, Condition, ConditionStatus, ConditionType};

/// `Ready` reason when no workload references the repository.
pub const REASON_NO_WORKLOADS: &str = "NoWorkloads";
/// `Ready` reason when every workload is compliant.
pub const REASON_ALL_COMPLIANT: &str = "AllCompliant";
/// `Ready` reason when at least one workload is not compliant.
pub const REASON_NON_COMPLIANT: &str = "NonCompliant";
/// `Degraded` reason when the latest digest could not be resolved.
pub const REASON_REGISTRY_ERROR: &str = "RegistryError";
/// `Degraded` reason after a successful refresh.
pub const REASON_REGISTRY_REACHABLE: &str = "RegistryReachable";

/// Overall verdict for a cycle. A failed refresh wins over the counts.
pub fn aggregate(total: u32, compliant: u32, refresh_failed: bool) -> ComplianceStatus {
    if refresh_failed {
        ComplianceStatus::Error
    } else if total == 0 {
        ComplianceStatus::Unknown
    } else if compliant == total {
        ComplianceStatus::Compliant
    } else {
        ComplianceStatus::NonCompliant
    }
}

/// Insert or update the condition of `condition_type`.
///
/// `last_transition_time` is set to `now` only when the type is new or its
/// status differs from the stored one. Reason and message always take the
/// new values.
pub fn merge_condition(
    conditions: &mut Vec<Condition>,
    condition_type: ConditionType,
    status: ConditionStatus,
    reason: &str,
    message: impl Into<String>,
    now: DateTime<Utc>,
) {
    let message = message.into();
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        Some(existing) => {
            if existing.status != status {
                existing.status = status;
                existing.last_transition_time = now;
            }
            existing.reason = reason.to_string();
            existing.message = message;
        }
        None => conditions.push(Condition {
            condition_type,
            status,
            reason: reason.to_string(),
            message,
            last_transition_time: now,
        }),
    }
}

/// The `Ready` condition for the given counts.
pub fn set_ready(conditions: &mut Vec<Condition>, total: u32, compliant: u32, now: DateTime<Utc>) {
    let (status, reason, message) = if total == 0 {
        (
            ConditionStatus::True,
            REASON_NO_WORKLOADS,
            "no workloads reference the repository".to_string(),
        )
    } else if compliant == total {
        (
            ConditionStatus::True,
            REASON_ALL_COMPLIANT,
            format!("all {total} workloads are compliant"),
        )
    } else {
        (
            ConditionStatus::False,
            REASON_NON_COMPLIANT,
            format!("{compliant} of {total} workloads are compliant"),
        )
    };
    merge_condition(conditions, ConditionType::Ready, status, reason, message, now);
}

/// The `Degraded` condition after a refresh attempt.
pub fn set_degraded(conditions: &mut Vec<Condition>, refresh_error: Option<&str>, now: DateTime<Utc>) {
    match refresh_error {
        Some(err) => merge_condition(
            conditions,
            ConditionType::Degraded,
            ConditionStatus::True,
            REASON_REGISTRY_ERROR,
            format!("failed to resolve latest digest: {err}"),
            now,
        ),
        None => merge_condition(
            conditions,
            ConditionType::Degraded,
            ConditionStatus::False,
            REASON_REGISTRY_REACHABLE,
            "latest digest resolved",
            now,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn aggregate_rules() {
        assert_eq!(aggregate(0, 0, false), ComplianceStatus::Unknown);
        assert_eq!(aggregate(3, 3, false), ComplianceStatus::Compliant);
        assert_eq!(aggregate(3, 2, false), ComplianceStatus::NonCompliant);
        assert_eq!(aggregate(3, 3, true), ComplianceStatus::Error);
        assert_eq!(aggregate(0, 0, true), ComplianceStatus::Error);
    }

    #[test]
    fn merge_is_idempotent_for_same_status() {
        let mut conds = Vec::new();
        merge_condition(&mut conds, ConditionType::Ready, ConditionStatus::True, "A", "m1", t(0));
        merge_condition(&mut conds, ConditionType::Ready, ConditionStatus::True, "A", "m2", t(60));
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].last_transition_time, t(0));
        assert_eq!(conds[0].message, "m2");
    }

    #[test]
    fn status_flip_moves_transition_time() {
        let mut conds = Vec::new();
        merge_condition(&mut conds, ConditionType::Ready, ConditionStatus::True, "A", "", t(0));
        merge_condition(&mut conds, ConditionType::Ready, ConditionStatus::False, "B", "", t(60));
        assert_eq!(conds[0].status, ConditionStatus::False);
        assert_eq!(conds[0].reason, "B");
        assert_eq!(conds[0].last_transition_time, t(60));
    }

    #[test]
    fn conditions_stay_unique_by_type() {
        let mut conds = Vec::new();
        set_ready(&mut conds, 2, 2, t(0));
        set_degraded(&mut conds, None, t(0));
        set_ready(&mut conds, 2, 1, t(1));
        set_degraded(&mut conds, Some("boom"), t(1));
        assert_eq!(conds.len(), 2);
        let degraded = conds
            .iter()
            .find(|c| c.condition_type == ConditionType::Degraded)
            .unwrap();
        assert_eq!(degraded.status, ConditionStatus::True);
        assert_eq!(degraded.reason, REASON_REGISTRY_ERROR);
    }

    #[test]
    fn ready_reasons() {
        let mut conds = Vec::new();
        set_ready(&mut conds, 0, 0, t(0));
        assert_eq!(conds[0].reason, REASON_NO_WORKLOADS);
        set_ready(&mut conds, 4, 3, t(1));
        assert_eq!(conds[0].reason, REASON_NON_COMPLIANT);
        assert_eq!(conds[0].status, ConditionStatus::False);
    }
}
