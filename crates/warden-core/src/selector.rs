//! # Label Selectors
//!
//! Equality (`matchLabels`) and set-based (`matchExpressions`) selectors
//! with Kubernetes semantics. All clauses are ANDed; an empty selector
//! matches every label set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SelectorError;

/// A label map on a namespace or workload.
pub type Labels = BTreeMap<String, String>;

/// Set-based selector operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorOperator {
    /// Label present with a value in the set.
    In,
    /// Label absent, or present with a value outside the set.
    NotIn,
    /// Label present with any value.
    Exists,
    /// Label absent.
    DoesNotExist,
}

impl SelectorOperator {
    /// The operator name as written in a policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "In",
            Self::NotIn => "NotIn",
            Self::Exists => "Exists",
            Self::DoesNotExist => "DoesNotExist",
        }
    }
}

impl std::fmt::Display for SelectorOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `matchExpressions` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl LabelSelectorRequirement {
    fn validate(&self) -> Result<(), SelectorError> {
        if self.key.is_empty() {
            return Err(SelectorError::EmptyKey);
        }
        match self.operator {
            SelectorOperator::In | SelectorOperator::NotIn if self.values.is_empty() => {
                Err(SelectorError::MissingValues {
                    key: self.key.clone(),
                    operator: self.operator.to_string(),
                })
            }
            SelectorOperator::Exists | SelectorOperator::DoesNotExist
                if !self.values.is_empty() =>
            {
                Err(SelectorError::UnexpectedValues {
                    key: self.key.clone(),
                    operator: self.operator.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.contains(v)),
            SelectorOperator::NotIn => value.map_or(true, |v| !self.values.contains(v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }
}

/// A label selector as carried by `namespaceSelector` / `workloadSelector`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: Labels,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// Selector requiring each given label to equal the given value.
    pub fn from_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            match_expressions: Vec::new(),
        }
    }

    /// Check structural validity.
    ///
    /// # Errors
    ///
    /// Returns the first [`SelectorError`] found.
    pub fn validate(&self) -> Result<(), SelectorError> {
        if self.match_labels.keys().any(|k| k.is_empty()) {
            return Err(SelectorError::EmptyKey);
        }
        self.match_expressions
            .iter()
            .try_for_each(LabelSelectorRequirement::validate)
    }

    /// Whether `labels` satisfies every clause.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
            && self.match_expressions.iter().all(|r| r.matches(labels))
    }

    /// Whether the selector has no clauses (selects everything).
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn requirement(key: &str, operator: SelectorOperator, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.into(),
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn match_labels_is_conjunctive() {
        let sel = LabelSelector::from_labels([("env", "prod"), ("team", "core")]);
        assert!(sel.matches(&labels(&[("env", "prod"), ("team", "core"), ("x", "y")])));
        assert!(!sel.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn set_based_operators() {
        let l = labels(&[("tier", "web")]);
        let cases = [
            (requirement("tier", SelectorOperator::In, &["web", "api"]), true),
            (requirement("tier", SelectorOperator::NotIn, &["web"]), false),
            (requirement("missing", SelectorOperator::NotIn, &["web"]), true),
            (requirement("tier", SelectorOperator::Exists, &[]), true),
            (requirement("tier", SelectorOperator::DoesNotExist, &[]), false),
        ];
        for (req, expected) in cases {
            let sel = LabelSelector {
                match_expressions: vec![req.clone()],
                ..Default::default()
            };
            assert_eq!(sel.matches(&l), expected, "{req:?}");
        }
    }

    #[test]
    fn validate_rejects_malformed_requirements() {
        let missing = LabelSelector {
            match_expressions: vec![requirement("tier", SelectorOperator::In, &[])],
            ..Default::default()
        };
        assert!(matches!(missing.validate(), Err(SelectorError::MissingValues { .. })));

        let unexpected = LabelSelector {
            match_expressions: vec![requirement("tier", SelectorOperator::Exists, &["x"])],
            ..Default::default()
        };
        assert!(matches!(unexpected.validate(), Err(SelectorError::UnexpectedValues { .. })));

        let empty_key = LabelSelector::from_labels([("", "x")]);
        assert_eq!(empty_key.validate(), Err(SelectorError::EmptyKey));
    }

    #[test]
    fn deserializes_kubernetes_shape() {
        let yaml = r#"
matchLabels:
  compliance: enabled
matchExpressions:
  - key: env
    operator: In
    values: [prod, staging]
"#;
        let sel: LabelSelector = serde_yaml::from_str(yaml).unwrap();
        assert!(sel.validate().is_ok());
        assert!(sel.matches(&labels(&[("compliance", "enabled"), ("env", "staging")])));
    }

    proptest! {
        #[test]
        fn empty_selector_matches_everything(
            pairs in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..6)
        ) {
            prop_assert!(LabelSelector::default().matches(&pairs));
        }
    }
}
