//! Cluster and policy-store seams.
//!
//! The reconciler talks to the outside world only through [`ClusterClient`]
//! (namespaces and workloads) and [`PolicyStore`] (policy objects and their
//! status subresource). [`InMemoryCluster`] implements both, backed by a
//! [`ClusterSnapshot`] that round-trips through YAML for the CLI.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use warden_core::{ImagePolicy, LabelSelector, Labels, PolicyRef, PolicyStatus, SelectorError};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A container within a workload's pod template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
}

/// A deployable unit with a pod template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub containers: Vec<Container>,
}

impl Workload {
    /// Whether `labels[key] == value`.
    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).is_some_and(|v| v == value)
    }
}

/// A namespace and its labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the cluster API.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    /// Optimistic-concurrency conflict on write.
    #[error("conflict updating {0}")]
    Conflict(String),

    /// The API server is unreachable or rejected the request transiently.
    #[error("cluster API unavailable: {0}")]
    Unavailable(String),

    #[error("invalid selector: {0}")]
    Selector(#[from] SelectorError),
}

impl ClusterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Unavailable(_))
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Namespace and workload access.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Namespaces whose labels satisfy `selector`; all namespaces when `None`.
    async fn list_namespaces(
        &self,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Namespace>, ClusterError>;

    /// Workloads in `namespace` whose labels satisfy `selector`.
    async fn list_workloads(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Workload>, ClusterError>;

    /// Replace a workload's container images.
    async fn update_workload(&self, workload: &Workload) -> Result<(), ClusterError>;
}

/// Policy object access.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// `Ok(None)` when the policy no longer exists.
    async fn get_policy(&self, policy_ref: &PolicyRef) -> Result<Option<ImagePolicy>, ClusterError>;

    /// Overwrite the policy's status subresource.
    async fn update_status(
        &self,
        policy_ref: &PolicyRef,
        status: &PolicyStatus,
    ) -> Result<(), ClusterError>;
}

// ---------------------------------------------------------------------------
// InMemoryCluster
// ---------------------------------------------------------------------------

/// Serializable cluster contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
    #[serde(default)]
    pub workloads: Vec<Workload>,
    #[serde(default)]
    pub policies: Vec<ImagePolicy>,
}

type Key = (String, String);

#[derive(Debug, Default)]
struct State {
    namespaces: BTreeMap<String, Labels>,
    workloads: BTreeMap<Key, Workload>,
    policies: BTreeMap<Key, ImagePolicy>,
    rejected_updates: BTreeSet<Key>,
    status_writes: usize,
}

/// A cluster held in memory. Listings are returned in name order.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: RwLock<State>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot. Namespaces referenced only by workloads or policies
    /// are created without labels.
    pub fn from_snapshot(snapshot: ClusterSnapshot) -> Self {
        let cluster = Self::new();
        for ns in snapshot.namespaces {
            cluster.add_namespace(&ns.name, ns.labels);
        }
        for w in snapshot.workloads {
            cluster.add_workload(w);
        }
        for p in snapshot.policies {
            cluster.add_policy(p);
        }
        cluster
    }

    /// Current contents, in name order.
    pub fn snapshot(&self) -> ClusterSnapshot {
        let state = self.state.read();
        ClusterSnapshot {
            namespaces: state
                .namespaces
                .iter()
                .map(|(name, labels)| Namespace {
                    name: name.clone(),
                    labels: labels.clone(),
                })
                .collect(),
            workloads: state.workloads.values().cloned().collect(),
            policies: state.policies.values().cloned().collect(),
        }
    }

    pub fn add_namespace(&self, name: &str, labels: Labels) {
        self.state.write().namespaces.insert(name.to_string(), labels);
    }

    pub fn add_workload(&self, workload: Workload) {
        let mut state = self.state.write();
        state
            .namespaces
            .entry(workload.namespace.clone())
            .or_default();
        state
            .workloads
            .insert((workload.namespace.clone(), workload.name.clone()), workload);
    }

    pub fn add_policy(&self, policy: ImagePolicy) {
        let mut state = self.state.write();
        state.namespaces.entry(policy.namespace.clone()).or_default();
        state
            .policies
            .insert((policy.namespace.clone(), policy.name.clone()), policy);
    }

    pub fn remove_policy(&self, policy_ref: &PolicyRef) {
        self.state
            .write()
            .policies
            .remove(&(policy_ref.namespace.clone(), policy_ref.name.clone()));
    }

    pub fn workload(&self, namespace: &str, name: &str) -> Option<Workload> {
        self.state
            .read()
            .workloads
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn policy(&self, policy_ref: &PolicyRef) -> Option<ImagePolicy> {
        self.state
            .read()
            .policies
            .get(&(policy_ref.namespace.clone(), policy_ref.name.clone()))
            .cloned()
    }

    /// Make updates to this workload fail with a conflict.
    pub fn reject_updates_to(&self, namespace: &str, name: &str) {
        self.state
            .write()
            .rejected_updates
            .insert((namespace.to_string(), name.to_string()));
    }

    /// Number of status writes performed so far.
    pub fn status_writes(&self) -> usize {
        self.state.read().status_writes
    }
}

fn selected(selector: Option<&LabelSelector>, labels: &Labels) -> bool {
    selector.map_or(true, |s| s.matches(labels))
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn list_namespaces(
        &self,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Namespace>, ClusterError> {
        if let Some(s) = selector {
            s.validate()?;
        }
        Ok(self
            .state
            .read()
            .namespaces
            .iter()
            .filter(|(_, labels)| selected(selector, labels))
            .map(|(name, labels)| Namespace {
                name: name.clone(),
                labels: labels.clone(),
            })
            .collect())
    }

    async fn list_workloads(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Workload>, ClusterError> {
        if let Some(s) = selector {
            s.validate()?;
        }
        Ok(self
            .state
            .read()
            .workloads
            .values()
            .filter(|w| w.namespace == namespace && selected(selector, &w.labels))
            .cloned()
            .collect())
    }

    async fn update_workload(&self, workload: &Workload) -> Result<(), ClusterError> {
        let key = (workload.namespace.clone(), workload.name.clone());
        let mut state = self.state.write();
        if state.rejected_updates.contains(&key) {
            return Err(ClusterError::Conflict(format!(
                "workload {}/{}",
                workload.namespace, workload.name
            )));
        }
        match state.workloads.get_mut(&key) {
            Some(existing) => {
                *existing = workload.clone();
                Ok(())
            }
            None => Err(ClusterError::NotFound {
                kind: "workload",
                name: format!("{}/{}", workload.namespace, workload.name),
            }),
        }
    }
}

#[async_trait]
impl PolicyStore for InMemoryCluster {
    async fn get_policy(&self, policy_ref: &PolicyRef) -> Result<Option<ImagePolicy>, ClusterError> {
        Ok(self.policy(policy_ref))
    }

    async fn update_status(
        &self,
        policy_ref: &PolicyRef,
        status: &PolicyStatus,
    ) -> Result<(), ClusterError> {
        let key = (policy_ref.namespace.clone(), policy_ref.name.clone());
        let mut state = self.state.write();
        match state.policies.get_mut(&key) {
            Some(policy) => {
                policy.status = status.clone();
                state.status_writes += 1;
                Ok(())
            }
            None => Err(ClusterError::NotFound {
                kind: "imagepolicy",
                name: policy_ref.to_string(),
            }),
        }
    }
}
