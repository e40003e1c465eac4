//! # warden-controller: Continuous Image Compliance
//!
//! Reconciles `ImagePolicy` objects: resolves the repository's latest
//! trusted digest, finds the workloads that run the repository, classifies
//! each one, optionally pins non-compliant workloads to the latest digest,
//! and writes a recomputed status.
//!
//! ## Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`reconciler`] | Cycle orchestration, requeue, watch loop |
//! | [`scanner`] | Namespace and workload discovery |
//! | [`analyzer`] | Per-workload digest and attestation verdict |
//! | [`remediation`] | Preconditions and image pinning |
//! | [`status`] | Summary status and condition merge |
//! | [`image`] | Image reference matching with a name boundary |
//! | [`cluster`] | Cluster and policy-store seams, in-memory cluster |
//! | [`audit`] | Audit events and sinks |
//!
//! ## Concurrency
//!
//! A [`Reconciler`] holds no per-cycle state. Cycles for different policies
//! may run concurrently on one instance; the invoking framework serializes
//! cycles for the same policy.

pub mod analyzer;
pub mod audit;
pub mod clock;
pub mod cluster;
pub mod config;
pub mod error;
pub mod image;
pub mod reconciler;
pub mod remediation;
pub mod scanner;
pub mod status;

pub use analyzer::{AnalysisContext, ComplianceAnalyzer};
pub use audit::{AuditEvent, AuditEventKind, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use clock::{Clock, FixedClock, SystemClock};
pub use cluster::{
    ClusterClient, ClusterError, ClusterSnapshot, Container, InMemoryCluster, Namespace,
    PolicyStore, Workload,
};
pub use config::ControllerConfig;
pub use error::ReconcileError;
pub use reconciler::{ReconcileAction, Reconciler};
pub use remediation::RemediationError;
