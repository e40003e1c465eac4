//! # warden-core: Foundational Types for Digest Warden
//!
//! Defines the data model shared by every other crate in the workspace:
//! the `ImagePolicy` resource, its computed `PolicyStatus`, validated
//! identifiers for repositories and content digests, and the label selector
//! type used to narrow namespaces and workloads.
//!
//! ## Key Design Principles
//!
//! 1. **Validated newtypes.** `Repository` and `ImageDigest` can only be
//!    built through validating constructors, and deserialization goes through
//!    the same path. A digest in this system is always `sha256:<64 hex>`.
//!
//! 2. **Typed sentinels.** The per-workload digest is a `CurrentDigest` enum
//!    (`Digest`, `TagBased`, `Unknown`) rather than a magic string, while
//!    still serializing to the `"tag-based"` / `""` wire form.
//!
//! 3. **Status is data.** `PolicyStatus` carries no behavior that mutates
//!    it in place; the controller computes a fresh value every cycle.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `warden-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod policy;
pub mod repository;
pub mod selector;
pub mod status;

pub use digest::{CurrentDigest, ImageDigest, TAG_BASED};
pub use error::{SelectorError, ValidationError};
pub use policy::{
    AttestationPolicy, ImagePolicy, ImagePolicySpec, PolicyRef, DEFAULT_CHECK_INTERVAL_SECS,
    MAX_CHECK_INTERVAL_SECS, MIN_CHECK_INTERVAL_SECS,
};
pub use repository::Repository;
pub use selector::{LabelSelector, LabelSelectorRequirement, Labels, SelectorOperator};
pub use status::{
    AttestationDetails, ComplianceStatus, Condition, ConditionStatus, ConditionType,
    PolicyStatus, WorkloadStatus,
};
