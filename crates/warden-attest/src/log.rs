//! Transparency-log seam and an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use warden_core::ImageDigest;

use crate::error::TransparencyLogError;

/// One log entry whose subject is the looked-up digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub uuid: String,
    pub log_index: i64,
    pub integrated_time: DateTime<Utc>,
    /// OIDC issuer of the signing identity, if a certificate was present.
    pub issuer: Option<String>,
    /// In-toto predicate type, if the entry is an attestation.
    pub attestation_type: Option<String>,
}

/// A transparency log queried by subject digest.
#[async_trait]
pub trait TransparencyLog: Send + Sync {
    /// All entries whose subject is `digest`, in log order.
    async fn entries_for_digest(
        &self,
        digest: &ImageDigest,
    ) -> Result<Vec<LogEntry>, TransparencyLogError>;
}

/// Entries keyed by digest, for tests and offline snapshots.
#[derive(Debug, Default)]
pub struct InMemoryTransparencyLog {
    entries: RwLock<HashMap<String, Vec<LogEntry>>>,
    outage: RwLock<Option<String>>,
}

impl InMemoryTransparencyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entry` under `digest`.
    pub fn insert(&self, digest: &ImageDigest, entry: LogEntry) {
        self.entries
            .write()
            .entry(digest.as_str().to_string())
            .or_default()
            .push(entry);
    }

    /// Make every lookup fail with `reason` until cleared with `None`.
    pub fn set_outage(&self, reason: Option<String>) {
        *self.outage.write() = reason;
    }

    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransparencyLog for InMemoryTransparencyLog {
    async fn entries_for_digest(
        &self,
        digest: &ImageDigest,
    ) -> Result<Vec<LogEntry>, TransparencyLogError> {
        if let Some(reason) = self.outage.read().clone() {
            return Err(TransparencyLogError::Unavailable(reason));
        }
        Ok(self
            .entries
            .read()
            .get(digest.as_str())
            .cloned()
            .unwrap_or_default())
    }
}
