//! # Audit Signals
//!
//! Structured events emitted when a cycle detects non-compliance, remediates
//! a workload, fails to remediate one, or cannot resolve the latest digest.
//!
//! [`TracingAuditSink`] forwards events to `tracing`. [`MemoryAuditSink`]
//! keeps a bounded trail that trims the oldest 10% of entries once its
//! capacity is exceeded.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use warden_core::PolicyRef;

// ---------------------------------------------------------------------------
// AuditEventKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventKind {
    NonCompliantImage,
    AutoRemediated,
    AutoRemediationFailed,
    DigestResolutionFailed,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonCompliantImage => "NonCompliantImage",
            Self::AutoRemediated => "AutoRemediated",
            Self::AutoRemediationFailed => "AutoRemediationFailed",
            Self::DigestResolutionFailed => "DigestResolutionFailed",
        }
    }

    /// Whether the event reports a problem.
    pub fn is_warning(&self) -> bool {
        !matches!(self, Self::AutoRemediated)
    }
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub policy: PolicyRef,
    /// `namespace/name` of the workload concerned, if any.
    pub workload: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        kind: AuditEventKind,
        policy: &PolicyRef,
        workload: Option<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            policy: policy.clone(),
            workload,
            message: message.into(),
            timestamp,
        }
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Emits each event as a `tracing` record under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let workload = event.workload.as_deref().unwrap_or("");
        if event.kind.is_warning() {
            tracing::warn!(
                target: "audit",
                kind = %event.kind,
                policy = %event.policy,
                workload,
                "{}",
                event.message
            );
        } else {
            tracing::info!(
                target: "audit",
                kind = %event.kind,
                policy = %event.policy,
                workload,
                "{}",
                event.message
            );
        }
    }
}

/// Bounded in-memory trail.
#[derive(Debug)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    max_events: usize,
}

impl MemoryAuditSink {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            max_events,
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn events_of(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        events.push(event);
        if events.len() > self.max_events {
            let trim_count = (self.max_events / 10).max(1);
            events.drain(..trim_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: AuditEventKind, n: usize) -> AuditEvent {
        AuditEvent::new(
            kind,
            &PolicyRef::new("default", "app"),
            Some(format!("default/w{n}")),
            "msg",
            Utc::now(),
        )
    }

    #[test]
    fn kinds_display_as_reason_strings() {
        assert_eq!(AuditEventKind::AutoRemediated.to_string(), "AutoRemediated");
        assert!(!AuditEventKind::AutoRemediated.is_warning());
        assert!(AuditEventKind::NonCompliantImage.is_warning());
    }

    #[test]
    fn memory_sink_trims_oldest_tenth() {
        let sink = MemoryAuditSink::new(20);
        for n in 0..21 {
            sink.record(event(AuditEventKind::NonCompliantImage, n));
        }
        assert_eq!(sink.len(), 19);
        assert_eq!(sink.events()[0].workload.as_deref(), Some("default/w2"));
    }

    #[test]
    fn memory_sink_filters_by_kind() {
        let sink = MemoryAuditSink::default();
        sink.record(event(AuditEventKind::NonCompliantImage, 0));
        sink.record(event(AuditEventKind::AutoRemediated, 0));
        assert_eq!(sink.events_of(AuditEventKind::AutoRemediated).len(), 1);
    }
}
