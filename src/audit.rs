// src/audit.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::model::{AllocationMode, RequestId, UserId};

/// One ledger operation worth telling the outside world about. Delivery is
/// best-effort; the ledger never fails because a sink did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    Allocated {
        request_id: RequestId,
        user_id: UserId,
        mode: AllocationMode,
        rows: usize,
        total_hours: Decimal,
        first_date: NaiveDate,
    },
    Confirmed {
        request_id: RequestId,
        rows: usize,
    },
    Released {
        request_id: RequestId,
        rows: usize,
    },
    Reversed {
        request_id: RequestId,
        rows: usize,
        reason: String,
    },
}

impl AuditEvent {
    pub fn request_id(&self) -> &str {
        match self {
            AuditEvent::Allocated { request_id, .. }
            | AuditEvent::Confirmed { request_id, .. }
            | AuditEvent::Released { request_id, .. }
            | AuditEvent::Reversed { request_id, .. } => request_id,
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> anyhow::Result<()>;
}

/// Production sink: emits the event into the tracing stream. Real audit-log
/// persistence lives outside this crate.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) -> anyhow::Result<()> {
        info!(request_id = %event.request_id(), event = ?event, "audit");
        Ok(())
    }
}

// --- Test support ---

/// Matcher for recorded events, used by the assertion helpers below.
#[derive(Debug, Default, Clone)]
pub struct AuditCriteria {
    pub request_id: Option<String>,
    pub kind: Option<&'static str>,
}

impl AuditCriteria {
    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(req) = &self.request_id {
            if event.request_id() != req {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            let actual = match event {
                AuditEvent::Allocated { .. } => "allocated",
                AuditEvent::Confirmed { .. } => "confirmed",
                AuditEvent::Released { .. } => "released",
                AuditEvent::Reversed { .. } => "reversed",
            };
            if actual != kind {
                return false;
            }
        }
        true
    }
}

/// In-memory sink recording every event, with assertion helpers for tests.
#[derive(Clone, Default)]
pub struct RecordingAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> MutexGuard<'_, Vec<AuditEvent>> {
        self.events.lock().unwrap()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn count(&self, criteria: AuditCriteria) -> usize {
        self.recorded()
            .iter()
            .filter(|e| criteria.matches(e))
            .count()
    }

    pub fn expect_event(&self, criteria: AuditCriteria) {
        assert!(
            self.recorded().iter().any(|e| criteria.matches(e)),
            "Expected audit event matching {:?} not found in {:?}",
            criteria,
            self.recorded()
        );
    }

    pub fn expect_no_event(&self, criteria: AuditCriteria) {
        assert!(
            !self.recorded().iter().any(|e| criteria.matches(e)),
            "Unexpected audit event matching {:?} found in {:?}",
            criteria,
            self.recorded()
        );
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) -> anyhow::Result<()> {
        debug!("Recording audit event: {:?}", event);
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Sink that always fails, for exercising the best-effort contract.
#[derive(Debug, Clone, Default)]
pub struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    fn record(&self, _event: AuditEvent) -> anyhow::Result<()> {
        anyhow::bail!("audit backend unavailable")
    }
}
