//! Append-only audit event shape.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The four stages a request's lifecycle passes through. Numbered 1,
/// 3, 4, 5 with no Phase 2: ingestion hands directly to policy, there
/// is no separate authentication stage to number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Phase1,
    Phase3,
    Phase4,
    Phase5,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Phase1 => "phase1",
            Phase::Phase3 => "phase3",
            Phase::Phase4 => "phase4",
            Phase::Phase5 => "phase5",
        };
        write!(f, "{}", s)
    }
}

/// A single append-only audit entry, keyed by correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub correlation_id: Uuid,
    pub user_id: String,
    pub timestamp: SystemTime,
    pub phase: Phase,
    pub event: String,
    pub details: HashMap<String, Value>,
}

impl AuditEvent {
    pub fn new(
        correlation_id: Uuid,
        user_id: impl Into<String>,
        phase: Phase,
        event: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            user_id: user_id.into(),
            timestamp: SystemTime::now(),
            phase,
            event: event.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Aggregated view over a correlation id's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total_events: usize,
    pub distinct_phases: usize,
    pub first_ts: Option<SystemTime>,
    pub last_ts: Option<SystemTime>,
    pub duration: Option<std::time::Duration>,
}
