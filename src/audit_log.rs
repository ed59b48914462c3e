//! Append-only audit event sink with tier-based retention.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::time::interval;
use tracing::error;
use uuid::Uuid;

use crate::types::{AuditEvent, AuditSummary, Phase};

#[async_trait]
pub trait AuditLogger: Send + Sync {
    /// Must never throw; backend failures are logged and swallowed.
    async fn log(&self, event: AuditEvent);
    async fn trail(&self, correlation_id: Uuid) -> Vec<AuditEvent>;
    async fn summary(&self, correlation_id: Uuid) -> AuditSummary;
    async fn sweep_expired(&self, retention: Duration);
    /// Stops any background retention sweeper owned by this logger.
    /// No-op for implementations that don't run one.
    fn shutdown(&self) {}
}

pub struct InMemoryAuditLogger {
    events: Arc<RwLock<Vec<AuditEvent>>>,
    shutdown_notify: Arc<Notify>,
    is_running: Arc<RwLock<bool>>,
}

impl InMemoryAuditLogger {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            shutdown_notify: Arc::new(Notify::new()),
            is_running: Arc::new(RwLock::new(true)),
        }
    }

    /// Starts the periodic retention sweeper. Stopped by `shutdown`;
    /// never outlives the logger it was spawned from.
    pub fn start_retention_sweeper(&self, period: Duration, retention: Duration) {
        let events = self.events.clone();
        let shutdown_notify = self.shutdown_notify.clone();
        let is_running = self.is_running.clone();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !*is_running.read() {
                            break;
                        }
                        let now = SystemTime::now();
                        events.write().retain(|event| {
                            now.duration_since(event.timestamp).unwrap_or_default() < retention
                        });
                    }
                    _ = shutdown_notify.notified() => break,
                }
            }
        });
    }

    pub fn shutdown(&self) {
        *self.is_running.write() = false;
        self.shutdown_notify.notify_waiters();
    }
}

impl Default for InMemoryAuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLogger for InMemoryAuditLogger {
    async fn log(&self, event: AuditEvent) {
        self.events.write().push(event);
    }

    async fn trail(&self, correlation_id: Uuid) -> Vec<AuditEvent> {
        let mut matching: Vec<AuditEvent> = self
            .events
            .read()
            .iter()
            .filter(|event| event.correlation_id == correlation_id)
            .cloned()
            .collect();
        matching.sort_by_key(|event| event.timestamp);
        matching
    }

    async fn summary(&self, correlation_id: Uuid) -> AuditSummary {
        let trail = self.trail(correlation_id).await;
        let distinct_phases: std::collections::HashSet<Phase> =
            trail.iter().map(|e| e.phase).collect();

        let first_ts = trail.first().map(|e| e.timestamp);
        let last_ts = trail.last().map(|e| e.timestamp);
        let duration = match (first_ts, last_ts) {
            (Some(first), Some(last)) => last.duration_since(first).ok(),
            _ => None,
        };

        AuditSummary {
            total_events: trail.len(),
            distinct_phases: distinct_phases.len(),
            first_ts,
            last_ts,
            duration,
        }
    }

    async fn sweep_expired(&self, retention: Duration) {
        let now = SystemTime::now();
        self.events.write().retain(|event| {
            now.duration_since(event.timestamp).unwrap_or_default() < retention
        });
    }

    fn shutdown(&self) {
        InMemoryAuditLogger::shutdown(self)
    }
}

/// Logs an event via `logger`, never propagating a failure to the
/// caller. `InMemoryAuditLogger::log` cannot itself fail, but this is
/// the seam a fallible backend (e.g. a relational sink) plugs into:
/// any panic caught here is reported to stderr and the event is
/// dropped.
pub async fn log_infallible(logger: &dyn AuditLogger, event: AuditEvent) {
    let correlation_id = event.correlation_id;
    let result = std::panic::AssertUnwindSafe(logger.log(event))
        .catch_unwind()
        .await;
    if result.is_err() {
        error!(correlation_id = %correlation_id, "audit backend panicked, event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(correlation_id: Uuid, phase: Phase, ts_offset_secs: u64) -> AuditEvent {
        let mut event = AuditEvent::new(correlation_id, "u1", phase, "TEST_EVENT");
        event.timestamp = SystemTime::now() - Duration::from_secs(ts_offset_secs);
        event
    }

    #[tokio::test]
    async fn trail_is_ordered_ascending_by_timestamp() {
        let logger = InMemoryAuditLogger::new();
        let correlation_id = Uuid::new_v4();
        logger.log(event(correlation_id, Phase::Phase1, 5)).await;
        logger.log(event(correlation_id, Phase::Phase3, 10)).await;
        logger.log(event(correlation_id, Phase::Phase4, 1)).await;

        let trail = logger.trail(correlation_id).await;
        assert_eq!(trail.len(), 3);
        assert!(trail[0].timestamp <= trail[1].timestamp);
        assert!(trail[1].timestamp <= trail[2].timestamp);
    }

    #[tokio::test]
    async fn summary_counts_distinct_phases() {
        let logger = InMemoryAuditLogger::new();
        let correlation_id = Uuid::new_v4();
        logger.log(event(correlation_id, Phase::Phase1, 5)).await;
        logger.log(event(correlation_id, Phase::Phase1, 4)).await;
        logger.log(event(correlation_id, Phase::Phase3, 3)).await;

        let summary = logger.summary(correlation_id).await;
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.distinct_phases, 2);
    }

    #[tokio::test]
    async fn sweep_expired_drops_old_events() {
        let logger = InMemoryAuditLogger::new();
        let correlation_id = Uuid::new_v4();
        logger.log(event(correlation_id, Phase::Phase1, 1000)).await;
        logger.log(event(correlation_id, Phase::Phase1, 1)).await;

        logger.sweep_expired(Duration::from_secs(60)).await;

        let trail = logger.trail(correlation_id).await;
        assert_eq!(trail.len(), 1);
    }
}
