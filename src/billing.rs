//! Assembles and persists billing records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::cost::CostBreakdown;
use crate::error::BillingPersistError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingMetrics {
    pub tokens_used: u32,
    pub tool_calls_count: u32,
    pub llm_calls_count: u32,
    pub recursion_depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingReport {
    pub correlation_id: Uuid,
    pub user_id: String,
    pub total_cost: f64,
    pub cost_breakdown: CostBreakdown,
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
    pub metrics: BillingMetrics,
}

/// The execution summary a report is generated from; fields mirror
/// what Phase 4 and Phase 5 accumulate over a run.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    pub tokens_used: u32,
    pub tool_calls_count: u32,
    pub llm_calls_count: u32,
    pub recursion_depth: u32,
    pub execution_time: f64,
}

#[derive(Debug, Clone)]
pub struct PersistedBillingRow {
    pub report: BillingReport,
    pub signature: String,
    pub status: String,
    pub phase_result: String,
    pub from_cache: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserStats {
    pub total_cost: f64,
    pub total_tokens: u64,
    pub request_count: u64,
    pub average_cost: f64,
}

pub fn generate_report(
    correlation_id: Uuid,
    user_id: &str,
    cost_breakdown: CostBreakdown,
    exec: &ExecutionSummary,
) -> BillingReport {
    BillingReport {
        correlation_id,
        user_id: user_id.to_string(),
        total_cost: cost_breakdown.total_cost,
        cost_breakdown,
        execution_time: exec.execution_time,
        timestamp: Utc::now(),
        metrics: BillingMetrics {
            tokens_used: exec.tokens_used,
            tool_calls_count: exec.tool_calls_count,
            llm_calls_count: exec.llm_calls_count,
            recursion_depth: exec.recursion_depth,
        },
    }
}

pub struct BillingReporter {
    rows: Arc<DashMap<Uuid, PersistedBillingRow>>,
}

impl BillingReporter {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
        }
    }

    /// Upserts keyed by `correlationId`. Failures are wrapped and
    /// returned; callers log but do not fail the request.
    pub fn persist_report(
        &self,
        report: BillingReport,
        signature: &str,
        status: &str,
        phase_result: &str,
        from_cache: bool,
        error_code: Option<String>,
        error_message: Option<String>,
    ) -> Result<(), BillingPersistError> {
        let correlation_id = report.correlation_id;
        let row = PersistedBillingRow {
            report,
            signature: signature.to_string(),
            status: status.to_string(),
            phase_result: phase_result.to_string(),
            from_cache,
            error_code,
            error_message,
        };
        self.rows.insert(correlation_id, row);
        Ok(())
    }

    /// Reports for `user_id`, optionally bounded to `[from, to]` on
    /// `timestamp`. Either bound may be omitted.
    pub fn user_costs(
        &self,
        user_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<BillingReport> {
        self.rows
            .iter()
            .filter(|entry| entry.report.user_id == user_id)
            .filter(|entry| from.map(|from| entry.report.timestamp >= from).unwrap_or(true))
            .filter(|entry| to.map(|to| entry.report.timestamp <= to).unwrap_or(true))
            .map(|entry| entry.report.clone())
            .collect()
    }

    pub fn get_report(&self, correlation_id: Uuid, user_id: &str) -> Option<BillingReport> {
        self.rows
            .get(&correlation_id)
            .filter(|row| row.report.user_id == user_id)
            .map(|row| row.report.clone())
    }

    pub fn user_stats(
        &self,
        user_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> UserStats {
        let reports = self.user_costs(user_id, from, to);
        if reports.is_empty() {
            return UserStats::default();
        }
        let total_cost: f64 = reports.iter().map(|r| r.total_cost).sum();
        let total_tokens: u64 = reports.iter().map(|r| r.metrics.tokens_used as u64).sum();
        let count = reports.len() as u64;
        UserStats {
            total_cost,
            total_tokens,
            request_count: count,
            average_cost: total_cost / count as f64,
        }
    }
}

impl Default for BillingReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Persists `report`, logging on failure without propagating it: a
/// billing-persistence error must never fail the request it bills.
pub fn persist_best_effort(
    reporter: &BillingReporter,
    report: BillingReport,
    signature: &str,
    status: &str,
    phase_result: &str,
    from_cache: bool,
    error_code: Option<String>,
    error_message: Option<String>,
) {
    let correlation_id = report.correlation_id;
    if let Err(e) = reporter.persist_report(
        report,
        signature,
        status,
        phase_result,
        from_cache,
        error_code,
        error_message,
    ) {
        warn!(correlation_id = %correlation_id, error = %e, "billing report persistence failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostConstants;
    use crate::cost::breakdown;

    fn sample_exec() -> ExecutionSummary {
        ExecutionSummary {
            tokens_used: 100,
            tool_calls_count: 1,
            llm_calls_count: 2,
            recursion_depth: 3,
            execution_time: 42.0,
        }
    }

    #[test]
    fn generates_report_with_metrics_mirroring_exec() {
        let cost_breakdown = breakdown(100, &[], &[], &CostConstants::default()).unwrap();
        let report = generate_report(Uuid::new_v4(), "u1", cost_breakdown, &sample_exec());
        assert_eq!(report.metrics.llm_calls_count, 2);
        assert_eq!(report.metrics.recursion_depth, 3);
    }

    #[test]
    fn persist_then_get_report_round_trips() {
        let reporter = BillingReporter::new();
        let cost_breakdown = breakdown(100, &[], &[], &CostConstants::default()).unwrap();
        let correlation_id = Uuid::new_v4();
        let report = generate_report(correlation_id, "u1", cost_breakdown, &sample_exec());

        reporter
            .persist_report(report, "sig", "COMPLETE", "CONTINUE", false, None, None)
            .unwrap();

        let fetched = reporter.get_report(correlation_id, "u1");
        assert!(fetched.is_some());
        assert!(reporter.get_report(correlation_id, "u2").is_none());
    }

    #[test]
    fn user_stats_averages_across_reports() {
        let reporter = BillingReporter::new();
        for _ in 0..2 {
            let cost_breakdown = breakdown(100, &[], &[], &CostConstants::default()).unwrap();
            let report = generate_report(Uuid::new_v4(), "u1", cost_breakdown, &sample_exec());
            reporter
                .persist_report(report, "sig", "COMPLETE", "CONTINUE", false, None, None)
                .unwrap();
        }
        let stats = reporter.user_stats("u1", None, None);
        assert_eq!(stats.request_count, 2);
        assert!((stats.average_cost - stats.total_cost / 2.0).abs() < 1e-9);
    }

    #[test]
    fn user_stats_degrades_to_zero_for_unknown_user() {
        let reporter = BillingReporter::new();
        let stats = reporter.user_stats("nobody", None, None);
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.total_cost, 0.0);
    }
}
