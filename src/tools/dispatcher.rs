//! Validates, executes, meters, and audits each tool call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::audit_log::{log_infallible, AuditLogger};
use crate::types::{AuditEvent, Phase, ToolName, ToolResult};

use super::registry::ToolRegistry;

#[derive(Debug, Clone, Default)]
pub struct DispatchMetrics {
    pub total_executions: u32,
    pub total_cost: f64,
    pub total_time: f64,
    pub error_count: u32,
    pub per_tool_counts: HashMap<String, u32>,
}

/// Atomic-counter snapshot source; the per-tool map is guarded by a
/// mutex since it is not a fixed-width counter. Counters only ever
/// increment and are read back as a point-in-time snapshot.
pub struct DispatchMetricsTracker {
    total_executions: AtomicU32,
    error_count: AtomicU32,
    total_cost_micros: std::sync::atomic::AtomicI64,
    total_time_millis: std::sync::atomic::AtomicU64,
    per_tool_counts: Mutex<HashMap<String, u32>>,
}

impl DispatchMetricsTracker {
    pub fn new() -> Self {
        Self {
            total_executions: AtomicU32::new(0),
            error_count: AtomicU32::new(0),
            total_cost_micros: std::sync::atomic::AtomicI64::new(0),
            total_time_millis: std::sync::atomic::AtomicU64::new(0),
            per_tool_counts: Mutex::new(HashMap::new()),
        }
    }

    fn record(&self, tool_name: &str, cost: f64, execution_time_ms: f64, failed: bool) {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_cost_micros
            .fetch_add((cost * 1_000_000.0).round() as i64, Ordering::Relaxed);
        self.total_time_millis
            .fetch_add(execution_time_ms.round() as u64, Ordering::Relaxed);
        *self
            .per_tool_counts
            .lock()
            .entry(tool_name.to_string())
            .or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> DispatchMetrics {
        DispatchMetrics {
            total_executions: self.total_executions.load(Ordering::Relaxed),
            total_cost: self.total_cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            total_time: self.total_time_millis.load(Ordering::Relaxed) as f64,
            error_count: self.error_count.load(Ordering::Relaxed),
            per_tool_counts: self.per_tool_counts.lock().clone(),
        }
    }
}

impl Default for DispatchMetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub correlation_id: Uuid,
    pub user_id: String,
}

const BASE_COST: f64 = 0.005;

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn compute_cost(execution_time_ms: f64, modifier: f64) -> f64 {
    let over_second = (execution_time_ms - 1000.0).max(0.0) / 1000.0 * 0.001;
    round6((BASE_COST + over_second) * modifier)
}

pub struct ToolDispatcher<'a> {
    registry: &'a ToolRegistry,
    metrics: DispatchMetricsTracker,
    audit: &'a dyn AuditLogger,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(registry: &'a ToolRegistry, audit: &'a dyn AuditLogger) -> Self {
        Self {
            registry,
            metrics: DispatchMetricsTracker::new(),
            audit,
        }
    }

    pub fn metrics(&self) -> DispatchMetrics {
        self.metrics.snapshot()
    }

    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        ctx: Option<&DispatchContext>,
    ) -> ToolResult {
        if let Some(ctx) = ctx {
            log_infallible(
                self.audit,
                AuditEvent::new(ctx.correlation_id, &ctx.user_id, Phase::Phase4, "TOOL_CALL_START")
                    .with_detail("toolName", name),
            )
            .await;
        }

        let started = Instant::now();
        let tool_name = ToolName::from_str_opt(name);

        let outcome = match tool_name {
            None => Err("not found".to_string()),
            Some(tool_name) => match self.registry.get(tool_name) {
                None => Err("not found".to_string()),
                Some(executor) => {
                    if !executor.validate_args(&args) {
                        Err(format!("Invalid arguments: {args}"))
                    } else {
                        executor.execute(&args).await
                    }
                }
            },
        };

        let execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let modifier = tool_name.map(|t| t.cost_modifier()).unwrap_or(1.0);
        let cost = compute_cost(execution_time_ms, modifier);
        let failed = outcome.is_err();

        self.metrics.record(name, cost, execution_time_ms, failed);

        if let Some(ctx) = ctx {
            let event_name = if failed {
                "TOOL_CALL_ERROR"
            } else {
                "TOOL_CALL_SUCCESS"
            };
            log_infallible(
                self.audit,
                AuditEvent::new(ctx.correlation_id, &ctx.user_id, Phase::Phase4, event_name)
                    .with_detail("toolName", name)
                    .with_detail("cost", cost),
            )
            .await;
        }

        match outcome {
            Ok(result) => ToolResult {
                tool_name: name.to_string(),
                result,
                execution_time: Some(execution_time_ms),
                cost: Some(cost),
                error: None,
            },
            Err(error) => ToolResult {
                tool_name: name.to_string(),
                result: Value::Null,
                execution_time: Some(execution_time_ms),
                cost: Some(cost),
                error: Some(error),
            },
        }
    }

    /// Runs independent calls concurrently, preserving input order in
    /// the returned vector. A single call's failure never aborts the
    /// rest of the batch.
    pub async fn dispatch_batch(
        &self,
        calls: Vec<(String, Value)>,
        ctx: Option<&DispatchContext>,
    ) -> Vec<ToolResult> {
        let futures = calls
            .into_iter()
            .map(|(name, args)| self.dispatch(&name, args, ctx));
        join_all(futures).await
    }
}
