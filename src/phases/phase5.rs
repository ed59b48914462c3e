//! Phase 5: serialization. Cost, billing, cache write, final audit.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde_json::json;
use uuid::Uuid;

use crate::audit_log::{log_infallible, AuditLogger};
use crate::billing::{self, BillingReporter, ExecutionSummary};
use crate::cache::ResultCache;
use crate::config::{CacheConfig, CostConstants};
use crate::cost;
use crate::error::{codes, ErrorCode};
use crate::phases::phase4::{ExecutionResult, ExecutionStatus};
use crate::serializer;
use crate::types::{Job, Phase, PhaseResult, Response, ResponseError};

pub struct Phase5Output {
    pub response: Response,
    pub cached: bool,
}

fn phase_result_label(phase_result: PhaseResult) -> &'static str {
    match phase_result {
        PhaseResult::Continue => "CONTINUE",
        PhaseResult::CacheHit => "CACHE_HIT",
        PhaseResult::PolicyViolation => "POLICY_VIOLATION",
        PhaseResult::Error => "ERROR",
    }
}

fn build_response(job: &Job, signature: &str, execution: &ExecutionResult, started_at: DateTime<Utc>) -> Response {
    let (status, phase_result, error) = match (&execution.status, &execution.error) {
        (ExecutionStatus::Complete, None) => ("COMPLETE".to_string(), PhaseResult::Continue, None),
        (_, Some(error)) => (
            "ERROR".to_string(),
            PhaseResult::Error,
            Some(ResponseError {
                code: error.code.clone(),
                message: error.message.clone(),
                details: error.details.clone(),
            }),
        ),
        (ExecutionStatus::Error, None) => (
            "ERROR".to_string(),
            PhaseResult::Error,
            Some(ResponseError::new(codes::ENGINE_ERROR, "execution ended without a result")),
        ),
    };

    Response {
        correlation_id: job.correlation_id,
        job_signature: signature.to_string(),
        status,
        result: execution.result.clone(),
        error,
        phase_result,
        from_cache: false,
        execution_time: 0.0,
        tokens_used: None,
        total_cost: None,
        decisions: execution.decisions.clone(),
        tool_calls: execution.tool_calls.clone(),
        started_at,
        completed_at: started_at,
    }
}

async fn run_inner(
    job: &Job,
    signature: &str,
    execution: &ExecutionResult,
    started_at: DateTime<Utc>,
    cache: &dyn ResultCache,
    cache_config: &CacheConfig,
    billing_reporter: &BillingReporter,
    cost_constants: &CostConstants,
    audit: &dyn AuditLogger,
) -> Phase5Output {
    let completed_at = Utc::now();
    let execution_time = (completed_at - started_at).num_milliseconds().max(0) as f64;

    let mut response = build_response(job, signature, execution, started_at);
    response.execution_time = execution_time;
    response.completed_at = completed_at;

    let llm_calls_count = execution.decisions.iter().filter(|d| d.is_llm_call()).count() as u32;
    let cost_breakdown = cost::breakdown(
        execution.tokens_used,
        &execution.tool_calls,
        &execution.decisions,
        cost_constants,
    )
    .unwrap_or_else(|_| cost::breakdown(0, &[], &[], cost_constants).expect("zeroed breakdown cannot fail"));

    let report = billing::generate_report(
        job.correlation_id,
        &job.user_id,
        cost_breakdown.clone(),
        &ExecutionSummary {
            tokens_used: execution.tokens_used,
            tool_calls_count: execution.tool_calls.len() as u32,
            llm_calls_count,
            recursion_depth: execution.depth_reached,
            execution_time,
        },
    );

    serializer::enrich(
        &mut response,
        serializer::Enrichment {
            cost_breakdown: Some(cost_breakdown),
            billing_report: Some(report.clone()),
        },
    );

    if let Err(issues) = serializer::validate_with_errors(&response) {
        log_infallible(
            audit,
            crate::types::AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase5, "PHASE_ERROR")
                .with_detail("issues", serde_json::to_value(&issues).unwrap_or(serde_json::Value::Null)),
        )
        .await;
        response.error = Some(ResponseError::new(
            codes::PHASE5_VALIDATION_FAILED,
            "response failed schema validation",
        ));
        response.phase_result = PhaseResult::Error;
        return Phase5Output { response, cached: false };
    }

    if response.status == "COMPLETE" && !response.from_cache {
        if let Err(e) = cache
            .write(signature, &job.user_id, response.clone(), cache_config.default_ttl_hours)
            .await
        {
            tracing::warn!(correlation_id = %job.correlation_id, error = %e, "cache write failed");
            log_infallible(
                audit,
                crate::types::AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase5, "CACHE_WRITE_FAILED")
                    .with_detail("error", e.to_string()),
            )
            .await;
        }
    }

    log_infallible(
        audit,
        crate::types::AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase5, "FINAL_BILLING_REPORT")
            .with_detail("totalCost", report.total_cost),
    )
    .await;

    billing::persist_best_effort(
        billing_reporter,
        report,
        signature,
        &response.status,
        phase_result_label(response.phase_result),
        response.from_cache,
        response.error.as_ref().map(|e| e.code.clone()),
        response.error.as_ref().map(|e| e.message.clone()),
    );

    log_infallible(
        audit,
        crate::types::AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase5, "PHASE_COMPLETE"),
    )
    .await;

    Phase5Output { response, cached: false }
}

/// Runs the non-cached completion path, catching any panic and
/// annotating the original response with `PHASE5_UNKNOWN_ERROR` rather
/// than letting it propagate.
pub async fn run(
    job: &Job,
    signature: &str,
    execution: &ExecutionResult,
    started_at: DateTime<Utc>,
    cache: &dyn ResultCache,
    cache_config: &CacheConfig,
    billing_reporter: &BillingReporter,
    cost_constants: &CostConstants,
    audit: &dyn AuditLogger,
) -> Phase5Output {
    let fallback = build_response(job, signature, execution, started_at);

    let result = std::panic::AssertUnwindSafe(run_inner(
        job,
        signature,
        execution,
        started_at,
        cache,
        cache_config,
        billing_reporter,
        cost_constants,
        audit,
    ))
    .catch_unwind()
    .await;

    match result {
        Ok(output) => output,
        Err(_) => {
            log_infallible(
                audit,
                crate::types::AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase5, "PHASE_ERROR")
                    .with_detail("message", "unexpected panic in serialization phase"),
            )
            .await;
            let mut response = fallback;
            response.error = Some(ResponseError::new(
                codes::PHASE5_UNKNOWN_ERROR,
                "unexpected error in serialization phase",
            ));
            response.phase_result = PhaseResult::Error;
            Phase5Output { response, cached: false }
        }
    }
}

/// The cached-response path (`executeForCachedResponse`): overwrites
/// `correlationId`, marks `fromCache=true`, and validates. A validation
/// failure propagates so the facade can fall back to `ENGINE_ERROR`.
pub async fn execute_for_cached_response(
    mut cached: Response,
    new_correlation_id: Uuid,
    user_id: &str,
    signature: &str,
    audit: &dyn AuditLogger,
) -> Result<Response, Vec<crate::error::ValidationIssue>> {
    cached.correlation_id = new_correlation_id;
    cached.from_cache = true;
    cached.job_signature = signature.to_string();

    serializer::validate_with_errors(&cached)?;

    log_infallible(
        audit,
        crate::types::AuditEvent::new(new_correlation_id, user_id, Phase::Phase5, "CACHED_RESPONSE_RETURNED")
            .with_detail("signature", signature),
    )
    .await;

    Ok(cached)
}

/// Fabricates a degenerate `ExecutionResult` for a policy-denied job so
/// the facade can still run a billing-only Phase 5 tail, attributing
/// zero tokens and zero tool calls.
pub fn fabricated_execution_for_denial(error: ErrorCode) -> ExecutionResult {
    ExecutionResult {
        status: ExecutionStatus::Error,
        result: None,
        error: Some(error),
        decisions: Vec::new(),
        tool_calls: Vec::new(),
        tokens_used: 0,
        depth_reached: 0,
    }
}
