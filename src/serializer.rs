//! Enriches, validates, and sanitizes the response object.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::billing::BillingReport;
use crate::cost::CostBreakdown;
use crate::error::{ErrorCode, ValidationIssue};
use crate::schema;
use crate::types::{PhaseResult, Response, ResponseError};

/// Shape-faithful pretty-printed JSON, two-space indented.
pub fn serialize(response: &Response) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(response, &mut ser).expect("Response always serializes");
    String::from_utf8(buf).expect("serde_json emits valid utf-8")
}

/// Compact single-line JSON.
pub fn serialize_compact(response: &Response) -> String {
    serde_json::to_string(response).expect("Response always serializes")
}

#[derive(Debug, Clone)]
pub struct DeserializeError {
    pub issues: Vec<ValidationIssue>,
}

pub fn deserialize(raw: &str) -> Result<Response, DeserializeError> {
    let response: Response = serde_json::from_str(raw).map_err(|e| DeserializeError {
        issues: vec![ValidationIssue {
            path: "$".to_string(),
            message: e.to_string(),
            code: "MALFORMED_SHAPE".to_string(),
        }],
    })?;
    if let Err(issues) = schema::validate_response(&response) {
        return Err(DeserializeError { issues });
    }
    Ok(response)
}

pub struct Enrichment {
    pub cost_breakdown: Option<CostBreakdown>,
    pub billing_report: Option<BillingReport>,
}

/// Copies total cost and tokens onto `response`. When both a breakdown
/// and a billing report are given, the billing report wins.
pub fn enrich(response: &mut Response, enrichment: Enrichment) {
    if let Some(report) = enrichment.billing_report {
        response.total_cost = Some(report.total_cost);
        response.tokens_used = Some(report.metrics.tokens_used);
    } else if let Some(breakdown) = enrichment.cost_breakdown {
        response.total_cost = Some(breakdown.total_cost);
    }
}

pub fn validate(response: &Response) -> bool {
    schema::validate_response(response).is_ok()
}

pub fn validate_with_errors(response: &Response) -> Result<(), Vec<ValidationIssue>> {
    schema::validate_response(response)
}

/// Minimal well-formed error response: empty decisions/toolCalls,
/// `phaseResult=ERROR`.
pub fn create_error_response(
    correlation_id: Uuid,
    job_signature: &str,
    error: ErrorCode,
    started_at: chrono::DateTime<chrono::Utc>,
) -> Response {
    let completed_at = chrono::Utc::now();
    Response {
        correlation_id,
        job_signature: job_signature.to_string(),
        status: "ERROR".to_string(),
        result: None,
        error: Some(ResponseError {
            code: error.code,
            message: error.message,
            details: error.details,
        }),
        phase_result: PhaseResult::Error,
        from_cache: false,
        execution_time: (completed_at - started_at).num_milliseconds().max(0) as f64,
        tokens_used: None,
        total_cost: None,
        decisions: Vec::new(),
        tool_calls: Vec::new(),
        started_at,
        completed_at,
    }
}

/// Deep copy via serialize + deserialize: no shared references with
/// the original.
pub fn clone_response(response: &Response) -> Response {
    let compact = serialize_compact(response);
    deserialize(&compact).expect("a response that serialized must deserialize")
}

const SANITIZED_MARKER: &str = "[SANITIZED]";

/// Replaces every tool result with a fixed sentinel and every
/// `toolArguments` map with `{"[SANITIZED]": true}`. Operates on a
/// clone; the original is left untouched.
pub fn sanitize(response: &Response) -> Response {
    let mut copy = clone_response(response);
    for tool_call in &mut copy.tool_calls {
        tool_call.result = json!({ SANITIZED_MARKER: true });
    }
    for decision in &mut copy.decisions {
        if let crate::types::AgentDecision::ToolCall { tool_arguments, .. } = decision {
            *tool_arguments = json!({ SANITIZED_MARKER: true });
        }
    }
    copy
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ResponseSummary {
    pub correlation_id: Uuid,
    pub status: String,
    pub phase_result: PhaseResult,
    pub from_cache: bool,
    pub execution_time: f64,
    pub decision_count: usize,
    pub tool_call_count: usize,
}

pub fn summarize(response: &Response) -> ResponseSummary {
    ResponseSummary {
        correlation_id: response.correlation_id,
        status: response.status.clone(),
        phase_result: response.phase_result,
        from_cache: response.from_cache,
        execution_time: response.execution_time,
        decision_count: response.decisions.len(),
        tool_call_count: response.tool_calls.len(),
    }
}

pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

pub fn to_http_response(response: &Response) -> HttpResponse {
    let status_code = if response.error.is_some() { 500 } else { 200 };
    HttpResponse {
        status_code,
        headers: vec![
            ("Content-Type", "application/json".to_string()),
            ("X-Correlation-Id", response.correlation_id.to_string()),
            ("X-Cache-Hit", response.from_cache.to_string()),
            ("X-Execution-Time", response.execution_time.to_string()),
        ],
        body: serialize_compact(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentDecision, DecisionStatus, ToolResult};
    use chrono::Utc;

    fn sample_response() -> Response {
        Response {
            correlation_id: Uuid::new_v4(),
            job_signature: "a".repeat(64),
            status: "COMPLETE".to_string(),
            result: Some("42".to_string()),
            error: None,
            phase_result: PhaseResult::Continue,
            from_cache: false,
            execution_time: 12.5,
            tokens_used: Some(100),
            total_cost: Some(0.01),
            decisions: vec![AgentDecision::ToolCall {
                tool_name: "google_search".to_string(),
                tool_arguments: json!({"query": "secret"}),
                reasoning: "look it up".to_string(),
                status: DecisionStatus::ToolDispatched,
            }],
            tool_calls: vec![ToolResult {
                tool_name: "google_search".to_string(),
                result: json!({"data": "sensitive"}),
                execution_time: Some(10.0),
                cost: Some(0.005),
                error: None,
            }],
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn deserialize_round_trips_serialize() {
        let response = sample_response();
        let json_str = serialize_compact(&response);
        let back = deserialize(&json_str).unwrap();
        assert_eq!(back.correlation_id, response.correlation_id);
        assert_eq!(back.status, response.status);
    }

    #[test]
    fn sanitize_does_not_mutate_original() {
        let response = sample_response();
        let sanitized = sanitize(&response);

        assert_eq!(response.tool_calls[0].result, json!({"data": "sensitive"}));
        assert_eq!(sanitized.tool_calls[0].result, json!({ "[SANITIZED]": true }));
    }

    #[test]
    fn clone_produces_deep_equal_but_independent_response() {
        let response = sample_response();
        let mut cloned = clone_response(&response);
        cloned.status = "CHANGED".to_string();
        assert_ne!(response.status, cloned.status);
    }

    #[test]
    fn to_http_response_uses_500_only_when_error_present() {
        let mut response = sample_response();
        assert_eq!(to_http_response(&response).status_code, 200);

        response.error = Some(ResponseError::new("X", "boom"));
        assert_eq!(to_http_response(&response).status_code, 500);
    }
}
