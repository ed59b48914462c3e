//! Structural validation for inbound jobs and outbound responses.

use serde_json::Value;

use crate::error::ValidationIssue;
use crate::types::{Job, Response};

pub const MIN_MAX_DEPTH: u32 = 1;
pub const MAX_MAX_DEPTH: u32 = 20;
pub const MIN_CONTEXT_WINDOW_LIMIT: u32 = 100;
pub const MAX_CONTEXT_WINDOW_LIMIT: u32 = 128_000;

/// Parses and bounds-checks a raw payload against the `Job` schema.
/// `deny_unknown_fields` on the struct handles unknown-field rejection;
/// this function layers the numeric-range checks serde cannot express.
pub fn validate_job(raw: &Value) -> Result<Job, Vec<ValidationIssue>> {
    let job: Job = match serde_json::from_value(raw.clone()) {
        Ok(job) => job,
        Err(e) => return Err(vec![parse_error_to_issue(&e)]),
    };

    let mut issues = Vec::new();

    if job.user_id.is_empty() {
        issues.push(ValidationIssue {
            path: "userId".to_string(),
            message: "must not be empty".to_string(),
            code: "REQUIRED".to_string(),
        });
    }
    if job.prompt.is_empty() {
        issues.push(ValidationIssue {
            path: "prompt".to_string(),
            message: "must not be empty".to_string(),
            code: "REQUIRED".to_string(),
        });
    }
    if !(MIN_MAX_DEPTH..=MAX_MAX_DEPTH).contains(&job.max_depth) {
        issues.push(ValidationIssue {
            path: "maxDepth".to_string(),
            message: format!("must be in [{MIN_MAX_DEPTH},{MAX_MAX_DEPTH}]"),
            code: "OUT_OF_BOUNDS".to_string(),
        });
    }
    if !(MIN_CONTEXT_WINDOW_LIMIT..=MAX_CONTEXT_WINDOW_LIMIT).contains(&job.context_window_limit) {
        issues.push(ValidationIssue {
            path: "contextWindowLimit".to_string(),
            message: format!("must be in [{MIN_CONTEXT_WINDOW_LIMIT},{MAX_CONTEXT_WINDOW_LIMIT}]"),
            code: "OUT_OF_BOUNDS".to_string(),
        });
    }

    if issues.is_empty() {
        Ok(job)
    } else {
        Err(issues)
    }
}

/// Validates a fully-built `Response` against its schema shape. Since
/// `Response` is produced internally (never parsed from untrusted
/// input past construction), this is a structural sanity check used by
/// the serializer at the egress boundary.
pub fn validate_response(response: &Response) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if response.status.is_empty() {
        issues.push(ValidationIssue {
            path: "status".to_string(),
            message: "must not be empty".to_string(),
            code: "REQUIRED".to_string(),
        });
    }
    if response.job_signature.len() != 64 {
        issues.push(ValidationIssue {
            path: "jobSignature".to_string(),
            message: "must be a 64-character hex digest".to_string(),
            code: "MALFORMED".to_string(),
        });
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn parse_error_to_issue(err: &serde_json::Error) -> ValidationIssue {
    ValidationIssue {
        path: "$".to_string(),
        message: err.to_string(),
        code: "MALFORMED_SHAPE".to_string(),
    }
}
