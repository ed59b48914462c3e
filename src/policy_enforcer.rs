//! Composes rate limiting, context estimation, and tier policy into a
//! single allow/deny check.

use serde_json::json;
use serde_json::Value;

use crate::config::ContextConfig;
use crate::context;
use crate::rate_limiter::{fail_open_check, RateLimiter};
use crate::types::{Job, PolicyConstraints, ViolationType};

#[derive(Debug, Clone)]
pub struct PolicyDenial {
    pub reason: String,
    pub violation_type: ViolationType,
    pub details: Value,
}

pub type PolicyCheckResult = Result<(), PolicyDenial>;

/// Runs the five ordered checks (recursion depth, context window, rate
/// limit, tool-call count, tool allowlist), short-circuiting on the
/// first denial. Does not mutate rate-limit state; that happens
/// separately via `RateLimiter::increment` on the allow path (Phase 3).
pub async fn enforce(
    job: &Job,
    policy: &PolicyConstraints,
    rate_limiter: &dyn RateLimiter,
    context_config: &ContextConfig,
) -> PolicyCheckResult {
    if job.current_depth >= policy.max_recursion_depth {
        return Err(PolicyDenial {
            reason: format!(
                "recursion depth {} reached max {}",
                job.current_depth, policy.max_recursion_depth
            ),
            violation_type: ViolationType::RecursionDepthExceeded,
            details: json!({
                "currentDepth": job.current_depth,
                "maxDepth": policy.max_recursion_depth,
            }),
        });
    }

    let combined = job.combined_text();
    let estimated = context::estimate_tokens(&combined, context_config);
    let effective_limit = context::effective_limit(policy.context_window_limit, context_config);
    if estimated > effective_limit {
        return Err(PolicyDenial {
            reason: format!("estimated {estimated} tokens exceeds limit {effective_limit}"),
            violation_type: ViolationType::ContextWindowExceeded,
            details: json!({
                "estimated": estimated,
                "limit": policy.context_window_limit,
            }),
        });
    }

    let rate_check = fail_open_check(rate_limiter, &job.user_id, policy).await;
    if !rate_check.allowed {
        return Err(PolicyDenial {
            reason: rate_check
                .reason
                .unwrap_or_else(|| "rate limit exceeded".to_string()),
            violation_type: ViolationType::RateLimitExceeded,
            details: json!({
                "minuteRemaining": rate_check.minute_remaining,
                "hourRemaining": rate_check.hour_remaining,
            }),
        });
    }

    let tool_calls_so_far = job.tool_results.as_ref().map(Vec::len).unwrap_or(0) as u32;
    if tool_calls_so_far >= policy.max_tool_calls {
        return Err(PolicyDenial {
            reason: format!(
                "tool call count {tool_calls_so_far} reached max {}",
                policy.max_tool_calls
            ),
            violation_type: ViolationType::ToolCallsExceeded,
            details: json!({
                "used": tool_calls_so_far,
                "max": policy.max_tool_calls,
            }),
        });
    }

    if !policy.allowed_tools.is_empty() {
        if let Some(tool_results) = &job.tool_results {
            for result in tool_results {
                if !policy.allowed_tools.contains(&result.tool_name) {
                    return Err(PolicyDenial {
                        reason: format!("tool {} is not in the allowlist", result.tool_name),
                        violation_type: ViolationType::ToolNotAllowed,
                        details: json!({ "toolName": result.tool_name }),
                    });
                }
            }
        }
    }

    Ok(())
}
