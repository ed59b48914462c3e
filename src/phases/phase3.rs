//! Phase 3: policy. Retrieval, enforcement, rate increment.

use futures::FutureExt;
use serde_json::json;

use crate::audit_log::{log_infallible, AuditLogger};
use crate::config::ContextConfig;
use crate::error::{codes, ErrorCode};
use crate::policy_enforcer;
use crate::policy_store::{fail_open_retrieve, PolicyStore};
use crate::rate_limiter::RateLimiter;
use crate::types::{AuditEvent, Job, Phase, ViolationType};

use super::Phase3Outcome;

fn violation_code(violation_type: ViolationType) -> &'static str {
    match violation_type {
        ViolationType::RateLimitExceeded => codes::PHASE3_RATE_LIMIT_EXCEEDED,
        ViolationType::ContextWindowExceeded => codes::PHASE3_CONTEXT_EXCEEDED,
        ViolationType::RecursionDepthExceeded => codes::PHASE3_RECURSION_EXCEEDED,
        _ => codes::PHASE3_POLICY_VIOLATION,
    }
}

pub async fn run(
    job: &Job,
    policy_store: &dyn PolicyStore,
    rate_limiter: &dyn RateLimiter,
    context_config: &ContextConfig,
    audit: &dyn AuditLogger,
) -> Phase3Outcome {
    log_infallible(
        audit,
        AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase3, "PHASE_STARTED"),
    )
    .await;

    let mut policy = fail_open_retrieve(policy_store, &job.user_id).await;
    policy.narrow_to_job_caps(job.max_depth, job.context_window_limit);

    log_infallible(
        audit,
        AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase3, "POLICY_RETRIEVED")
            .with_detail("maxRecursionDepth", policy.max_recursion_depth)
            .with_detail("contextWindowLimit", policy.context_window_limit),
    )
    .await;

    match policy_enforcer::enforce(job, &policy, rate_limiter, context_config).await {
        Err(denial) => {
            log_infallible(
                audit,
                AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase3, "POLICY_VIOLATION")
                    .with_detail("reason", denial.reason.clone()),
            )
            .await;

            let error = ErrorCode::new(violation_code(denial.violation_type), denial.reason)
                .with_details(denial.details);
            Phase3Outcome::PolicyViolation { policy, error }
        }
        Ok(()) => {
            rate_limiter.increment(&job.user_id).await;
            log_infallible(
                audit,
                AuditEvent::new(
                    job.correlation_id,
                    &job.user_id,
                    Phase::Phase3,
                    "POLICY_CHECKS_PASSED",
                ),
            )
            .await;
            Phase3Outcome::Continue { policy }
        }
    }
}

/// Catches any panic raised while running the phase, mapping it to
/// `PHASE3_UNKNOWN_ERROR` so a policy-layer bug degrades to a single
/// denied request rather than crashing the engine.
pub async fn run_guarded(
    job: &Job,
    policy_store: &dyn PolicyStore,
    rate_limiter: &dyn RateLimiter,
    context_config: &ContextConfig,
    audit: &dyn AuditLogger,
) -> Phase3Outcome {
    let result = std::panic::AssertUnwindSafe(run(job, policy_store, rate_limiter, context_config, audit))
        .catch_unwind()
        .await;

    match result {
        Ok(outcome) => outcome,
        Err(_) => {
            log_infallible(
                audit,
                AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase3, "PHASE_ERROR")
                    .with_detail("message", "unexpected panic in phase 3"),
            )
            .await;
            Phase3Outcome::Error {
                error: ErrorCode::new(codes::PHASE3_UNKNOWN_ERROR, "unexpected error in policy phase"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit_log::InMemoryAuditLogger;
    use crate::config::AuthConfig;
    use crate::policy_store::InMemoryPolicyStore;
    use crate::rate_limiter::InMemoryRateLimiter;
    use uuid::Uuid;

    fn job(user_id: &str, current_depth: u32) -> Job {
        Job {
            user_id: user_id.to_string(),
            prompt: "hello".to_string(),
            correlation_id: Uuid::new_v4(),
            max_depth: 5,
            current_depth,
            context_window_limit: 8000,
            previous_context: None,
            tool_results: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn allow_increments_rate_counter() {
        let store = InMemoryPolicyStore::new(AuthConfig::default());
        let limiter = InMemoryRateLimiter::new(Default::default());
        let audit = InMemoryAuditLogger::new();
        let job = job("u1", 0);

        let outcome = run(&job, &store, &limiter, &ContextConfig::default(), &audit).await;
        assert!(matches!(outcome, Phase3Outcome::Continue { .. }));

        let check = limiter
            .check("u1", &crate::types::UserTier::Free.default_constraints())
            .await;
        assert_eq!(check.minute_remaining, 9);
    }

    #[tokio::test]
    async fn denial_does_not_increment_rate_counter() {
        let store = InMemoryPolicyStore::new(AuthConfig::default());
        let limiter = InMemoryRateLimiter::new(Default::default());
        let audit = InMemoryAuditLogger::new();
        let job = job("u1", 5);

        let outcome = run(&job, &store, &limiter, &ContextConfig::default(), &audit).await;
        match outcome {
            Phase3Outcome::PolicyViolation { error, .. } => {
                assert_eq!(error.code, codes::PHASE3_RECURSION_EXCEEDED);
                assert_eq!(error.details.unwrap()["currentDepth"], json!(5));
            }
            _ => panic!("expected a policy violation"),
        }

        let check = limiter
            .check("u1", &crate::types::UserTier::Free.default_constraints())
            .await;
        assert_eq!(check.minute_remaining, 10);
    }
}
