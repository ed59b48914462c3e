//! The facade tying all five phases together.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audit_log::{log_infallible, AuditLogger, InMemoryAuditLogger};
use crate::billing::BillingReporter;
use crate::cache::{InMemoryResultCache, ResultCache};
use crate::config::EngineConfig;
use crate::error::{codes, ErrorCode};
use crate::llm::{LlmClient, ResilientLlmClient};
use crate::phases::{phase1, phase3, phase4, phase5, Phase1Outcome, Phase3Outcome};
use crate::policy_store::{InMemoryPolicyStore, PolicyStore};
use crate::rate_limiter::{InMemoryRateLimiter, RateLimiter};
use crate::serializer;
use crate::tools::{registry_with_mock_tools, ToolDispatcher, ToolRegistry};
use crate::types::{AuditEvent, Phase, PhaseResult, Response, ResponseError};

/// Everything the facade needs to drive a request. Constructed once at
/// startup and shared across concurrent requests; each dependency is a
/// trait object so tests can substitute fakes.
pub struct Engine {
    config: EngineConfig,
    cache: Arc<dyn ResultCache>,
    audit: Arc<dyn AuditLogger>,
    policy_store: Arc<dyn PolicyStore>,
    rate_limiter: Arc<dyn RateLimiter>,
    llm_client: Arc<dyn LlmClient>,
    tool_registry: ToolRegistry,
    billing_reporter: BillingReporter,
}

impl Engine {
    pub fn new(config: EngineConfig, llm_client: Arc<dyn LlmClient>) -> Self {
        let audit = InMemoryAuditLogger::new();
        let enterprise_retention = Duration::from_secs(
            u64::from(config.audit.retention_days(crate::types::UserTier::Enterprise)) * 86_400,
        );
        audit.start_retention_sweeper(config.rate_limiter.cleanup_interval, enterprise_retention);

        let rate_limiter = InMemoryRateLimiter::new(config.rate_limiter.clone());
        rate_limiter.start_sweeper();

        Self {
            cache: Arc::new(InMemoryResultCache::new(config.cache.clone())),
            audit: Arc::new(audit),
            policy_store: Arc::new(InMemoryPolicyStore::new(config.auth)),
            rate_limiter: Arc::new(rate_limiter),
            llm_client,
            tool_registry: registry_with_mock_tools(),
            billing_reporter: BillingReporter::new(),
            config,
        }
    }

    /// Stops the background sweepers owned by the default in-memory
    /// collaborators. A no-op for any dependency substituted via
    /// `from_parts` that doesn't run one.
    pub fn shutdown(&self) {
        self.audit.shutdown();
        self.rate_limiter.shutdown();
    }

    /// Builds an `Engine` from already-constructed dependencies, the
    /// seam integration tests and the HTTP binding use to plug in
    /// fakes or long-lived singletons.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        config: EngineConfig,
        cache: Arc<dyn ResultCache>,
        audit: Arc<dyn AuditLogger>,
        policy_store: Arc<dyn PolicyStore>,
        rate_limiter: Arc<dyn RateLimiter>,
        llm_client: Arc<dyn LlmClient>,
        tool_registry: ToolRegistry,
        billing_reporter: BillingReporter,
    ) -> Self {
        Self {
            config,
            cache,
            audit,
            policy_store,
            rate_limiter,
            llm_client,
            tool_registry,
            billing_reporter,
        }
    }

    pub fn audit(&self) -> &dyn AuditLogger {
        self.audit.as_ref()
    }

    pub fn billing_reporter(&self) -> &BillingReporter {
        &self.billing_reporter
    }

    pub fn cache(&self) -> &dyn ResultCache {
        self.cache.as_ref()
    }

    /// Runs `raw_payload` through the full pipeline and returns a
    /// `Response`. Never panics out to the caller: any unexpected
    /// failure is mapped to an `ENGINE_ERROR` response.
    pub async fn execute(&self, raw_payload: Value) -> Response {
        self.execute_with_cancellation(raw_payload, &CancellationToken::new()).await
    }

    pub async fn execute_with_cancellation(&self, raw_payload: Value, cancel: &CancellationToken) -> Response {
        let started_at = Utc::now();

        let phase1_outcome = phase1::run(&raw_payload, self.cache.as_ref(), self.audit.as_ref()).await;

        let (job, signature) = match phase1_outcome {
            Phase1Outcome::Error { error } => {
                return serializer::create_error_response(Uuid::nil(), &"0".repeat(64), error, started_at);
            }
            Phase1Outcome::CacheHit {
                job,
                signature,
                cached_response,
            } => {
                return match phase5::execute_for_cached_response(
                    cached_response,
                    job.correlation_id,
                    &job.user_id,
                    &signature,
                    self.audit.as_ref(),
                )
                .await
                {
                    Ok(response) => response,
                    Err(_) => serializer::create_error_response(
                        job.correlation_id,
                        &signature,
                        ErrorCode::new(codes::ENGINE_ERROR, "cached response failed validation"),
                        started_at,
                    ),
                };
            }
            Phase1Outcome::Continue { job, signature } => (job, signature),
        };

        let policy = match phase3::run_guarded(
            &job,
            self.policy_store.as_ref(),
            self.rate_limiter.as_ref(),
            &self.config.context,
            self.audit.as_ref(),
        )
        .await
        {
            Phase3Outcome::Continue { policy } => policy,
            Phase3Outcome::PolicyViolation { error, .. } | Phase3Outcome::Error { error } => {
                let response = policy_violation_response(&job, &signature, error.clone(), started_at);

                let fabricated = phase5::fabricated_execution_for_denial(error);
                phase5::run(
                    &job,
                    &signature,
                    &fabricated,
                    started_at,
                    self.cache.as_ref(),
                    &self.config.cache,
                    &self.billing_reporter,
                    &self.config.cost,
                    self.audit.as_ref(),
                )
                .await;

                return response;
            }
        };

        let resilient_llm = ResilientLlmClient::new(self.llm_client.as_ref(), self.config.resilient_client);
        let dispatcher = ToolDispatcher::new(&self.tool_registry, self.audit.as_ref());

        let execution = phase4::run(
            &job,
            &policy,
            &resilient_llm,
            &dispatcher,
            &self.config.context,
            self.audit.as_ref(),
            cancel,
        )
        .await;

        let output = phase5::run(
            &job,
            &signature,
            &execution,
            started_at,
            self.cache.as_ref(),
            &self.config.cache,
            &self.billing_reporter,
            &self.config.cost,
            self.audit.as_ref(),
        )
        .await;

        output.response
    }
}

fn policy_violation_response(
    job: &crate::types::Job,
    signature: &str,
    error: ErrorCode,
    started_at: chrono::DateTime<Utc>,
) -> Response {
    let completed_at = Utc::now();
    Response {
        correlation_id: job.correlation_id,
        job_signature: signature.to_string(),
        status: "POLICY_VIOLATION".to_string(),
        result: None,
        error: Some(ResponseError {
            code: error.code,
            message: error.message,
            details: error.details,
        }),
        phase_result: PhaseResult::PolicyViolation,
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

/// Logs the top-level entry point of a request; kept separate so
/// HTTP/CLI bindings can emit it without duplicating `execute`'s body.
pub async fn audit_request_received(engine: &Engine, correlation_id: Uuid, user_id: &str) {
    log_infallible(
        engine.audit(),
        AuditEvent::new(correlation_id, user_id, Phase::Phase1, "REQUEST_RECEIVED"),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::MockLlmClient;
    use serde_json::json;
    use uuid::Uuid;

    fn payload(prompt: &str) -> Value {
        json!({
            "userId": "u1",
            "prompt": prompt,
            "correlationId": Uuid::new_v4().to_string(),
            "maxDepth": 3,
            "currentDepth": 0,
            "contextWindowLimit": 8000,
        })
    }

    fn final_answer_llm(answer: &str) -> Arc<dyn LlmClient> {
        let decision = json!({
            "actionType": "FINAL_ANSWER",
            "finalAnswer": answer,
            "reasoning": "done",
            "status": "COMPLETE",
        })
        .to_string();
        Arc::new(MockLlmClient::new(decision))
    }

    #[tokio::test]
    async fn invalid_payload_yields_phase1_validation_error() {
        let engine = Engine::new(EngineConfig::default(), final_answer_llm("42"));
        let mut invalid = payload("hi");
        invalid.as_object_mut().unwrap().remove("userId");

        let response = engine.execute(invalid).await;
        assert_eq!(response.error.unwrap().code, codes::PHASE1_VALIDATION_FAILED);
    }

    #[tokio::test]
    async fn completed_job_is_cached_and_replayed_on_second_call() {
        let engine = Engine::new(EngineConfig::default(), final_answer_llm("42"));
        let mut request = payload("what is the answer");
        let correlation_id = request["correlationId"].as_str().unwrap().to_string();
        request["correlationId"] = json!(correlation_id);

        let first = engine.execute(request.clone()).await;
        assert_eq!(first.status, "COMPLETE");
        assert!(!first.from_cache);

        let mut second_request = request.clone();
        second_request["correlationId"] = json!(Uuid::new_v4().to_string());
        let second = engine.execute(second_request).await;
        assert!(second.from_cache);
        assert_eq!(second.result, first.result);
    }

    #[tokio::test]
    async fn recursion_denial_still_runs_billing_tail() {
        let engine = Engine::new(EngineConfig::default(), final_answer_llm("42"));
        let mut request = payload("hi");
        request["currentDepth"] = json!(3);
        request["maxDepth"] = json!(3);

        let response = engine.execute(request).await;
        assert_eq!(response.status, "POLICY_VIOLATION");
        assert_eq!(response.error.unwrap().code, codes::PHASE3_RECURSION_EXCEEDED);
    }
}
