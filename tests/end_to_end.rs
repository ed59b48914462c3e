//! Exercises the full five-phase pipeline through `Engine::execute`,
//! covering cache reuse, policy denials, and provider failures end to
//! end.

use std::sync::Arc;

use agent_exec_engine::config::EngineConfig;
use agent_exec_engine::error::codes;
use agent_exec_engine::llm::client::MockLlmClient;
use agent_exec_engine::types::UserTier;
use agent_exec_engine::Engine;
use serde_json::json;
use uuid::Uuid;

fn final_answer_engine(answer: &str) -> Engine {
    let decision = json!({
        "actionType": "FINAL_ANSWER",
        "finalAnswer": answer,
        "reasoning": "done",
        "status": "COMPLETE",
    })
    .to_string();
    Engine::new(EngineConfig::default(), Arc::new(MockLlmClient::new(decision)))
}

fn stable_payload(user_id: &str, prompt: &str) -> serde_json::Value {
    json!({
        "userId": user_id,
        "prompt": prompt,
        "maxDepth": 5,
        "contextWindowLimit": 8000,
    })
}

#[tokio::test]
async fn cache_miss_then_completion_then_subsequent_hit() {
    let engine = final_answer_engine("hello back");

    let mut first = stable_payload("u-cache-1", "hello");
    first["correlationId"] = json!(Uuid::new_v4().to_string());
    let response_a = engine.execute(first).await;

    assert_eq!(response_a.phase_result, agent_exec_engine::types::PhaseResult::Continue);
    assert_eq!(response_a.status, "COMPLETE");
    assert!(!response_a.from_cache);

    let second_correlation = Uuid::new_v4();
    let mut second = stable_payload("u-cache-1", "hello");
    second["correlationId"] = json!(second_correlation.to_string());
    let response_b = engine.execute(second).await;

    assert!(response_b.from_cache);
    assert_eq!(response_b.correlation_id, second_correlation);
    assert_eq!(response_b.result, response_a.result);
}

#[tokio::test]
async fn policy_denial_by_recursion_depth() {
    let engine = final_answer_engine("unreachable");

    let mut payload = stable_payload("u-recursion", "hi");
    payload["correlationId"] = json!(Uuid::new_v4().to_string());
    payload["maxDepth"] = json!(5);
    payload["currentDepth"] = json!(5);

    let response = engine.execute(payload).await;

    assert_eq!(response.phase_result, agent_exec_engine::types::PhaseResult::PolicyViolation);
    let error = response.error.unwrap();
    assert_eq!(error.code, codes::PHASE3_RECURSION_EXCEEDED);
    let details = error.details.unwrap();
    assert_eq!(details["currentDepth"], json!(5));
    assert_eq!(details["maxDepth"], json!(5));
}

#[tokio::test]
async fn policy_denial_by_context_window() {
    let engine = final_answer_engine("unreachable");

    let mut payload = stable_payload("u-context", &"a".repeat(40_000));
    payload["correlationId"] = json!(Uuid::new_v4().to_string());
    payload["contextWindowLimit"] = json!(1000);

    let response = engine.execute(payload).await;

    let error = response.error.unwrap();
    assert_eq!(error.code, codes::PHASE3_CONTEXT_EXCEEDED);
    let details = error.details.unwrap();
    assert_eq!(details["estimated"], json!(10000));
    assert_eq!(details["limit"], json!(1000));
}

#[tokio::test]
async fn rate_limit_breach_denies_request_past_the_minute_cap() {
    // The default policy store grants every user the free tier's
    // per-minute cap of 10; a fresh user hammered past that cap should
    // see the 11th request denied by policy.
    let engine = final_answer_engine("ok");
    let user_id = format!("u-rate-{}", Uuid::new_v4());

    let mut last_response = None;
    for _ in 0..11 {
        let mut payload = stable_payload(&user_id, "go");
        payload["correlationId"] = json!(Uuid::new_v4().to_string());
        last_response = Some(engine.execute(payload).await);
    }

    let response = last_response.unwrap();
    assert_eq!(response.phase_result, agent_exec_engine::types::PhaseResult::PolicyViolation);
    let error = response.error.unwrap();
    assert_eq!(error.code, codes::PHASE3_RATE_LIMIT_EXCEEDED);
    assert!(error.message.contains("10 requests per minute"));
}

#[tokio::test]
async fn terminal_model_error_still_runs_billing_tail() {
    use agent_exec_engine::llm::classifier::RawModelError;

    let failure = RawModelError {
        status: Some(401),
        code: Some("invalid_api_key".to_string()),
        message: "unauthorized".to_string(),
        retry_after_secs: None,
    };
    let llm = MockLlmClient::with_scripted_failures("unused".to_string(), vec![failure]);
    let engine = Engine::new(EngineConfig::default(), Arc::new(llm));

    let mut payload = stable_payload("u-terminal", "hi");
    payload["correlationId"] = json!(Uuid::new_v4().to_string());
    let correlation_id = payload["correlationId"].as_str().unwrap().to_string();

    let response = engine.execute(payload).await;

    assert_eq!(response.status, "ERROR");
    assert_eq!(response.error.unwrap().code, codes::INVALID_API_KEY);
    assert!(response.total_cost.unwrap() >= 0.0);

    let billed = engine
        .billing_reporter()
        .get_report(Uuid::parse_str(&correlation_id).unwrap(), "u-terminal");
    assert!(billed.is_some());
}

#[tokio::test]
async fn free_tier_default_policy_matches_tier_table() {
    let defaults = UserTier::Free.default_constraints();
    assert_eq!(defaults.max_recursion_depth, 5);
    assert_eq!(defaults.context_window_limit, 8000);
    assert_eq!(defaults.max_tool_calls, 10);
    assert_eq!(defaults.rate_limit.per_minute, 10);
    assert_eq!(defaults.rate_limit.per_hour, 100);
}
