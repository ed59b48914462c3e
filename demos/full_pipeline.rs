//! Walks the full pipeline through two scenarios: a tool-assisted
//! completion followed by a cache replay of the same intent, and a
//! recursion-depth policy denial.

use std::sync::{Arc, Mutex};

use agent_exec_engine::config::EngineConfig;
use agent_exec_engine::llm::classifier::RawModelError;
use agent_exec_engine::llm::client::{CallConfig, LlmCallResult, LlmClient};
use agent_exec_engine::Engine;
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

/// Emits a scripted sequence of decisions, one per call, looping the
/// last entry once exhausted. A real provider adapter is supplied by
/// the embedding application; this is only a more elaborate stand-in
/// than `MockLlmClient` for a multi-step walkthrough.
struct ScriptedLlmClient {
    steps: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    fn new(steps: Vec<String>) -> Self {
        Self { steps: Mutex::new(steps) }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn call(&self, _prompt: &str, _cfg: Option<CallConfig>) -> Result<LlmCallResult, RawModelError> {
        let mut steps = self.steps.lock().expect("mutex poisoned");
        let content = if steps.len() > 1 { steps.remove(0) } else { steps[0].clone() };
        Ok(LlmCallResult {
            content: content.clone(),
            tokens_used: self.count_tokens(&content),
            finish_reason: "stop".to_string(),
            model: "mock-model".to_string(),
        })
    }

    fn count_tokens(&self, text: &str) -> u32 {
        (text.chars().count() as u32 + 3) / 4
    }
}

#[tokio::main]
async fn main() {
    agent_exec_engine::init_tracing();

    tool_assisted_completion_then_cache_hit().await;
    recursion_denial().await;
}

async fn tool_assisted_completion_then_cache_hit() {
    println!("=== Scenario 1: tool call, then cache hit on re-submission ===");

    let tool_call = json!({
        "actionType": "TOOL_CALL",
        "toolName": "google_search",
        "toolArguments": { "query": "current weather in Paris" },
        "reasoning": "need fresh data to answer",
        "status": "TOOL_DISPATCHED",
    })
    .to_string();
    let final_answer = json!({
        "actionType": "FINAL_ANSWER",
        "finalAnswer": "It is sunny in Paris today.",
        "reasoning": "search result was sufficient",
        "status": "COMPLETE",
    })
    .to_string();

    let engine = Engine::new(
        EngineConfig::default(),
        Arc::new(ScriptedLlmClient::new(vec![tool_call, final_answer])),
    );

    let stable = json!({
        "userId": "demo-user",
        "prompt": "What is the weather in Paris right now?",
        "maxDepth": 5,
        "contextWindowLimit": 8000,
    });

    let mut first_request = stable.clone();
    first_request["correlationId"] = json!(Uuid::new_v4().to_string());
    let first = engine.execute(first_request).await;
    println!(
        "first call: status={} fromCache={} toolCalls={}",
        first.status,
        first.from_cache,
        first.tool_calls.len()
    );

    let mut second_request = stable;
    second_request["correlationId"] = json!(Uuid::new_v4().to_string());
    let second = engine.execute(second_request).await;
    println!("second call: status={} fromCache={}", second.status, second.from_cache);
    println!();
}

async fn recursion_denial() {
    println!("=== Scenario 2: recursion-depth policy denial ===");

    let decision = json!({
        "actionType": "FINAL_ANSWER",
        "finalAnswer": "unreachable",
        "reasoning": "unreachable",
        "status": "COMPLETE",
    })
    .to_string();
    let engine = Engine::new(EngineConfig::default(), Arc::new(ScriptedLlmClient::new(vec![decision])));

    let job = json!({
        "userId": "demo-user",
        "prompt": "keep going",
        "correlationId": Uuid::new_v4().to_string(),
        "maxDepth": 5,
        "currentDepth": 5,
        "contextWindowLimit": 8000,
    });

    let response = engine.execute(job).await;
    println!(
        "phaseResult={:?} error={:?}",
        response.phase_result,
        response.error.map(|e| e.code)
    );
}
