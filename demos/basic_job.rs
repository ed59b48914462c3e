//! Runs a single job through the engine end to end and prints the
//! response. `MockLlmClient` stands in for a real provider adapter,
//! which is supplied by the embedding application.

use std::sync::Arc;

use agent_exec_engine::config::EngineConfig;
use agent_exec_engine::llm::client::MockLlmClient;
use agent_exec_engine::Engine;
use serde_json::json;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    agent_exec_engine::init_tracing();

    let decision = json!({
        "actionType": "FINAL_ANSWER",
        "finalAnswer": "Paris is the capital of France.",
        "reasoning": "General knowledge, no tools needed.",
        "status": "COMPLETE",
    })
    .to_string();

    let engine = Engine::new(EngineConfig::default(), Arc::new(MockLlmClient::new(decision)));

    let job = json!({
        "userId": "demo-user",
        "prompt": "What is the capital of France?",
        "correlationId": Uuid::new_v4().to_string(),
        "maxDepth": 5,
        "contextWindowLimit": 8000,
    });

    let response = engine.execute(job).await;
    println!("{}", agent_exec_engine::serializer::serialize(&response));
}
