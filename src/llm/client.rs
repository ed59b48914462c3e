//! The raw LLM client contract and a deterministic mock implementation.

use async_trait::async_trait;

use super::classifier::RawModelError;

#[derive(Debug, Clone, Default)]
pub struct CallConfig {
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct LlmCallResult {
    pub content: String,
    pub tokens_used: u32,
    pub finish_reason: String,
    pub model: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn call(&self, prompt: &str, cfg: Option<CallConfig>) -> Result<LlmCallResult, RawModelError>;
    fn count_tokens(&self, text: &str) -> u32;
}

/// Deterministic test double: always emits a `FINAL_ANSWER` decision
/// unless configured to fail or loop. Mirrors the shape a real provider
/// adapter would return; the concrete provider integration is supplied
/// by the embedding application.
pub struct MockLlmClient {
    pub scripted_failures: std::sync::Mutex<Vec<RawModelError>>,
    pub response: String,
}

impl MockLlmClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            scripted_failures: std::sync::Mutex::new(Vec::new()),
            response: response.into(),
        }
    }

    pub fn with_scripted_failures(response: impl Into<String>, failures: Vec<RawModelError>) -> Self {
        Self {
            scripted_failures: std::sync::Mutex::new(failures),
            response: response.into(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn call(&self, _prompt: &str, _cfg: Option<CallConfig>) -> Result<LlmCallResult, RawModelError> {
        let next_failure = {
            let mut failures = self.scripted_failures.lock().expect("mutex poisoned");
            if failures.is_empty() {
                None
            } else {
                Some(failures.remove(0))
            }
        };

        if let Some(failure) = next_failure {
            return Err(failure);
        }

        Ok(LlmCallResult {
            content: self.response.clone(),
            tokens_used: self.count_tokens(&self.response),
            finish_reason: "stop".to_string(),
            model: "mock-model".to_string(),
        })
    }

    fn count_tokens(&self, text: &str) -> u32 {
        (text.chars().count() as u32 + 3) / 4
    }
}
