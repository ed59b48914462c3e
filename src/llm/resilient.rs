//! Wraps an `LlmClient` with exponential-backoff retry.

use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::config::ResilientClientConfig;

use super::classifier::{classify, Classification, RawModelError};
use super::client::{CallConfig, LlmCallResult, LlmClient};

#[derive(Debug, Clone)]
pub enum ResilientCallError {
    Transient { code: String },
    Terminal { code: String },
}

pub struct ResilientLlmClient<'a> {
    inner: &'a dyn LlmClient,
    config: ResilientClientConfig,
}

impl<'a> ResilientLlmClient<'a> {
    pub fn new(inner: &'a dyn LlmClient, config: ResilientClientConfig) -> Self {
        Self { inner, config }
    }

    /// Retries up to `maxRetries` times after the initial attempt, with
    /// delay `baseDelay * 2^(attempt-1)` unless the classifier supplies
    /// `retryAfterMs`. Terminal errors propagate immediately.
    pub async fn call(
        &self,
        prompt: &str,
        cfg: Option<CallConfig>,
    ) -> Result<LlmCallResult, ResilientCallError> {
        let mut attempt: u32 = 0;

        loop {
            match self.inner.call(prompt, cfg.clone()).await {
                Ok(result) => return Ok(result),
                Err(raw_error) => match classify(&raw_error) {
                    Classification::Terminal { code } => {
                        return Err(ResilientCallError::Terminal { code })
                    }
                    Classification::Transient { code, retry_after_ms } => {
                        attempt += 1;
                        if attempt > self.config.max_retries {
                            return Err(ResilientCallError::Transient { code });
                        }
                        let delay = retry_after_ms
                            .map(Duration::from_millis)
                            .unwrap_or_else(|| self.config.base_delay * 2u32.pow(attempt - 1));
                        warn!(attempt, code = %code, delay_ms = delay.as_millis() as u64, "retrying transient model error");
                        sleep(delay).await;
                    }
                },
            }
        }
    }

    pub fn count_tokens(&self, text: &str) -> u32 {
        self.inner.count_tokens(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::MockLlmClient;

    fn server_error() -> RawModelError {
        RawModelError {
            status: Some(503),
            ..Default::default()
        }
    }

    fn auth_error() -> RawModelError {
        RawModelError {
            status: Some(401),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_retries() {
        let mock = MockLlmClient::with_scripted_failures(
            "final",
            vec![server_error(), server_error()],
        );
        let resilient = ResilientLlmClient::new(&mock, ResilientClientConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        });

        let result = resilient.call("prompt", None).await.unwrap();
        assert_eq!(result.content, "final");
    }

    #[tokio::test]
    async fn terminal_error_propagates_without_retry() {
        let mock = MockLlmClient::with_scripted_failures("unused", vec![auth_error()]);
        let resilient = ResilientLlmClient::new(&mock, ResilientClientConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        });

        let result = resilient.call("prompt", None).await;
        assert!(matches!(
            result,
            Err(ResilientCallError::Terminal { code }) if code == "INVALID_API_KEY"
        ));
    }

    #[tokio::test]
    async fn exhausted_transient_retries_propagate_as_transient() {
        let mock = MockLlmClient::with_scripted_failures(
            "unused",
            vec![server_error(), server_error(), server_error(), server_error()],
        );
        let resilient = ResilientLlmClient::new(&mock, ResilientClientConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        });

        let result = resilient.call("prompt", None).await;
        assert!(matches!(result, Err(ResilientCallError::Transient { .. })));
    }
}
