//! Generation client: wraps the completion backend with a wall-clock
//! timeout and a single transparent retry.
//!
//! Backend failures (transport errors, malformed envelopes) are retried
//! exactly once here; timeouts are never retried. The step generator's
//! validation-retry loop sits above this and never re-enters on either
//! error, so latency cannot compound across the two layers.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::error::EngineError;
use crate::prompt::PromptPair;

/// Ceiling for the escalating retry temperature.
pub const MAX_TEMPERATURE: f32 = 1.2;

/// Tuning knobs for generation. These are configuration, not hidden
/// behavior: defaults favor determinism (moderate temperature) and brevity
/// (tight token ceiling).
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Sampling temperature for the first attempt.
    pub temperature: f32,
    /// Added to the temperature after each rejected candidate, up to
    /// [`MAX_TEMPERATURE`].
    pub temperature_step: f32,
    /// Token ceiling passed through to the backend.
    pub max_output_tokens: u32,
    /// Wall-clock timeout per backend call.
    pub request_timeout: Duration,
    /// Validation-retry budget in the step generator.
    pub max_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            temperature_step: 0.1,
            max_output_tokens: 150,
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Wraps an opaque completion backend with timeout and retry.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Run one completion, returning the raw text.
    ///
    /// On timeout expiry returns [`EngineError::Timeout`] with no side
    /// effects. On a backend failure the same call is retried once before
    /// [`EngineError::BackendFailure`] surfaces.
    pub async fn generate(
        &self,
        prompts: &PromptPair,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, EngineError> {
        let request = CompletionRequest {
            system_prompt: prompts.system.to_owned(),
            user_prompt: prompts.user.clone(),
            temperature,
            max_output_tokens,
        };

        match self.call_once(&request).await {
            Ok(text) => Ok(text),
            Err(EngineError::BackendFailure(first)) => {
                warn!(
                    backend = self.backend.name(),
                    error = %first,
                    "backend failure, retrying once"
                );
                match self.call_once(&request).await {
                    Ok(text) => Ok(text),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn call_once(&self, request: &CompletionRequest) -> Result<String, EngineError> {
        match tokio::time::timeout(self.timeout, self.backend.complete(request)).await {
            Err(_elapsed) => Err(EngineError::Timeout),
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(EngineError::BackendFailure(format!("{err:#}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::prompt::PromptPair;

    /// Fails the first `failures` calls, then returns a constant.
    struct FlakyBackend {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyBackend {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                bail!("malformed envelope");
            }
            Ok("ok".to_string())
        }
    }

    /// Sleeps well past any test timeout before answering.
    struct SlowBackend;

    #[async_trait]
    impl CompletionBackend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn prompts() -> PromptPair {
        PromptPair {
            system: "system",
            user: "user".to_string(),
        }
    }

    #[tokio::test]
    async fn success_passes_text_through() {
        let backend = Arc::new(FlakyBackend::new(0));
        let client = GenerationClient::new(backend.clone(), Duration::from_secs(1));

        let text = client.generate(&prompts(), 0.7, 150).await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn single_failure_is_retried_transparently() {
        let backend = Arc::new(FlakyBackend::new(1));
        let client = GenerationClient::new(backend.clone(), Duration::from_secs(1));

        let text = client.generate(&prompts(), 0.7, 150).await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn second_failure_surfaces_backend_failure() {
        let backend = Arc::new(FlakyBackend::new(2));
        let client = GenerationClient::new(backend.clone(), Duration::from_secs(1));

        let result = client.generate(&prompts(), 0.7, 150).await;
        assert!(matches!(result, Err(EngineError::BackendFailure(_))));
        assert_eq!(backend.call_count(), 2, "exactly one retry");
    }

    #[tokio::test]
    async fn timeout_surfaces_without_retry() {
        let backend = Arc::new(SlowBackend);
        let client = GenerationClient::new(backend, Duration::from_millis(20));

        let result = client.generate(&prompts(), 0.7, 150).await;
        assert!(matches!(result, Err(EngineError::Timeout)));
    }
}
