//! Ollama backend adapter.
//!
//! Posts to `<base>/api/generate` with the combined system/user prompt and
//! extracts the `response` field from the JSON envelope.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;

use super::CompletionRequest;
use super::trait_def::CompletionBackend;

/// Backend adapter for a local [Ollama](https://ollama.com) server.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    /// Server base URL, without the `/api/generate` suffix.
    base_url: String,
    /// Model name passed on every request (e.g. "llama3.2").
    model: String,
    http: Client,
}

impl OllamaBackend {
    /// Default server URL for a local Ollama install.
    pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

    /// Create an adapter for the given server and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            http: Client::new(),
        }
    }

    /// Create an adapter pointing at the default local server.
    pub fn local(model: impl Into<String>) -> Self {
        Self::new(Self::DEFAULT_BASE_URL, model)
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "prompt": format!("{}\n\n{}", request.system_prompt, request.user_prompt),
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_output_tokens,
            },
        });

        let url = self.generate_url();
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("failed to reach ollama at {url}"))?
            .error_for_status()
            .context("ollama returned an error status")?;

        let envelope: serde_json::Value = response
            .json()
            .await
            .context("failed to decode ollama response envelope")?;

        envelope
            .get("response")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("ollama envelope missing \"response\" field"))
    }
}
