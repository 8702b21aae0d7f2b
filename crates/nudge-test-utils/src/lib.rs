//! Shared test utilities for nudge integration tests.
//!
//! Provides a scripted completion backend (queued canned replies with
//! optional failure and delay injection) and helpers for building an
//! engine over the in-memory store, so the full engine flow can be
//! exercised without a database or a live generation service.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use nudge_core::backend::{CompletionBackend, CompletionRequest};
use nudge_core::client::GenerationConfig;
use nudge_core::engine::TaskEngine;
use nudge_core::generator::StepGenerator;
use nudge_core::policy::PolicyConfig;
use nudge_core::store::MemoryStore;

/// One canned backend reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this text immediately.
    Text(String),
    /// Fail the call with this message.
    Fail(String),
    /// Sleep for the duration, then return the text. Pair with a short
    /// client timeout to simulate a hung backend.
    Slow(Duration, String),
}

/// A completion backend that replays a scripted queue of replies and
/// records every request it receives.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Reply::Text(text.into()));
    }

    /// Queue a JSON step candidate.
    pub fn push_step(&self, step_text: &str, estimated_seconds: i64) {
        self.push_text(step_json(step_text, estimated_seconds));
    }

    /// Queue a failure.
    pub fn push_fail(&self, message: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Reply::Fail(message.into()));
    }

    /// Queue a delayed reply.
    pub fn push_slow(&self, delay: Duration, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Slow(delay, text.into()));
    }

    /// Number of completion calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => bail!("{message}"),
            Some(Reply::Slow(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => bail!("scripted backend exhausted"),
        }
    }
}

/// Render the step JSON the generation backend is expected to produce.
pub fn step_json(step_text: &str, estimated_seconds: i64) -> String {
    format!("{{\"step\": \"{step_text}\", \"estimated_seconds\": {estimated_seconds}}}")
}

/// Generation config tuned for tests: default policy behavior with a
/// short request timeout so hung-backend tests finish quickly.
pub fn test_generation_config() -> GenerationConfig {
    GenerationConfig {
        request_timeout: Duration::from_millis(100),
        ..GenerationConfig::default()
    }
}

/// Build an engine over a fresh in-memory store and the given backend.
///
/// Returns the engine together with the store so tests can assert on
/// persisted state directly.
pub fn engine_with_backend(backend: Arc<ScriptedBackend>) -> (TaskEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let generator = StepGenerator::new(
        backend,
        PolicyConfig::default(),
        test_generation_config(),
    );
    (TaskEngine::new(store.clone(), generator), store)
}
