//! The `CompletionBackend` trait -- the adapter interface for text
//! generation services.
//!
//! Each concrete backend (Ollama, a hosted API, a test double) implements
//! this trait. The trait is intentionally object-safe so it can be stored
//! as `Arc<dyn CompletionBackend>` inside the generation client.

use anyhow::Result;
use async_trait::async_trait;

use super::CompletionRequest;

/// Adapter interface for text-generation backends.
///
/// Implementors perform exactly one completion per call and return the
/// raw completion text. They do not retry, time out, or parse; those
/// concerns belong to the generation client and step generator above.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Human-readable name for this backend (e.g. "ollama").
    fn name(&self) -> &str;

    /// Run one completion and return the raw text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

// Compile-time assertion: CompletionBackend must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn CompletionBackend) {}
};
