//! The completion backend seam.
//!
//! The engine treats text generation as an opaque function: prompt text
//! in, completion text out, may fail. Concrete adapters implement
//! [`CompletionBackend`]; [`OllamaBackend`] talks to a local Ollama
//! server.

pub mod ollama;
pub mod trait_def;

pub use ollama::OllamaBackend;
pub use trait_def::CompletionBackend;

/// One completion call, fully specified.
///
/// `temperature` and `max_output_tokens` pass through to the backend
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}
