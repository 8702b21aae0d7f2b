//! The nudge engine: turns an overwhelming goal into a single,
//! immediately-executable micro-action and drives the per-task step
//! sequence.
//!
//! Component layering, leaves first:
//!
//! - [`policy`] validates generated candidates against hard constraints.
//! - [`prompt`] composes system/user prompts from goal and context.
//! - [`client`] wraps the completion backend with timeout and retry.
//! - [`generator`] orchestrates prompt -> completion -> validation with a
//!   bounded retry budget.
//! - [`engine`] owns the task lifecycle, step ordering, simplification
//!   depth, and pause/resume semantics.
//!
//! Persistence and text generation are abstract seams ([`store::Store`],
//! [`backend::CompletionBackend`]); concrete adapters are provided for
//! PostgreSQL and Ollama.

pub mod backend;
pub mod client;
pub mod engine;
pub mod error;
pub mod generator;
pub mod insights;
pub mod policy;
pub mod prompt;
pub mod sanitize;
pub mod store;

pub use engine::{AdvanceResult, ResumeView, StepView, TaskEngine};
pub use error::EngineError;
pub use policy::{PolicyConfig, PolicyViolation, StepContent};
