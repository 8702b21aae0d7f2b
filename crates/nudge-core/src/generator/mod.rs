//! Step generator: orchestrates prompt builder -> generation client ->
//! policy validator with a bounded validation-retry loop.
//!
//! Validation failures are presumed transient (backend stochasticity) and
//! retried locally with a slightly higher temperature each attempt.
//! Timeouts and backend failures are presumed systemic within a single
//! call and propagate immediately; the client already retried once.

use std::sync::Arc;

use tracing::{debug, warn};

use nudge_db::models::EnergyLevel;

use crate::backend::CompletionBackend;
use crate::client::{GenerationClient, GenerationConfig, MAX_TEMPERATURE};
use crate::error::EngineError;
use crate::policy::{self, PolicyConfig, PolicyViolation, StepContent};
use crate::prompt;

/// Inputs for one step-generation request.
#[derive(Debug, Clone)]
pub struct StepRequest<'a> {
    pub goal: &'a str,
    pub energy_level: EnergyLevel,
    pub simplification_level: i32,
    pub prior_step_text: Option<&'a str>,
}

/// Produces validated step content from goal and context.
#[derive(Clone)]
pub struct StepGenerator {
    client: GenerationClient,
    policy: PolicyConfig,
    config: GenerationConfig,
}

impl StepGenerator {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        policy: PolicyConfig,
        config: GenerationConfig,
    ) -> Self {
        let client = GenerationClient::new(backend, config.request_timeout);
        Self {
            client,
            policy,
            config,
        }
    }

    /// Generate one policy-compliant step.
    ///
    /// Loops up to the configured attempt budget; each rejected candidate
    /// bumps the temperature to escape a repeating bad pattern. Returns
    /// [`EngineError::ExhaustedRetries`] carrying the last rejection once
    /// the budget is spent.
    pub async fn generate_step(
        &self,
        request: &StepRequest<'_>,
    ) -> Result<StepContent, EngineError> {
        let prompts = prompt::build(
            request.goal,
            request.energy_level,
            request.simplification_level,
            request.prior_step_text,
        );

        let attempts = self.config.max_attempts.max(1);
        let mut temperature = self.config.temperature;
        let mut last_violation: Option<PolicyViolation> = None;

        for attempt in 1..=attempts {
            let raw = self
                .client
                .generate(&prompts, temperature, self.config.max_output_tokens)
                .await?;

            let violation = match parse_candidate(&raw) {
                Ok(candidate) => {
                    match policy::validate(&candidate, request.simplification_level, &self.policy)
                    {
                        Ok(content) => {
                            debug!(
                                attempt,
                                estimated_seconds = content.estimated_seconds,
                                "candidate accepted"
                            );
                            return Ok(content);
                        }
                        Err(violation) => violation,
                    }
                }
                Err(violation) => violation,
            };

            warn!(attempt, %violation, "candidate rejected");
            temperature = (temperature + self.config.temperature_step).min(MAX_TEMPERATURE);
            last_violation = Some(violation);
        }

        Err(EngineError::ExhaustedRetries {
            attempts,
            last: last_violation.expect("loop runs at least once"),
        })
    }
}

/// Parse raw completion text as a JSON candidate.
///
/// Markdown code fences are stripped first; anything that still fails to
/// parse counts as a `Malformed` validation failure, not a backend
/// failure.
fn parse_candidate(raw: &str) -> Result<serde_json::Value, PolicyViolation> {
    let stripped = strip_code_fences(raw.trim());
    serde_json::from_str(stripped)
        .map_err(|e| PolicyViolation::Malformed(format!("invalid JSON: {e}")))
}

/// Remove a surrounding ```/```json fence, if present.
fn strip_code_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let value = parse_candidate("{\"step\": \"tap the desk\", \"estimated_seconds\": 2}")
            .expect("should parse");
        assert_eq!(value["step"], "tap the desk");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"step\": \"tap the desk\", \"estimated_seconds\": 2}\n```";
        let value = parse_candidate(raw).expect("should parse");
        assert_eq!(value["estimated_seconds"], 2);
    }

    #[test]
    fn parses_bare_fence() {
        let raw = "```\n{\"step\": \"tap the desk\", \"estimated_seconds\": 2}\n```";
        assert!(parse_candidate(raw).is_ok());
    }

    #[test]
    fn prose_is_malformed() {
        let result = parse_candidate("Sure! Here is your step: tap the desk.");
        assert!(matches!(result, Err(PolicyViolation::Malformed(_))));
    }

    #[test]
    fn strip_is_noop_without_fence() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }
}
