//! Policy validator: hard constraints on generated step candidates.
//!
//! Checks run in order and fail fast: structural shape, time bound, verb
//! concreteness, singularity. A candidate that passes is returned
//! unchanged; rejection is the validator's only effect.

use serde::{Deserialize, Serialize};

/// Reasons a candidate step is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    /// Not a JSON object with a non-empty `step` string and a positive
    /// integer `estimated_seconds`.
    #[error("malformed candidate: {0}")]
    Malformed(String),

    /// The estimated duration exceeds the ceiling for this
    /// simplification level.
    #[error("estimated {estimated_seconds}s exceeds the {max_seconds}s ceiling")]
    TooLong {
        estimated_seconds: i64,
        max_seconds: i64,
    },

    /// The action text leads with a denylisted abstract verb.
    #[error("step leads with abstract verb {0:?}")]
    AbstractVerb(String),

    /// The action text chains more than one action.
    #[error("step chains multiple actions: {0:?}")]
    MultiStep(String),
}

/// Validated step content, exactly as the backend produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContent {
    pub step_text: String,
    pub estimated_seconds: i32,
}

/// Configuration for the policy validator.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Ceiling for steps at simplification level 0.
    pub max_step_seconds: i64,
    /// Tighter ceiling once a step has been simplified at least once.
    pub simplified_max_seconds: i64,
    /// Abstract verbs (and phrases) a step may not lead with.
    pub abstract_verbs: Vec<String>,
    /// Recognized action verbs, used to spot a second imperative clause.
    pub action_verbs: Vec<String>,
    /// Coordinating conjunctions that can join two verb phrases.
    pub conjunctions: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let to_strings = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            max_step_seconds: 10,
            simplified_max_seconds: 5,
            abstract_verbs: to_strings(&[
                "organize",
                "plan",
                "prepare",
                "think",
                "decide",
                "consider",
                "figure out",
                "work on",
                "deal with",
            ]),
            action_verbs: to_strings(&[
                "pick", "grab", "open", "close", "walk", "tap", "touch", "click", "press",
                "pull", "push", "take", "put", "place", "move", "stand", "sit", "turn",
                "look", "find",
            ]),
            conjunctions: to_strings(&["and", "then", "or"]),
        }
    }
}

/// Validate a candidate against the hard constraints.
///
/// `candidate` is the parsed JSON the backend returned. On success the
/// step content is returned verbatim; text and time are never rewritten.
pub fn validate(
    candidate: &serde_json::Value,
    simplification_level: i32,
    config: &PolicyConfig,
) -> Result<StepContent, PolicyViolation> {
    // 1. Structural completeness.
    let object = candidate
        .as_object()
        .ok_or_else(|| PolicyViolation::Malformed("candidate is not a JSON object".to_string()))?;

    let step_text = object
        .get("step")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            PolicyViolation::Malformed("missing or empty \"step\" field".to_string())
        })?;

    let estimated_seconds = object
        .get("estimated_seconds")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            PolicyViolation::Malformed("missing integer \"estimated_seconds\" field".to_string())
        })?;

    if estimated_seconds <= 0 {
        return Err(PolicyViolation::Malformed(
            "estimated_seconds must be positive".to_string(),
        ));
    }

    // 2. Time bound. Simplified steps get the tighter ceiling.
    let max_seconds = if simplification_level >= 1 {
        config.simplified_max_seconds
    } else {
        config.max_step_seconds
    };
    if estimated_seconds > max_seconds {
        return Err(PolicyViolation::TooLong {
            estimated_seconds,
            max_seconds,
        });
    }

    let lowered = step_text.to_lowercase();

    // 3. Verb concreteness: the leading verb (or phrase) must be concrete.
    for verb in &config.abstract_verbs {
        if leads_with(&lowered, verb) {
            return Err(PolicyViolation::AbstractVerb(verb.clone()));
        }
    }

    // 4. Singularity: no conjunction followed by a second action verb.
    if let Some(clause) = second_action_clause(&lowered, config) {
        return Err(PolicyViolation::MultiStep(clause));
    }

    Ok(StepContent {
        step_text: step_text.to_string(),
        estimated_seconds: estimated_seconds as i32,
    })
}

/// True if `text` starts with `phrase` at a word boundary.
fn leads_with(text: &str, phrase: &str) -> bool {
    match text.strip_prefix(phrase) {
        Some(rest) => rest.is_empty() || rest.starts_with([' ', ',', '.', '!']),
        None => false,
    }
}

/// Find a coordinating conjunction followed by a recognized action verb,
/// i.e. a second imperative clause. Returns the offending tail.
fn second_action_clause(text: &str, config: &PolicyConfig) -> Option<String> {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();

    for pair in words.windows(2) {
        let [first, second] = pair else { continue };
        if config.conjunctions.iter().any(|c| c == first)
            && config.action_verbs.iter().any(|v| v == second)
        {
            return Some(format!("{first} {second} ..."));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(step: &str, seconds: i64) -> serde_json::Value {
        serde_json::json!({"step": step, "estimated_seconds": seconds})
    }

    fn config() -> PolicyConfig {
        PolicyConfig::default()
    }

    // -- structural ---------------------------------------------------------

    #[test]
    fn accepts_valid_candidate() {
        let result = validate(&candidate("pick up one item from the floor", 7), 0, &config());
        let content = result.expect("should validate");
        assert_eq!(content.step_text, "pick up one item from the floor");
        assert_eq!(content.estimated_seconds, 7);
    }

    #[test]
    fn rejects_non_object() {
        let result = validate(&serde_json::json!("just a string"), 0, &config());
        assert!(matches!(result, Err(PolicyViolation::Malformed(_))));
    }

    #[test]
    fn rejects_missing_step_field() {
        let result = validate(&serde_json::json!({"estimated_seconds": 5}), 0, &config());
        assert!(matches!(result, Err(PolicyViolation::Malformed(_))));
    }

    #[test]
    fn rejects_empty_step_text() {
        let result = validate(&candidate("   ", 5), 0, &config());
        assert!(matches!(result, Err(PolicyViolation::Malformed(_))));
    }

    #[test]
    fn rejects_missing_seconds() {
        let result = validate(&serde_json::json!({"step": "tap the lamp"}), 0, &config());
        assert!(matches!(result, Err(PolicyViolation::Malformed(_))));
    }

    #[test]
    fn rejects_non_integer_seconds() {
        let result = validate(
            &serde_json::json!({"step": "tap the lamp", "estimated_seconds": "five"}),
            0,
            &config(),
        );
        assert!(matches!(result, Err(PolicyViolation::Malformed(_))));
    }

    #[test]
    fn rejects_zero_and_negative_seconds() {
        for seconds in [0, -3] {
            let result = validate(&candidate("tap the lamp", seconds), 0, &config());
            assert!(
                matches!(result, Err(PolicyViolation::Malformed(_))),
                "seconds={seconds}"
            );
        }
    }

    #[test]
    fn structural_check_runs_before_time_bound() {
        // A broken candidate with an absurd duration must report the
        // structural problem, not the time bound.
        let result = validate(&serde_json::json!({"estimated_seconds": 99}), 0, &config());
        assert!(matches!(result, Err(PolicyViolation::Malformed(_))));
    }

    // -- time bound ---------------------------------------------------------

    #[test]
    fn level_zero_allows_up_to_ten_seconds() {
        assert!(validate(&candidate("tap the lamp", 10), 0, &config()).is_ok());
        let result = validate(&candidate("tap the lamp", 11), 0, &config());
        assert!(matches!(
            result,
            Err(PolicyViolation::TooLong {
                estimated_seconds: 11,
                max_seconds: 10
            })
        ));
    }

    #[test]
    fn simplified_levels_allow_up_to_five_seconds() {
        for level in [1, 2, 7] {
            assert!(
                validate(&candidate("tap the lamp", 5), level, &config()).is_ok(),
                "level={level}"
            );
            let result = validate(&candidate("tap the lamp", 6), level, &config());
            assert!(
                matches!(result, Err(PolicyViolation::TooLong { max_seconds: 5, .. })),
                "level={level}"
            );
        }
    }

    // -- verb concreteness --------------------------------------------------

    #[test]
    fn rejects_denylisted_leading_verb() {
        let result = validate(&candidate("organize the floor", 8), 0, &config());
        assert!(matches!(
            result,
            Err(PolicyViolation::AbstractVerb(v)) if v == "organize"
        ));
    }

    #[test]
    fn rejects_denylisted_verb_regardless_of_time() {
        let result = validate(&candidate("plan the week", 2), 0, &config());
        assert!(matches!(result, Err(PolicyViolation::AbstractVerb(_))));
    }

    #[test]
    fn rejects_multi_word_abstract_phrase() {
        let result = validate(&candidate("figure out where to start", 4), 0, &config());
        assert!(matches!(
            result,
            Err(PolicyViolation::AbstractVerb(v)) if v == "figure out"
        ));
    }

    #[test]
    fn leading_verb_check_is_word_bounded() {
        // "place" must not be caught by the "plan" entry.
        assert!(validate(&candidate("place the pen on the desk", 4), 0, &config()).is_ok());
    }

    #[test]
    fn abstract_verb_mid_sentence_is_allowed() {
        // Only the leading verb matters.
        assert!(validate(&candidate("open the planner app", 3), 0, &config()).is_ok());
    }

    #[test]
    fn denylist_is_case_insensitive() {
        let result = validate(&candidate("Organize the shelf", 4), 0, &config());
        assert!(matches!(result, Err(PolicyViolation::AbstractVerb(_))));
    }

    // -- singularity --------------------------------------------------------

    #[test]
    fn rejects_conjoined_actions() {
        let result = validate(
            &candidate("pick up the pen and open the drawer", 8),
            0,
            &config(),
        );
        assert!(matches!(result, Err(PolicyViolation::MultiStep(_))));
    }

    #[test]
    fn rejects_then_chains() {
        let result = validate(
            &candidate("grab the cup, then walk to the sink", 9),
            0,
            &config(),
        );
        assert!(matches!(result, Err(PolicyViolation::MultiStep(_))));
    }

    #[test]
    fn allows_conjunction_without_second_verb() {
        // "and" joining noun phrases is a single action.
        assert!(validate(&candidate("pick up the cup and saucer", 6), 0, &config()).is_ok());
    }

    #[test]
    fn checks_run_in_order() {
        // TooLong fires before the verb check.
        let result = validate(&candidate("organize the garage", 45), 0, &config());
        assert!(matches!(result, Err(PolicyViolation::TooLong { .. })));
    }
}
