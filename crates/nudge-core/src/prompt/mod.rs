//! Prompt builder: composes system/user prompts from the goal, energy
//! level, simplification depth, and prior step context.
//!
//! The system prompt is a fixed policy header; it never varies per call.
//! User prompts contain task-relevant text only -- no identifiers and no
//! timestamps ever appear in a prompt.

use nudge_db::models::EnergyLevel;

/// Fixed policy header sent as the system prompt on every call.
pub const SYSTEM_PROMPT: &str = "\
You convert goals into micro-steps: ultra-specific, physically executable \
actions that help a stuck user start moving.

Hard constraints for every step you produce:
- It takes at most 10 seconds to complete.
- It requires ZERO decision-making.
- It starts with a concrete action verb (pick, grab, open, tap, walk, touch).
- It never starts with an abstract verb (organize, plan, prepare, think, \
decide, consider).
- It describes exactly ONE action. Never join two actions with \"and\" or \
\"then\".

You must respond ONLY with valid JSON in this exact shape:
{\"step\": \"action description\", \"estimated_seconds\": number}

Generate ONE step at a time. Focus on the absolute first physical movement.";

/// A composed prompt pair ready for the generation client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: &'static str,
    pub user: String,
}

/// Build the prompt pair for a generation call.
///
/// - `simplification_level == 0`, no prior step: initial step for a goal.
/// - `simplification_level == 0`, prior step: the logically following step.
/// - `simplification_level >= 1`: simplify the prior step text (callers
///   always supply the current step when simplifying; the goal stands in
///   if they do not).
pub fn build(
    goal: &str,
    energy_level: EnergyLevel,
    simplification_level: i32,
    prior_step_text: Option<&str>,
) -> PromptPair {
    let user = if simplification_level >= 1 {
        simplify_prompt(prior_step_text.unwrap_or(goal), simplification_level)
    } else {
        match prior_step_text {
            None => initial_prompt(goal, energy_level),
            Some(previous) => next_prompt(goal, previous, energy_level),
        }
    };

    PromptPair {
        system: SYSTEM_PROMPT,
        user,
    }
}

/// Energy-level directive appended to initial and next prompts.
fn energy_directive(energy_level: EnergyLevel) -> &'static str {
    match energy_level {
        EnergyLevel::Low => {
            "The user has LOW energy. Ask for the smallest, least intimidating \
             movement possible (five seconds or less)."
        }
        EnergyLevel::Medium => "Standard energy. One concrete physical action of ten seconds or less.",
        EnergyLevel::High => "High energy. The action may use the full ten seconds.",
    }
}

fn initial_prompt(goal: &str, energy_level: EnergyLevel) -> String {
    format!(
        "TASK: {goal}\n\
         CONSTRAINT: {directive}\n\
         \n\
         Generate the FIRST physically executable micro-step to start this task.\n\
         \n\
         EXAMPLES:\n\
         - \"Touch the handle of your laptop\"\n\
         - \"Pick up the nearest blue item\"\n\
         - \"Open the lid of your water bottle\"\n\
         \n\
         Return ONLY valid JSON: {{\"step\": \"...\", \"estimated_seconds\": ...}}",
        directive = energy_directive(energy_level),
    )
}

fn next_prompt(goal: &str, previous_step: &str, energy_level: EnergyLevel) -> String {
    format!(
        "ORIGINAL TASK: {goal}\n\
         PREVIOUS STEP COMPLETED: {previous_step}\n\
         CONSTRAINT: {directive}\n\
         \n\
         Generate the NEXT physically executable micro-step, the action that \
         logically follows.\n\
         \n\
         Return ONLY valid JSON: {{\"step\": \"...\", \"estimated_seconds\": ...}}",
        directive = energy_directive(energy_level),
    )
}

fn simplify_prompt(current_step: &str, simplification_level: i32) -> String {
    format!(
        "The user found this step TOO HARD:\n\
         \"{current_step}\"\n\
         \n\
         This is simplification level {simplification_level}.\n\
         \n\
         Break it into an EVEN SIMPLER physical action. Requirements:\n\
         - Must be strictly SMALLER and easier than the step above\n\
         - Target 5 seconds or less\n\
         - Remove ALL decision-making\n\
         - Focus on the absolute first micro-movement\n\
         \n\
         EXAMPLES:\n\
         Original: \"Pick up the first item on the floor\"\n\
         Simplified: \"Walk to the nearest visible item\"\n\
         Ultra-simplified: \"Take one step toward the floor\"\n\
         \n\
         Return ONLY valid JSON: {{\"step\": \"...\", \"estimated_seconds\": ...}}",
    )
}
