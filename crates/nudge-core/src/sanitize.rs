//! Goal text sanitization.
//!
//! A pass-through privacy filter: normalizes whitespace and strips control
//! characters. Deeper PII detection is explicitly out of scope; the goal
//! text reaches the generation backend otherwise unchanged.

/// Sanitize a user-stated goal before it is stored or prompted with.
///
/// Control characters become spaces and runs of whitespace collapse to a
/// single space. Returns an empty string for an all-whitespace goal.
pub fn sanitize_goal(goal: &str) -> String {
    goal.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
