use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a task.
///
/// The only legal transitions are `active -> paused`, `paused -> active`,
/// and `active -> completed`. `completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Paused,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------

/// Energy level supplied by the caller at task start.
///
/// Biases step size: low energy asks the generator for smaller,
/// lower-effort actions. Fixed for the lifetime of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for EnergyLevel {
    type Err = EnergyLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(EnergyLevelParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`EnergyLevel`] string.
#[derive(Debug, Clone)]
pub struct EnergyLevelParseError(pub String);

impl fmt::Display for EnergyLevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid energy level: {:?}", self.0)
    }
}

impl std::error::Error for EnergyLevelParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A task -- one user-stated goal and its ordered sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    /// Sanitized goal text. Immutable after creation.
    pub original_goal: String,
    pub status: TaskStatus,
    pub energy_level: EnergyLevel,
    /// Ordinal of the most recently issued step. Monotonically increasing.
    pub current_step_index: i32,
    /// Optimistic-concurrency fence, bumped on every mutating transition.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A step -- one emitted micro-action.
///
/// Within a task, exactly one step is incomplete (the "current" step),
/// except when the task is completed or has not been started.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Step {
    pub id: Uuid,
    pub task_id: Uuid,
    pub step_text: String,
    pub estimated_seconds: i32,
    /// Wall time the user actually spent, reported on completion.
    pub actual_duration_seconds: Option<i32>,
    /// 0-based position in the task's step sequence. Unchanged by simplify.
    pub step_order: i32,
    /// Recursion depth of "too hard" requests against this position.
    pub simplification_level: i32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Aggregation row for energy insights: one completed step with the
/// owning task's energy level.
#[derive(Debug, Clone, FromRow)]
pub struct CompletedStepStat {
    pub energy_level: EnergyLevel,
    pub estimated_seconds: i32,
    pub actual_duration_seconds: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_display_roundtrip() {
        let variants = [TaskStatus::Active, TaskStatus::Paused, TaskStatus::Completed];
        for v in &variants {
            let s = v.to_string();
            let parsed: TaskStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn task_status_invalid() {
        let result = "bogus".parse::<TaskStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn energy_level_display_roundtrip() {
        let variants = [EnergyLevel::Low, EnergyLevel::Medium, EnergyLevel::High];
        for v in &variants {
            let s = v.to_string();
            let parsed: EnergyLevel = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn energy_level_invalid() {
        let result = "frantic".parse::<EnergyLevel>();
        assert!(result.is_err());
    }

    #[test]
    fn task_status_serde_snake_case() {
        let json = serde_json::to_string(&TaskStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");
        let parsed: TaskStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(parsed, TaskStatus::Paused);
    }
}
