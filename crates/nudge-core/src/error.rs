//! The engine's error taxonomy.
//!
//! Policy violations are recovered locally by the step generator's retry
//! loop and only surface as [`EngineError::ExhaustedRetries`] once the
//! attempt budget is spent. Timeouts and backend failures surface
//! immediately. `Conflict` and `InvalidTransition` indicate caller misuse
//! and are never retried. Every surfaced error leaves the store exactly as
//! it was before the operation began.

use uuid::Uuid;

use nudge_db::models::TaskStatus;

use crate::policy::PolicyViolation;

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Every generation attempt was rejected by the policy validator.
    /// Carries the last rejection reason.
    #[error("step generation failed validation after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: PolicyViolation,
    },

    /// The generation backend did not answer within the configured
    /// wall-clock timeout.
    #[error("generation backend timed out")]
    Timeout,

    /// The generation backend errored on the call and on its single
    /// transparent retry.
    #[error("generation backend failure: {0}")]
    BackendFailure(String),

    /// A concurrent mutation on the same task was detected, or the caller
    /// presented a stale step handle.
    #[error("concurrent mutation detected on task {0}")]
    Conflict(Uuid),

    /// The requested operation is not a legal edge in the task's state
    /// graph.
    #[error("cannot {op} task {task_id} in status {status}")]
    InvalidTransition {
        op: &'static str,
        task_id: Uuid,
        status: TaskStatus,
    },

    /// No task exists with the given ID.
    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    /// The goal text was empty after sanitization.
    #[error("goal text is empty after sanitization")]
    EmptyGoal,

    /// The persistence collaborator failed.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyViolation;

    #[test]
    fn exhausted_retries_reports_last_reason() {
        let err = EngineError::ExhaustedRetries {
            attempts: 3,
            last: PolicyViolation::AbstractVerb("organize".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"), "message: {msg}");
        assert!(msg.contains("organize"), "message: {msg}");
    }

    #[test]
    fn store_errors_convert() {
        let err: EngineError = anyhow::anyhow!("connection refused").into();
        assert!(matches!(err, EngineError::Store(_)));
    }
}
