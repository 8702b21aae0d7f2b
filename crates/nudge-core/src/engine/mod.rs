//! Task/step state machine.
//!
//! Owns the task lifecycle (active/paused/completed), step ordering,
//! simplification-depth tracking, and resume semantics. Calls the step
//! generator whenever a new step is needed and commits results through
//! the store under a per-task lock plus optimistic fences, so a surfaced
//! error always leaves the store as it was before the operation began.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use nudge_db::models::{EnergyLevel, Step, Task, TaskStatus};

use crate::error::EngineError;
use crate::generator::{StepGenerator, StepRequest};
use crate::sanitize::sanitize_goal;
use crate::store::Store;

/// The task state machine.
///
/// Enforces the valid transition graph:
///
/// ```text
/// active -> paused
/// paused -> active
/// active -> completed
/// ```
///
/// `completed` is terminal.
pub struct TaskStateMachine;

impl TaskStateMachine {
    /// Check whether a transition from `from` to `to` is a valid edge
    /// in the state graph.
    pub fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
        matches!(
            (from, to),
            (TaskStatus::Active, TaskStatus::Paused)
                | (TaskStatus::Paused, TaskStatus::Active)
                | (TaskStatus::Active, TaskStatus::Completed)
        )
    }
}

// ---------------------------------------------------------------------------
// Per-task serialization
// ---------------------------------------------------------------------------

/// Registry of per-task mutual-exclusion locks.
///
/// Mutating operations on the same task serialize here; operations on
/// different tasks never contend.
#[derive(Default)]
struct TaskLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TaskLocks {
    async fn acquire(&self, task_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(task_id).or_default())
        };
        lock.lock_owned().await
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// The step as shown to the calling layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub task_id: Uuid,
    pub step_id: Uuid,
    pub step_text: String,
    pub estimated_seconds: i32,
    pub step_order: i32,
    pub simplification_level: i32,
    pub is_complete: bool,
}

impl StepView {
    fn from_step(step: &Step) -> Self {
        Self {
            task_id: step.task_id,
            step_id: step.id,
            step_text: step.step_text.clone(),
            estimated_seconds: step.estimated_seconds,
            step_order: step.step_order,
            simplification_level: step.simplification_level,
            is_complete: step.completed,
        }
    }
}

/// Outcome of a `next` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceResult {
    /// A new current step was issued.
    Step(StepView),
    /// The caller signalled the goal satisfied; the task is completed and
    /// no new step exists.
    Completed { task_id: Uuid },
}

/// Outcome of a `resume` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeView {
    pub task_id: Uuid,
    pub original_goal: String,
    pub status: TaskStatus,
    /// The last-seen step, exactly as it was before the pause. `None`
    /// only for a task that never issued a step.
    pub current_step: Option<StepView>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives the per-task step sequence.
pub struct TaskEngine {
    store: Arc<dyn Store>,
    generator: StepGenerator,
    locks: TaskLocks,
}

impl TaskEngine {
    pub fn new(store: Arc<dyn Store>, generator: StepGenerator) -> Self {
        Self {
            store,
            generator,
            locks: TaskLocks::default(),
        }
    }

    /// Start a new task: create it and issue its first step.
    ///
    /// The step is generated before anything is written, so a generator
    /// error leaves no trace. If the step insert fails after the task was
    /// created, the task is deleted again; no orphaned task persists.
    pub async fn start(
        &self,
        goal: &str,
        energy_level: EnergyLevel,
    ) -> Result<StepView, EngineError> {
        let goal = sanitize_goal(goal);
        if goal.is_empty() {
            return Err(EngineError::EmptyGoal);
        }

        let content = self
            .generator
            .generate_step(&StepRequest {
                goal: &goal,
                energy_level,
                simplification_level: 0,
                prior_step_text: None,
            })
            .await?;

        let task = self.store.create_task(&goal, energy_level).await?;

        let step = match self.store.create_step(task.id, &content, 0, 0).await {
            Ok(step) => step,
            Err(err) => {
                if let Err(del) = self.store.delete_task(task.id).await {
                    warn!(task_id = %task.id, error = %del, "failed to roll back task creation");
                }
                return Err(EngineError::Store(err));
            }
        };

        info!(task_id = %task.id, energy = %energy_level, "task started");
        Ok(StepView::from_step(&step))
    }

    /// Complete the current step and advance to the next one.
    ///
    /// `goal_complete` is the caller's explicit completion signal; the
    /// engine has no autonomous done-detection. When set, the task
    /// transitions to completed and no new step is generated. Otherwise a
    /// fresh step (simplification level 0) is issued at the next order.
    /// On any generator error the current step stays incomplete and the
    /// cursor does not move.
    pub async fn next(
        &self,
        task_id: Uuid,
        step_id: Uuid,
        duration_seconds: Option<i32>,
        goal_complete: bool,
    ) -> Result<AdvanceResult, EngineError> {
        let _guard = self.locks.acquire(task_id).await;

        let (task, step) = self.current_step_for(task_id, step_id, "next").await?;

        if goal_complete {
            return self.complete_task(&task, &step, duration_seconds).await;
        }

        // Generate before any write; generator errors roll back trivially.
        let content = self
            .generator
            .generate_step(&StepRequest {
                goal: &task.original_goal,
                energy_level: task.energy_level,
                simplification_level: 0,
                prior_step_text: Some(&step.step_text),
            })
            .await?;

        // Commit fence: a stale operation affects zero rows and nothing
        // else is written.
        let rows = self.store.advance_task_cursor(task_id, task.version).await?;
        if rows == 0 {
            return Err(EngineError::Conflict(task_id));
        }

        match self.store.mark_step_completed(step.id, duration_seconds).await {
            Ok(rows) if rows > 0 => {}
            outcome => {
                self.revert_cursor(task_id).await;
                return Err(match outcome {
                    Err(err) => EngineError::Store(err),
                    _ => EngineError::Conflict(task_id),
                });
            }
        }

        let new_step = match self
            .store
            .create_step(task_id, &content, step.step_order + 1, 0)
            .await
        {
            Ok(new_step) => new_step,
            Err(err) => {
                if let Err(reopen) = self.store.reopen_step(step.id).await {
                    warn!(step_id = %step.id, error = %reopen, "failed to reopen step during rollback");
                }
                self.revert_cursor(task_id).await;
                return Err(EngineError::Store(err));
            }
        };

        info!(
            task_id = %task_id,
            step_order = new_step.step_order,
            "advanced to next step"
        );
        Ok(AdvanceResult::Step(StepView::from_step(&new_step)))
    }

    /// Replace the current step with a simpler one.
    ///
    /// The simplification level increments and the step order stays
    /// unchanged; superseded content is discarded. There is no upper
    /// bound on the level.
    pub async fn simplify(&self, task_id: Uuid, step_id: Uuid) -> Result<StepView, EngineError> {
        let _guard = self.locks.acquire(task_id).await;

        let (task, step) = self.current_step_for(task_id, step_id, "simplify").await?;

        let target_level = step.simplification_level + 1;
        let content = self
            .generator
            .generate_step(&StepRequest {
                goal: &task.original_goal,
                energy_level: task.energy_level,
                simplification_level: target_level,
                prior_step_text: Some(&step.step_text),
            })
            .await?;

        // Commit fence.
        let rows = self.store.touch_task(task_id, task.version).await?;
        if rows == 0 {
            return Err(EngineError::Conflict(task_id));
        }

        let rows = self
            .store
            .replace_step_content(step.id, &content, step.simplification_level)
            .await?;
        if rows == 0 {
            warn!(step_id = %step.id, "step superseded between fence and replace");
            return Err(EngineError::Conflict(task_id));
        }

        info!(
            task_id = %task_id,
            simplification_level = target_level,
            "step simplified"
        );
        Ok(StepView {
            task_id,
            step_id: step.id,
            step_text: content.step_text,
            estimated_seconds: content.estimated_seconds,
            step_order: step.step_order,
            simplification_level: target_level,
            is_complete: false,
        })
    }

    /// Freeze the task for later resumption. No step mutation.
    pub async fn pause(&self, task_id: Uuid) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(task_id).await;

        let task = self.load_task(task_id).await?;
        if !TaskStateMachine::is_valid_transition(task.status, TaskStatus::Paused) {
            return Err(EngineError::InvalidTransition {
                op: "pause",
                task_id,
                status: task.status,
            });
        }

        let rows = self
            .store
            .update_task_status(task_id, TaskStatus::Active, TaskStatus::Paused, task.version)
            .await?;
        if rows == 0 {
            return Err(EngineError::Conflict(task_id));
        }

        info!(task_id = %task_id, "task paused");
        Ok(())
    }

    /// Reactivate a paused task and return its last-seen step unchanged.
    ///
    /// Never triggers a backend call; resumption is idempotent and cheap.
    /// Resuming an already-active task is a read-only no-op.
    pub async fn resume(&self, task_id: Uuid) -> Result<ResumeView, EngineError> {
        let _guard = self.locks.acquire(task_id).await;

        let task = self.load_task(task_id).await?;
        match task.status {
            TaskStatus::Paused => {
                let rows = self
                    .store
                    .update_task_status(
                        task_id,
                        TaskStatus::Paused,
                        TaskStatus::Active,
                        task.version,
                    )
                    .await?;
                if rows == 0 {
                    return Err(EngineError::Conflict(task_id));
                }
                info!(task_id = %task_id, "task resumed");
            }
            TaskStatus::Active => {}
            TaskStatus::Completed => {
                return Err(EngineError::InvalidTransition {
                    op: "resume",
                    task_id,
                    status: task.status,
                });
            }
        }

        let current_step = self
            .store
            .get_current_step(task_id)
            .await?
            .map(|s| StepView::from_step(&s));

        Ok(ResumeView {
            task_id,
            original_goal: task.original_goal,
            status: TaskStatus::Active,
            current_step,
        })
    }

    // -- internals ----------------------------------------------------------

    async fn load_task(&self, task_id: Uuid) -> Result<Task, EngineError> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound(task_id))
    }

    /// Load the task and verify the caller's step handle is the current,
    /// incomplete step. A mismatch means the handle is stale.
    async fn current_step_for(
        &self,
        task_id: Uuid,
        step_id: Uuid,
        op: &'static str,
    ) -> Result<(Task, Step), EngineError> {
        let task = self.load_task(task_id).await?;
        if task.status != TaskStatus::Active {
            return Err(EngineError::InvalidTransition {
                op,
                task_id,
                status: task.status,
            });
        }

        let step = self
            .store
            .get_current_step(task_id)
            .await?
            .ok_or(EngineError::Conflict(task_id))?;
        if step.id != step_id || step.completed {
            return Err(EngineError::Conflict(task_id));
        }

        Ok((task, step))
    }

    /// Caller-signalled completion: mark the step done, close the task.
    ///
    /// The status transition is the commit fence; if it fails, the step
    /// completion is rolled back so the store is untouched.
    async fn complete_task(
        &self,
        task: &Task,
        step: &Step,
        duration_seconds: Option<i32>,
    ) -> Result<AdvanceResult, EngineError> {
        let rows = self
            .store
            .mark_step_completed(step.id, duration_seconds)
            .await?;
        if rows == 0 {
            return Err(EngineError::Conflict(task.id));
        }

        match self
            .store
            .update_task_status(
                task.id,
                TaskStatus::Active,
                TaskStatus::Completed,
                task.version,
            )
            .await
        {
            Ok(rows) if rows > 0 => {}
            outcome => {
                if let Err(reopen) = self.store.reopen_step(step.id).await {
                    warn!(step_id = %step.id, error = %reopen, "failed to reopen step during rollback");
                }
                return Err(match outcome {
                    Err(err) => EngineError::Store(err),
                    _ => EngineError::Conflict(task.id),
                });
            }
        }

        info!(task_id = %task.id, "task completed");
        Ok(AdvanceResult::Completed { task_id: task.id })
    }

    /// Best-effort cursor rollback after a failed advance commit.
    async fn revert_cursor(&self, task_id: Uuid) {
        match self.store.retreat_task_cursor(task_id).await {
            Ok(rows) if rows > 0 => {}
            Ok(_) => warn!(task_id = %task_id, "cursor rollback affected no rows"),
            Err(err) => warn!(task_id = %task_id, error = %err, "cursor rollback failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions_accepted() {
        let valid = [
            (TaskStatus::Active, TaskStatus::Paused),
            (TaskStatus::Paused, TaskStatus::Active),
            (TaskStatus::Active, TaskStatus::Completed),
        ];
        for (from, to) in &valid {
            assert!(
                TaskStateMachine::is_valid_transition(*from, *to),
                "expected {from} -> {to} to be valid"
            );
        }
    }

    #[test]
    fn invalid_transitions_rejected() {
        let invalid = [
            (TaskStatus::Active, TaskStatus::Active),
            (TaskStatus::Paused, TaskStatus::Paused),
            (TaskStatus::Paused, TaskStatus::Completed),
            (TaskStatus::Completed, TaskStatus::Active),
            (TaskStatus::Completed, TaskStatus::Paused),
            (TaskStatus::Completed, TaskStatus::Completed),
        ];
        for (from, to) in &invalid {
            assert!(
                !TaskStateMachine::is_valid_transition(*from, *to),
                "expected {from} -> {to} to be invalid"
            );
        }
    }
}
