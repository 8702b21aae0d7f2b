//! The persistence seam.
//!
//! The engine consumes persistence through the object-safe [`Store`]
//! trait. Every operation is atomic at the single-record level; mutating
//! operations take the optimistic guards (task version, step completion
//! flag, simplification level) captured at call start and return an
//! affected-row count, so a stale writer observes `0` instead of
//! clobbering newer state. Per-task serialization above this trait is the
//! engine's responsibility.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use nudge_db::models::{CompletedStepStat, EnergyLevel, Step, Task, TaskStatus};

use crate::policy::StepContent;

/// Abstract task/step store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a fresh task (status `active`, cursor 0, version 0).
    async fn create_task(&self, original_goal: &str, energy_level: EnergyLevel) -> Result<Task>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>>;

    /// Delete a task and, by ownership, all of its steps.
    async fn delete_task(&self, id: Uuid) -> Result<u64>;

    /// Transition `from -> to`, guarded by the expected version. Bumps the
    /// version on success.
    async fn update_task_status(
        &self,
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
        expected_version: i64,
    ) -> Result<u64>;

    /// Increment `current_step_index`, guarded by the expected version.
    /// Bumps the version on success. Only valid while active.
    async fn advance_task_cursor(&self, id: Uuid, expected_version: i64) -> Result<u64>;

    /// Decrement `current_step_index`. Compensation path only.
    async fn retreat_task_cursor(&self, id: Uuid) -> Result<u64>;

    /// Bump the version without other changes -- the commit fence for
    /// in-place step mutations. Only valid while active.
    async fn touch_task(&self, id: Uuid, expected_version: i64) -> Result<u64>;

    /// Insert a step with the given position and simplification level.
    async fn create_step(
        &self,
        task_id: Uuid,
        content: &StepContent,
        step_order: i32,
        simplification_level: i32,
    ) -> Result<Step>;

    async fn get_step(&self, id: Uuid) -> Result<Option<Step>>;

    /// The task's incomplete, highest-order step, if any.
    async fn get_current_step(&self, task_id: Uuid) -> Result<Option<Step>>;

    /// Complete a step, recording the reported duration. Guarded by
    /// `completed = false`.
    async fn mark_step_completed(&self, id: Uuid, duration_seconds: Option<i32>) -> Result<u64>;

    /// Clear a step's completion. Compensation path only.
    async fn reopen_step(&self, id: Uuid) -> Result<u64>;

    /// Replace a step's content in place and increment its simplification
    /// level, guarded by the expected current level.
    async fn replace_step_content(
        &self,
        id: Uuid,
        content: &StepContent,
        expected_level: i32,
    ) -> Result<u64>;

    /// Delete a step. Compensation path only.
    async fn delete_step(&self, id: Uuid) -> Result<u64>;

    /// Every completed step joined with its task's energy level, oldest
    /// first. Feeds energy insights.
    async fn completed_step_stats(&self) -> Result<Vec<CompletedStepStat>>;
}

// Compile-time assertion: Store must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Store) {}
};
