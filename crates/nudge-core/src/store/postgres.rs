//! PostgreSQL store.
//!
//! Thin delegation onto the `nudge-db` query layer; the optimistic guards
//! live in the SQL itself.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use nudge_db::models::{CompletedStepStat, EnergyLevel, Step, Task, TaskStatus};
use nudge_db::queries::{steps, tasks};

use super::Store;
use crate::policy::StepContent;

/// [`Store`] implementation backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_task(&self, original_goal: &str, energy_level: EnergyLevel) -> Result<Task> {
        tasks::insert_task(&self.pool, original_goal, energy_level).await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        tasks::get_task(&self.pool, id).await
    }

    async fn delete_task(&self, id: Uuid) -> Result<u64> {
        tasks::delete_task(&self.pool, id).await
    }

    async fn update_task_status(
        &self,
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
        expected_version: i64,
    ) -> Result<u64> {
        tasks::transition_task_status(&self.pool, id, from, to, expected_version).await
    }

    async fn advance_task_cursor(&self, id: Uuid, expected_version: i64) -> Result<u64> {
        tasks::advance_task_cursor(&self.pool, id, expected_version).await
    }

    async fn retreat_task_cursor(&self, id: Uuid) -> Result<u64> {
        tasks::retreat_task_cursor(&self.pool, id).await
    }

    async fn touch_task(&self, id: Uuid, expected_version: i64) -> Result<u64> {
        tasks::touch_task(&self.pool, id, expected_version).await
    }

    async fn create_step(
        &self,
        task_id: Uuid,
        content: &StepContent,
        step_order: i32,
        simplification_level: i32,
    ) -> Result<Step> {
        steps::insert_step(
            &self.pool,
            task_id,
            &content.step_text,
            content.estimated_seconds,
            step_order,
            simplification_level,
        )
        .await
    }

    async fn get_step(&self, id: Uuid) -> Result<Option<Step>> {
        steps::get_step(&self.pool, id).await
    }

    async fn get_current_step(&self, task_id: Uuid) -> Result<Option<Step>> {
        steps::get_current_step(&self.pool, task_id).await
    }

    async fn mark_step_completed(&self, id: Uuid, duration_seconds: Option<i32>) -> Result<u64> {
        steps::mark_step_completed(&self.pool, id, duration_seconds).await
    }

    async fn reopen_step(&self, id: Uuid) -> Result<u64> {
        steps::reopen_step(&self.pool, id).await
    }

    async fn replace_step_content(
        &self,
        id: Uuid,
        content: &StepContent,
        expected_level: i32,
    ) -> Result<u64> {
        steps::replace_step_content(
            &self.pool,
            id,
            &content.step_text,
            content.estimated_seconds,
            expected_level,
        )
        .await
    }

    async fn delete_step(&self, id: Uuid) -> Result<u64> {
        steps::delete_step(&self.pool, id).await
    }

    async fn completed_step_stats(&self) -> Result<Vec<CompletedStepStat>> {
        steps::completed_step_stats(&self.pool).await
    }
}
