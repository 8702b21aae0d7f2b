//! In-memory store.
//!
//! Mirrors the SQL semantics of the Postgres store, including the
//! conditional-update guards and affected-row results, so the engine's
//! behavior under contention can be exercised without a database.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use nudge_db::models::{CompletedStepStat, EnergyLevel, Step, Task, TaskStatus};

use super::Store;
use crate::policy::StepContent;

#[derive(Default)]
struct Inner {
    tasks: HashMap<Uuid, Task>,
    steps: HashMap<Uuid, Step>,
}

/// In-process implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks. Useful for rollback assertions.
    pub async fn task_count(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    /// Number of stored steps. Useful for rollback assertions.
    pub async fn step_count(&self) -> usize {
        self.inner.read().await.steps.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_task(&self, original_goal: &str, energy_level: EnergyLevel) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            original_goal: original_goal.to_string(),
            status: TaskStatus::Active,
            energy_level,
            current_step_index: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.inner.read().await.tasks.get(&id).cloned())
    }

    async fn delete_task(&self, id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        if inner.tasks.remove(&id).is_none() {
            return Ok(0);
        }
        inner.steps.retain(|_, step| step.task_id != id);
        Ok(1)
    }

    async fn update_task_status(
        &self,
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
        expected_version: i64,
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task) if task.status == from && task.version == expected_version => {
                task.status = to;
                task.version += 1;
                task.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn advance_task_cursor(&self, id: Uuid, expected_version: i64) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task)
                if task.status == TaskStatus::Active && task.version == expected_version =>
            {
                task.current_step_index += 1;
                task.version += 1;
                task.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn retreat_task_cursor(&self, id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task) if task.current_step_index > 0 => {
                task.current_step_index -= 1;
                task.version += 1;
                task.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn touch_task(&self, id: Uuid, expected_version: i64) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task)
                if task.status == TaskStatus::Active && task.version == expected_version =>
            {
                task.version += 1;
                task.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn create_step(
        &self,
        task_id: Uuid,
        content: &StepContent,
        step_order: i32,
        simplification_level: i32,
    ) -> Result<Step> {
        let step = Step {
            id: Uuid::new_v4(),
            task_id,
            step_text: content.step_text.clone(),
            estimated_seconds: content.estimated_seconds,
            actual_duration_seconds: None,
            step_order,
            simplification_level,
            completed: false,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.inner.write().await.steps.insert(step.id, step.clone());
        Ok(step)
    }

    async fn get_step(&self, id: Uuid) -> Result<Option<Step>> {
        Ok(self.inner.read().await.steps.get(&id).cloned())
    }

    async fn get_current_step(&self, task_id: Uuid) -> Result<Option<Step>> {
        let inner = self.inner.read().await;
        let current = inner
            .steps
            .values()
            .filter(|s| s.task_id == task_id && !s.completed)
            .max_by_key(|s| s.step_order)
            .cloned();
        Ok(current)
    }

    async fn mark_step_completed(&self, id: Uuid, duration_seconds: Option<i32>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.steps.get_mut(&id) {
            Some(step) if !step.completed => {
                step.completed = true;
                step.completed_at = Some(Utc::now());
                step.actual_duration_seconds = duration_seconds;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn reopen_step(&self, id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.steps.get_mut(&id) {
            Some(step) if step.completed => {
                step.completed = false;
                step.completed_at = None;
                step.actual_duration_seconds = None;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn replace_step_content(
        &self,
        id: Uuid,
        content: &StepContent,
        expected_level: i32,
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.steps.get_mut(&id) {
            Some(step) if !step.completed && step.simplification_level == expected_level => {
                step.step_text = content.step_text.clone();
                step.estimated_seconds = content.estimated_seconds;
                step.simplification_level += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete_step(&self, id: Uuid) -> Result<u64> {
        let removed = self.inner.write().await.steps.remove(&id);
        Ok(u64::from(removed.is_some()))
    }

    async fn completed_step_stats(&self) -> Result<Vec<CompletedStepStat>> {
        let inner = self.inner.read().await;
        let mut stats: Vec<CompletedStepStat> = inner
            .steps
            .values()
            .filter(|s| s.completed)
            .filter_map(|s| {
                inner.tasks.get(&s.task_id).map(|t| CompletedStepStat {
                    energy_level: t.energy_level,
                    estimated_seconds: s.estimated_seconds,
                    actual_duration_seconds: s.actual_duration_seconds,
                    completed_at: s.completed_at,
                })
            })
            .collect();
        stats.sort_by_key(|s| s.completed_at);
        Ok(stats)
    }
}
