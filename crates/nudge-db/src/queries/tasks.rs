//! Database query functions for the `tasks` table.
//!
//! Mutating queries use optimistic locking: the UPDATE's WHERE clause pins
//! the expected `version` (and, for status changes, the expected status),
//! so a stale writer affects zero rows. Callers inspect the returned
//! affected-row count instead of assuming success.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{EnergyLevel, Task, TaskStatus};

/// Insert a new task row. Returns the inserted task with server-generated
/// defaults (id, status, version, timestamps).
pub async fn insert_task(
    pool: &PgPool,
    original_goal: &str,
    energy_level: EnergyLevel,
) -> Result<Task> {
    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (original_goal, energy_level) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(original_goal)
    .bind(energy_level)
    .fetch_one(pool)
    .await
    .context("failed to insert task")?;

    Ok(task)
}

/// Fetch a single task by ID.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// Delete a task. Steps are removed by the cascade constraint.
pub async fn delete_task(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete task")?;

    Ok(result.rows_affected())
}

/// Atomically transition a task from one status to another.
///
/// The WHERE clause pins both the expected current status and the expected
/// version; the version is incremented on success. Returns the number of
/// rows affected (0 means the status or version did not match).
pub async fn transition_task_status(
    pool: &PgPool,
    id: Uuid,
    from: TaskStatus,
    to: TaskStatus,
    expected_version: i64,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks \
         SET status = $1, version = version + 1, updated_at = now() \
         WHERE id = $2 AND status = $3 AND version = $4",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to transition task status")?;

    Ok(result.rows_affected())
}

/// Advance the task's step cursor by one, bumping the version.
///
/// Only valid while the task is active. Returns affected rows (0 on a
/// version/status mismatch).
pub async fn advance_task_cursor(pool: &PgPool, id: Uuid, expected_version: i64) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks \
         SET current_step_index = current_step_index + 1, \
             version = version + 1, \
             updated_at = now() \
         WHERE id = $1 AND status = 'active' AND version = $2",
    )
    .bind(id)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to advance task cursor")?;

    Ok(result.rows_affected())
}

/// Roll the task's step cursor back by one, bumping the version.
///
/// Compensation path for a failed advance commit; not part of the normal
/// forward flow.
pub async fn retreat_task_cursor(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks \
         SET current_step_index = current_step_index - 1, \
             version = version + 1, \
             updated_at = now() \
         WHERE id = $1 AND current_step_index > 0",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to retreat task cursor")?;

    Ok(result.rows_affected())
}

/// Bump the task's version without changing any other field.
///
/// Serves as the commit fence for in-place step mutations (simplify).
pub async fn touch_task(pool: &PgPool, id: Uuid, expected_version: i64) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tasks \
         SET version = version + 1, updated_at = now() \
         WHERE id = $1 AND status = 'active' AND version = $2",
    )
    .bind(id)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to touch task")?;

    Ok(result.rows_affected())
}
