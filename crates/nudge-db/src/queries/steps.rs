//! Database query functions for the `steps` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CompletedStepStat, Step};

/// Insert a new step row. Returns the inserted step.
pub async fn insert_step(
    pool: &PgPool,
    task_id: Uuid,
    step_text: &str,
    estimated_seconds: i32,
    step_order: i32,
    simplification_level: i32,
) -> Result<Step> {
    let step = sqlx::query_as::<_, Step>(
        "INSERT INTO steps (task_id, step_text, estimated_seconds, step_order, simplification_level) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(task_id)
    .bind(step_text)
    .bind(estimated_seconds)
    .bind(step_order)
    .bind(simplification_level)
    .fetch_one(pool)
    .await
    .context("failed to insert step")?;

    Ok(step)
}

/// Fetch a single step by ID.
pub async fn get_step(pool: &PgPool, id: Uuid) -> Result<Option<Step>> {
    let step = sqlx::query_as::<_, Step>("SELECT * FROM steps WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch step")?;

    Ok(step)
}

/// Fetch the task's current (incomplete, highest-order) step, if any.
pub async fn get_current_step(pool: &PgPool, task_id: Uuid) -> Result<Option<Step>> {
    let step = sqlx::query_as::<_, Step>(
        "SELECT * FROM steps \
         WHERE task_id = $1 AND completed = FALSE \
         ORDER BY step_order DESC \
         LIMIT 1",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch current step")?;

    Ok(step)
}

/// Mark a step completed, recording the reported duration.
///
/// Guarded by `completed = FALSE` so a stale caller affects zero rows.
pub async fn mark_step_completed(
    pool: &PgPool,
    id: Uuid,
    duration_seconds: Option<i32>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE steps \
         SET completed = TRUE, \
             completed_at = now(), \
             actual_duration_seconds = $1 \
         WHERE id = $2 AND completed = FALSE",
    )
    .bind(duration_seconds)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to mark step completed")?;

    Ok(result.rows_affected())
}

/// Reopen a completed step: clear the completion flag and duration.
///
/// Compensation path for a failed advance commit.
pub async fn reopen_step(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE steps \
         SET completed = FALSE, \
             completed_at = NULL, \
             actual_duration_seconds = NULL \
         WHERE id = $1 AND completed = TRUE",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to reopen step")?;

    Ok(result.rows_affected())
}

/// Replace a step's content in place, incrementing its simplification
/// level.
///
/// The WHERE clause pins the expected current level (the fencing token
/// captured when the simplify operation began) and rejects completed
/// steps, so a superseded writer affects zero rows.
pub async fn replace_step_content(
    pool: &PgPool,
    id: Uuid,
    step_text: &str,
    estimated_seconds: i32,
    expected_level: i32,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE steps \
         SET step_text = $1, \
             estimated_seconds = $2, \
             simplification_level = simplification_level + 1 \
         WHERE id = $3 AND simplification_level = $4 AND completed = FALSE",
    )
    .bind(step_text)
    .bind(estimated_seconds)
    .bind(id)
    .bind(expected_level)
    .execute(pool)
    .await
    .context("failed to replace step content")?;

    Ok(result.rows_affected())
}

/// Delete a step by ID. Compensation path for a failed advance commit.
pub async fn delete_step(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM steps WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete step")?;

    Ok(result.rows_affected())
}

/// Fetch every completed step with a recorded duration, joined to its
/// task's energy level. Feeds the energy-insights aggregation.
pub async fn completed_step_stats(pool: &PgPool) -> Result<Vec<CompletedStepStat>> {
    let stats = sqlx::query_as::<_, CompletedStepStat>(
        "SELECT t.energy_level, s.estimated_seconds, s.actual_duration_seconds, s.completed_at \
         FROM steps s \
         JOIN tasks t ON t.id = s.task_id \
         WHERE s.completed = TRUE \
         ORDER BY s.completed_at ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch completed step stats")?;

    Ok(stats)
}
