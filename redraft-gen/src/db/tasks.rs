//! Task persistence
//!
//! Task and items are inserted in one transaction. Status changes are
//! compare-and-swap updates on the status column, which is what keeps a
//! duplicate `start` from running a task twice.

use redraft_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{now_rfc3339, parse_optional_timestamp, parse_timestamp, parse_uuid};
use crate::models::{Item, Task, TaskConfig, TaskStatus};

const TASK_COLUMNS: &str = "task_id, owner, name, config, status, error_message, \
                            created_at, updated_at, started_at, completed_at";

/// Insert a task together with its items (all-or-nothing)
pub async fn create_task_with_items(pool: &SqlitePool, task: &Task, items: &[Item]) -> Result<()> {
    let config = serde_json::to_string(&task.config)
        .map_err(|e| Error::Internal(format!("Failed to serialize task config: {}", e)))?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO tasks (task_id, owner, name, config, status, error_message,
                           created_at, updated_at, started_at, completed_at)
        VALUES (?, ?, ?, ?, ?, NULL, ?, ?, NULL, NULL)
        "#,
    )
    .bind(task.task_id.to_string())
    .bind(&task.owner)
    .bind(&task.name)
    .bind(&config)
    .bind(task.status.as_str())
    .bind(task.created_at.to_rfc3339())
    .bind(task.updated_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    for item in items {
        let staged = serde_json::to_string(&item.staged)
            .map_err(|e| Error::Internal(format!("Failed to serialize staged content: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO items (item_id, task_id, ordinal, reference, staged, status,
                               error_message, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(item.item_id.to_string())
        .bind(item.task_id.to_string())
        .bind(item.ordinal as i64)
        .bind(&item.reference)
        .bind(&staged)
        .bind(item.status.as_str())
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Load a task by id
pub async fn load_task(pool: &SqlitePool, task_id: Uuid) -> Result<Option<Task>> {
    let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE task_id = ?", TASK_COLUMNS))
        .bind(task_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| task_from_row(&row)).transpose()
}

/// Tasks belonging to one owner, newest first
pub async fn list_tasks_for_owner(pool: &SqlitePool, owner: &str) -> Result<Vec<Task>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tasks WHERE owner = ? ORDER BY created_at DESC",
        TASK_COLUMNS
    ))
    .bind(owner)
    .fetch_all(pool)
    .await?;

    rows.iter().map(task_from_row).collect()
}

/// All tasks currently in a status (used by the startup recovery sweep)
pub async fn list_tasks_with_status(pool: &SqlitePool, status: TaskStatus) -> Result<Vec<Task>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tasks WHERE status = ? ORDER BY created_at",
        TASK_COLUMNS
    ))
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(task_from_row).collect()
}

/// Compare-and-swap `pending|failed → processing`
///
/// Returns false if the task is missing, owned by someone else, or another
/// caller already moved it out of a startable status.
pub async fn try_begin_processing(pool: &SqlitePool, task_id: Uuid, owner: &str) -> Result<bool> {
    let now = now_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'processing',
            error_message = NULL,
            started_at = ?,
            updated_at = ?
        WHERE task_id = ? AND owner = ? AND status IN ('pending', 'failed')
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(task_id.to_string())
    .bind(owner)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// `processing → completed`; false if the task was not processing
pub async fn mark_completed(pool: &SqlitePool, task_id: Uuid) -> Result<bool> {
    let now = now_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'completed', completed_at = ?, updated_at = ?
        WHERE task_id = ? AND status = 'processing'
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(task_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// `processing → failed` with a message; false if the task was not processing
pub async fn mark_failed(pool: &SqlitePool, task_id: Uuid, error_message: &str) -> Result<bool> {
    let now = now_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'failed', error_message = ?, completed_at = ?, updated_at = ?
        WHERE task_id = ? AND status = 'processing'
        "#,
    )
    .bind(error_message)
    .bind(&now)
    .bind(&now)
    .bind(task_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    let task_id: String = row.get("task_id");
    let config: String = row.get("config");
    let config: TaskConfig = serde_json::from_str(&config)
        .map_err(|e| Error::Internal(format!("Failed to deserialize task config: {}", e)))?;
    let status: String = row.get("status");
    let status = TaskStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown task status: {}", status)))?;
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Task {
        task_id: parse_uuid(&task_id, "task_id")?,
        owner: row.get("owner"),
        name: row.get("name"),
        config,
        status,
        error_message: row.get("error_message"),
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
        started_at: parse_optional_timestamp(row.get("started_at"), "started_at")?,
        completed_at: parse_optional_timestamp(row.get("completed_at"), "completed_at")?,
    })
}
