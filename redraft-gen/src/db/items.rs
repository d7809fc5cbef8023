//! Item persistence

use redraft_common::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{now_rfc3339, parse_timestamp, parse_uuid};
use crate::models::{Item, ItemStatus, StagedContent};

const ITEM_COLUMNS: &str = "item_id, task_id, ordinal, reference, staged, status, \
                            error_message, created_at, updated_at";

/// Item counts for one task, grouped by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// All items of a task in submission order
pub async fn load_items_for_task(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Item>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM items WHERE task_id = ? ORDER BY ordinal",
        ITEM_COLUMNS
    ))
    .bind(task_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(item_from_row).collect()
}

/// Items of a task that have not been picked up yet
pub async fn load_pending_items(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Item>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM items WHERE task_id = ? AND status = 'pending' ORDER BY ordinal",
        ITEM_COLUMNS
    ))
    .bind(task_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(item_from_row).collect()
}

/// `pending → processing`; false if another job already claimed the item
pub async fn mark_processing(pool: &SqlitePool, item_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE items SET status = 'processing', updated_at = ? WHERE item_id = ? AND status = 'pending'",
    )
    .bind(now_rfc3339())
    .bind(item_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move a non-terminal item to completed
pub async fn mark_completed(pool: &SqlitePool, item_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE items SET status = 'completed', error_message = NULL, updated_at = ?
        WHERE item_id = ? AND status IN ('pending', 'processing')
        "#,
    )
    .bind(now_rfc3339())
    .bind(item_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move a non-terminal item to failed with a message
pub async fn mark_failed(pool: &SqlitePool, item_id: Uuid, error_message: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE items SET status = 'failed', error_message = ?, updated_at = ?
        WHERE item_id = ? AND status IN ('pending', 'processing')
        "#,
    )
    .bind(error_message)
    .bind(now_rfc3339())
    .bind(item_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Fail every item of the task that is still pending or processing
///
/// Returns the number of items moved to failed.
pub async fn fail_unfinished_for_task(
    pool: &SqlitePool,
    task_id: Uuid,
    error_message: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE items SET status = 'failed', error_message = ?, updated_at = ?
        WHERE task_id = ? AND status IN ('pending', 'processing')
        "#,
    )
    .bind(error_message)
    .bind(now_rfc3339())
    .bind(task_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Put items left in processing by an interrupted run back to pending
pub async fn reset_processing_to_pending(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Uuid>> {
    let mut tx = pool.begin().await?;

    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT item_id FROM items WHERE task_id = ? AND status = 'processing'",
    )
    .bind(task_id.to_string())
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE items SET status = 'pending', updated_at = ? WHERE task_id = ? AND status = 'processing'",
    )
    .bind(now_rfc3339())
    .bind(task_id.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    ids.iter().map(|id| parse_uuid(id, "item_id")).collect()
}

/// Count a task's items per status
pub async fn count_by_status(pool: &SqlitePool, task_id: Uuid) -> Result<ItemCounts> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM items WHERE task_id = ? GROUP BY status")
        .bind(task_id.to_string())
        .fetch_all(pool)
        .await?;

    let mut counts = ItemCounts::default();
    for row in rows {
        let status: String = row.get("status");
        let n: i64 = row.get("n");
        let n = n as usize;
        match ItemStatus::parse(&status) {
            Some(ItemStatus::Pending) => counts.pending = n,
            Some(ItemStatus::Processing) => counts.processing = n,
            Some(ItemStatus::Completed) => counts.completed = n,
            Some(ItemStatus::Failed) => counts.failed = n,
            None => return Err(Error::Internal(format!("Unknown item status: {}", status))),
        }
    }

    Ok(counts)
}

fn item_from_row(row: &SqliteRow) -> Result<Item> {
    let item_id: String = row.get("item_id");
    let task_id: String = row.get("task_id");
    let ordinal: i64 = row.get("ordinal");
    let staged: String = row.get("staged");
    let staged: StagedContent = serde_json::from_str(&staged)
        .map_err(|e| Error::Internal(format!("Failed to deserialize staged content: {}", e)))?;
    let status: String = row.get("status");
    let status = ItemStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown item status: {}", status)))?;
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Item {
        item_id: parse_uuid(&item_id, "item_id")?,
        task_id: parse_uuid(&task_id, "task_id")?,
        ordinal: ordinal as usize,
        reference: row.get("reference"),
        staged,
        status,
        error_message: row.get("error_message"),
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}
