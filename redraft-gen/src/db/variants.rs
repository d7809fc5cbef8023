//! Variant persistence
//!
//! Variants are pre-created in `generating` before the generation request
//! goes out, then finalized one by one as the streamed result is parsed.

use chrono::Utc;
use redraft_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{now_rfc3339, parse_optional_timestamp, parse_timestamp, parse_uuid};
use crate::models::{Variant, VariantStatus};

const VARIANT_COLUMNS: &str = "variant_id, item_id, ordinal, title, body, status, \
                               error_message, created_at, completed_at";

/// Pre-create `count` variants in `generating` for an item
pub async fn create_for_item(pool: &SqlitePool, item_id: Uuid, count: usize) -> Result<Vec<Variant>> {
    let now = Utc::now();
    let mut created = Vec::with_capacity(count);
    let mut tx = pool.begin().await?;

    for ordinal in 0..count {
        let variant = Variant {
            variant_id: Uuid::new_v4(),
            item_id,
            ordinal,
            title: String::new(),
            body: String::new(),
            status: VariantStatus::Generating,
            error_message: None,
            created_at: now,
            completed_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO variants (variant_id, item_id, ordinal, title, body, status, created_at)
            VALUES (?, ?, ?, '', '', 'generating', ?)
            "#,
        )
        .bind(variant.variant_id.to_string())
        .bind(item_id.to_string())
        .bind(ordinal as i64)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        created.push(variant);
    }

    tx.commit().await?;
    Ok(created)
}

/// Finalize a generating variant with its parsed content
pub async fn complete(pool: &SqlitePool, variant_id: Uuid, title: &str, body: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE variants SET status = 'completed', title = ?, body = ?, completed_at = ?
        WHERE variant_id = ? AND status = 'generating'
        "#,
    )
    .bind(title)
    .bind(body)
    .bind(now_rfc3339())
    .bind(variant_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Fail a generating variant
pub async fn fail(pool: &SqlitePool, variant_id: Uuid, error_message: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE variants SET status = 'failed', error_message = ?, completed_at = ?
        WHERE variant_id = ? AND status = 'generating'
        "#,
    )
    .bind(error_message)
    .bind(now_rfc3339())
    .bind(variant_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Fail whatever is still generating for an item
pub async fn fail_generating_for_item(
    pool: &SqlitePool,
    item_id: Uuid,
    error_message: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE variants SET status = 'failed', error_message = ?, completed_at = ?
        WHERE item_id = ? AND status = 'generating'
        "#,
    )
    .bind(error_message)
    .bind(now_rfc3339())
    .bind(item_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Close variants still generating under items that are already terminal
///
/// The variant inherits its item's error text, or `fallback` if the item has none.
pub async fn fail_generating_for_terminal_items(
    pool: &SqlitePool,
    task_id: Uuid,
    fallback: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE variants
        SET status = 'failed',
            error_message = COALESCE(
                (SELECT i.error_message FROM items i WHERE i.item_id = variants.item_id),
                ?
            ),
            completed_at = ?
        WHERE status = 'generating'
          AND item_id IN (
              SELECT item_id FROM items
              WHERE task_id = ? AND status IN ('completed', 'failed')
          )
        "#,
    )
    .bind(fallback)
    .bind(now_rfc3339())
    .bind(task_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Drop an item's variants so an interrupted item can be regenerated
pub async fn delete_for_item(pool: &SqlitePool, item_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM variants WHERE item_id = ?")
        .bind(item_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn load_for_item(pool: &SqlitePool, item_id: Uuid) -> Result<Vec<Variant>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM variants WHERE item_id = ? ORDER BY ordinal",
        VARIANT_COLUMNS
    ))
    .bind(item_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(variant_from_row).collect()
}

/// All variants of a task's items, ordered by item ordinal then variant ordinal
pub async fn load_for_task(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Variant>> {
    let rows = sqlx::query(
        r#"
        SELECT v.variant_id, v.item_id, v.ordinal, v.title, v.body, v.status,
               v.error_message, v.created_at, v.completed_at
        FROM variants v
        JOIN items i ON i.item_id = v.item_id
        WHERE i.task_id = ?
        ORDER BY i.ordinal, v.ordinal
        "#,
    )
    .bind(task_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(variant_from_row).collect()
}

fn variant_from_row(row: &SqliteRow) -> Result<Variant> {
    let variant_id: String = row.get("variant_id");
    let item_id: String = row.get("item_id");
    let ordinal: i64 = row.get("ordinal");
    let status: String = row.get("status");
    let status = VariantStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown variant status: {}", status)))?;
    let created_at: String = row.get("created_at");

    Ok(Variant {
        variant_id: parse_uuid(&variant_id, "variant_id")?,
        item_id: parse_uuid(&item_id, "item_id")?,
        ordinal: ordinal as usize,
        title: row.get("title"),
        body: row.get("body"),
        status,
        error_message: row.get("error_message"),
        created_at: parse_timestamp(&created_at, "created_at")?,
        completed_at: parse_optional_timestamp(row.get("completed_at"), "completed_at")?,
    })
}
