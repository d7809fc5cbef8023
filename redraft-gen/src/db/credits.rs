//! Credit balances and the transaction log
//!
//! Balances only change through `balance = balance ± ?` statements, each paired
//! with its transaction row inside one SQL transaction.

use redraft_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{now_rfc3339, parse_timestamp, parse_uuid};
use crate::models::{CreditKind, CreditTransaction};

const TX_COLUMNS: &str = "transaction_id, owner, amount, kind, reason, task_id, created_at";

/// Current balance (0 for owners that never had credits)
pub async fn balance(pool: &SqlitePool, owner: &str) -> Result<i64> {
    let balance: Option<i64> =
        sqlx::query_scalar("SELECT balance FROM credit_balances WHERE owner = ?")
            .bind(owner)
            .fetch_optional(pool)
            .await?;

    Ok(balance.unwrap_or(0))
}

/// Conditionally decrement the balance
///
/// Returns the remaining balance, or `None` when the balance does not cover
/// `amount` (nothing is written in that case).
pub async fn consume(
    pool: &SqlitePool,
    owner: &str,
    amount: i64,
    reason: &str,
    task_id: Option<Uuid>,
) -> Result<Option<i64>> {
    let now = now_rfc3339();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE credit_balances SET balance = balance - ?, updated_at = ?
        WHERE owner = ? AND balance >= ?
        "#,
    )
    .bind(amount)
    .bind(&now)
    .bind(owner)
    .bind(amount)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    insert_transaction(&mut tx, owner, amount, CreditKind::Consume, reason, task_id, &now).await?;

    let remaining: i64 = sqlx::query_scalar("SELECT balance FROM credit_balances WHERE owner = ?")
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(remaining))
}

/// Return credits for a task
///
/// The amount is clamped to what was consumed for the task minus what has
/// already been refunded for it. Returns `(refunded, new_balance)`; a clamped
/// amount of 0 writes nothing.
pub async fn refund(
    pool: &SqlitePool,
    owner: &str,
    amount: i64,
    reason: &str,
    task_id: Uuid,
) -> Result<(i64, i64)> {
    let now = now_rfc3339();
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN kind = 'consume' THEN amount ELSE 0 END), 0) AS consumed,
            COALESCE(SUM(CASE WHEN kind = 'refund' THEN amount ELSE 0 END), 0) AS refunded
        FROM credit_transactions
        WHERE task_id = ? AND owner = ?
        "#,
    )
    .bind(task_id.to_string())
    .bind(owner)
    .fetch_one(&mut *tx)
    .await?;

    let consumed: i64 = row.get("consumed");
    let refunded: i64 = row.get("refunded");
    let refundable = (consumed - refunded).max(0);
    let amount = amount.min(refundable);

    if amount <= 0 {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM credit_balances WHERE owner = ?")
                .bind(owner)
                .fetch_optional(&mut *tx)
                .await?;
        tx.rollback().await?;
        return Ok((0, current.unwrap_or(0)));
    }

    let new_balance = increment(&mut tx, owner, amount, &now).await?;
    insert_transaction(&mut tx, owner, amount, CreditKind::Refund, reason, Some(task_id), &now)
        .await?;

    tx.commit().await?;
    Ok((amount, new_balance))
}

/// Administrative top-up; returns the new balance
pub async fn grant(pool: &SqlitePool, owner: &str, amount: i64, reason: &str) -> Result<i64> {
    let now = now_rfc3339();
    let mut tx = pool.begin().await?;

    let new_balance = increment(&mut tx, owner, amount, &now).await?;
    insert_transaction(&mut tx, owner, amount, CreditKind::Grant, reason, None, &now).await?;

    tx.commit().await?;
    Ok(new_balance)
}

/// An owner's transactions, newest first
pub async fn transactions_for_owner(pool: &SqlitePool, owner: &str) -> Result<Vec<CreditTransaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM credit_transactions WHERE owner = ? ORDER BY created_at DESC, rowid DESC",
        TX_COLUMNS
    ))
    .bind(owner)
    .fetch_all(pool)
    .await?;

    rows.iter().map(transaction_from_row).collect()
}

/// Transactions linked to one task, oldest first
pub async fn transactions_for_task(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<CreditTransaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM credit_transactions WHERE task_id = ? ORDER BY created_at, rowid",
        TX_COLUMNS
    ))
    .bind(task_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(transaction_from_row).collect()
}

async fn increment(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    owner: &str,
    amount: i64,
    now: &str,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO credit_balances (owner, balance, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(owner) DO UPDATE SET
            balance = balance + excluded.balance,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(owner)
    .bind(amount)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let balance: i64 = sqlx::query_scalar("SELECT balance FROM credit_balances WHERE owner = ?")
        .bind(owner)
        .fetch_one(&mut **tx)
        .await?;

    Ok(balance)
}

async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    owner: &str,
    amount: i64,
    kind: CreditKind,
    reason: &str,
    task_id: Option<Uuid>,
    now: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO credit_transactions (transaction_id, owner, amount, kind, reason, task_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(owner)
    .bind(amount)
    .bind(kind.as_str())
    .bind(reason)
    .bind(task_id.map(|id| id.to_string()))
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn transaction_from_row(row: &SqliteRow) -> Result<CreditTransaction> {
    let transaction_id: String = row.get("transaction_id");
    let kind: String = row.get("kind");
    let kind = CreditKind::parse(&kind)
        .ok_or_else(|| Error::Internal(format!("Unknown credit kind: {}", kind)))?;
    let task_id: Option<String> = row.get("task_id");
    let created_at: String = row.get("created_at");

    Ok(CreditTransaction {
        transaction_id: parse_uuid(&transaction_id, "transaction_id")?,
        owner: row.get("owner"),
        amount: row.get("amount"),
        kind,
        reason: row.get("reason"),
        task_id: task_id.map(|id| parse_uuid(&id, "task_id")).transpose()?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}
