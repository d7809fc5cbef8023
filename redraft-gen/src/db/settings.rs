//! Key/value settings (database configuration tier)

use redraft_common::Result;
use sqlx::SqlitePool;

/// Settings key holding the generation backend API key
pub const GENERATION_API_KEY: &str = "generation_api_key";

/// Read a setting; NULL and missing rows are both `None`
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Insert or replace a setting
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(super::now_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
