//! Per-owner credential for the content-detail fetch service

use redraft_common::Result;
use sqlx::SqlitePool;

/// Store (or replace) the owner's fetch credential
pub async fn set_credential(pool: &SqlitePool, owner: &str, credential: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO fetch_credentials (owner, credential, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(owner) DO UPDATE SET
            credential = excluded.credential,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(owner)
    .bind(credential)
    .bind(super::now_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the owner's fetch credential; blank values count as missing
pub async fn get_credential(pool: &SqlitePool, owner: &str) -> Result<Option<String>> {
    let credential: Option<String> =
        sqlx::query_scalar("SELECT credential FROM fetch_credentials WHERE owner = ?")
            .bind(owner)
            .fetch_optional(pool)
            .await?;

    Ok(credential.filter(|c| !c.trim().is_empty()))
}
