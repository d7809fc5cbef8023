//! Configuration resolution for redraft-gen
//!
//! Secrets follow Database → ENV → TOML priority.

use redraft_common::config::TomlConfig;
use redraft_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Environment variable holding the generation API key
pub const GENERATION_API_KEY_ENV: &str = "REDRAFT_GENERATION_API_KEY";

/// Resolve the generation API key
///
/// Returns `Ok(None)` when no source has a usable key; the service still
/// starts, and item jobs fail with a configuration message until one is set.
pub async fn resolve_generation_api_key(
    db: &SqlitePool,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_setting(db, crate::db::settings::GENERATION_API_KEY)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(GENERATION_API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .generation
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "Generation API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("Generation API key loaded from database");
        return Ok(Some(key));
    }
    if let Some(key) = env_key {
        info!("Generation API key loaded from environment variable");
        return Ok(Some(key));
    }
    if let Some(key) = toml_key {
        info!("Generation API key loaded from TOML config");
        return Ok(Some(key));
    }

    warn!(
        "Generation API key not configured. Set settings.{} in the database, \
         {} in the environment, or [generation] api_key in the TOML config",
        crate::db::settings::GENERATION_API_KEY,
        GENERATION_API_KEY_ENV
    );
    Ok(None)
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
