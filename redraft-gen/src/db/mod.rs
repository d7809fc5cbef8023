//! Database access for redraft-gen
//!
//! Plain functions over an injected `SqlitePool`. Every status change is a
//! guarded UPDATE so terminal rows are never rewritten.

pub mod credentials;
pub mod credits;
pub mod items;
pub mod settings;
pub mod tasks;
pub mod variants;

use chrono::{DateTime, Utc};
use redraft_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
    column: &str,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_timestamp(&s, column)).transpose()
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
