//! Variant model: one generated rewrite of an item

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    Generating,
    Completed,
    Failed,
}

impl VariantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantStatus::Generating => "generating",
            VariantStatus::Completed => "completed",
            VariantStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "generating" => Some(VariantStatus::Generating),
            "completed" => Some(VariantStatus::Completed),
            "failed" => Some(VariantStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub variant_id: Uuid,
    pub item_id: Uuid,
    /// 0..N-1
    pub ordinal: usize,
    pub title: String,
    pub body: String,
    pub status: VariantStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
