//! Item model: one source document within a task

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Item status (terminal once completed or failed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ItemStatus::Pending),
            "processing" => Some(ItemStatus::Processing),
            "completed" => Some(ItemStatus::Completed),
            "failed" => Some(ItemStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal content captured when the item was selected for rewriting
///
/// Used as the fallback source when the content-detail fetch fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagedContent {
    /// Identifier of the source document on its platform
    pub source_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl StagedContent {
    /// True if the staged payload carries any usable text
    pub fn has_text(&self) -> bool {
        let non_blank = |s: &Option<String>| s.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false);
        non_blank(&self.title) || non_blank(&self.body)
    }
}

/// One source document destined to produce N variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub item_id: Uuid,
    pub task_id: Uuid,
    /// Position within the submission
    pub ordinal: usize,
    /// Link to the source document (may be absent or invalid)
    pub reference: Option<String>,
    pub staged: StagedContent,
    pub status: ItemStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(task_id: Uuid, ordinal: usize, reference: Option<String>, staged: StagedContent) -> Self {
        let now = Utc::now();
        Self {
            item_id: Uuid::new_v4(),
            task_id,
            ordinal,
            reference,
            staged,
            status: ItemStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
