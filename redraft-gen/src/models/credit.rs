//! Credit ledger records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditKind {
    /// Charged at submission
    Consume,
    /// Returned for failed items
    Refund,
    /// Administrative top-up
    Grant,
}

impl CreditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditKind::Consume => "consume",
            CreditKind::Refund => "refund",
            CreditKind::Grant => "grant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "consume" => Some(CreditKind::Consume),
            "refund" => Some(CreditKind::Refund),
            "grant" => Some(CreditKind::Grant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub transaction_id: Uuid,
    pub owner: String,
    pub amount: i64,
    pub kind: CreditKind,
    pub reason: String,
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
