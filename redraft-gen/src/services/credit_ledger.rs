//! Credit ledger
//!
//! Per-owner credit balance with an append-only transaction log. Every
//! mutation runs through `retry_on_lock` because consume and refund can race
//! with item jobs writing to the same database.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::models::CreditTransaction;
use crate::utils::retry_on_lock;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("credit amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error(transparent)]
    Database(#[from] redraft_common::Error),
}

/// Successful consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeReceipt {
    pub consumed: i64,
    pub remaining: i64,
}

/// Outcome of a refund after clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundReceipt {
    pub refunded: i64,
    pub new_balance: i64,
}

/// SQLite-backed credit ledger
#[derive(Clone)]
pub struct CreditLedger {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl CreditLedger {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    /// Charge `amount` credits; fails without side effects if the balance is short
    pub async fn consume(
        &self,
        owner: &str,
        amount: i64,
        reason: &str,
        task_id: Option<Uuid>,
    ) -> Result<ConsumeReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let remaining = retry_on_lock("credits.consume", self.max_lock_wait_ms, || {
            db::credits::consume(&self.pool, owner, amount, reason, task_id)
        })
        .await?;

        match remaining {
            Some(remaining) => {
                info!(owner = %owner, amount, remaining, "Credits consumed");
                Ok(ConsumeReceipt {
                    consumed: amount,
                    remaining,
                })
            }
            None => {
                let available = self.balance(owner).await?;
                Err(LedgerError::InsufficientBalance {
                    required: amount,
                    available,
                })
            }
        }
    }

    /// Return credits consumed for `task_id`
    ///
    /// Never refunds more than was consumed for the task minus earlier refunds;
    /// the receipt reports the clamped amount.
    pub async fn refund(
        &self,
        owner: &str,
        amount: i64,
        reason: &str,
        task_id: Uuid,
    ) -> Result<RefundReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let (refunded, new_balance) = retry_on_lock("credits.refund", self.max_lock_wait_ms, || {
            db::credits::refund(&self.pool, owner, amount, reason, task_id)
        })
        .await?;

        if refunded < amount {
            warn!(
                owner = %owner,
                task_id = %task_id,
                requested = amount,
                refunded,
                "Refund clamped to credits consumed for the task"
            );
        } else {
            info!(owner = %owner, task_id = %task_id, refunded, new_balance, "Credits refunded");
        }

        Ok(RefundReceipt {
            refunded,
            new_balance,
        })
    }

    /// Administrative top-up; returns the new balance
    pub async fn grant(&self, owner: &str, amount: i64, reason: &str) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let balance = retry_on_lock("credits.grant", self.max_lock_wait_ms, || {
            db::credits::grant(&self.pool, owner, amount, reason)
        })
        .await?;

        info!(owner = %owner, amount, balance, "Credits granted");
        Ok(balance)
    }

    pub async fn balance(&self, owner: &str) -> Result<i64, LedgerError> {
        Ok(db::credits::balance(&self.pool, owner).await?)
    }

    pub async fn transactions(&self, owner: &str) -> Result<Vec<CreditTransaction>, LedgerError> {
        Ok(db::credits::transactions_for_owner(&self.pool, owner).await?)
    }

    pub async fn transactions_for_task(&self, task_id: Uuid) -> Result<Vec<CreditTransaction>, LedgerError> {
        Ok(db::credits::transactions_for_task(&self.pool, task_id).await?)
    }
}
