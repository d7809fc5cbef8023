//! Task orchestrator
//!
//! Accepts batch submissions, starts them exactly once, fans item jobs out
//! through a worker pool shared by every running task, and reconciles
//! credits once all items are terminal.
//!
//! # Task run
//! 1. `start` moves the task to `processing` with a compare-and-swap and
//!    returns; the run continues on a spawned tokio task.
//! 2. Each pending item becomes a job in a `JoinSet`: random start jitter,
//!    then a semaphore permit, then [`ItemProcessor::process`].
//! 3. Jobs are joined individually. A panicking job fails only its own item.
//! 4. Aggregation fails leftovers, refunds failed items and completes the task.

use chrono::Utc;
use futures::FutureExt;
use rand::Rng;
use redraft_common::config::PipelineConfig;
use redraft_common::events::{EventBus, RedraftEvent};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::credit_ledger::CreditLedger;
use super::item_processor::{ItemOutcome, ItemProcessor};
use crate::db;
use crate::models::{Item, StagedContent, Task, TaskConfig, TaskStatus};
use crate::utils::retry_on_lock;

/// Failure text for items a run left unfinished
pub const ABORTED_MESSAGE: &str = "processing aborted";

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("task not found: {0}")]
    NotFound(Uuid),

    #[error("task is already processing")]
    AlreadyProcessing,

    #[error("task is already completed")]
    AlreadyCompleted,

    #[error("no fetch credential stored for owner {0}")]
    MissingFetchCredential(String),

    #[error("task has no pending items")]
    NoPendingItems,

    #[error(transparent)]
    Database(#[from] redraft_common::Error),
}

/// One entry of a batch submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionItem {
    #[serde(default)]
    pub reference: Option<String>,
    pub staged: StagedContent,
}

/// Acknowledgement returned by `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartAck {
    pub accepted: bool,
    pub item_count: usize,
}

pub struct TaskOrchestrator {
    pool: SqlitePool,
    processor: Arc<ItemProcessor>,
    ledger: CreditLedger,
    event_bus: EventBus,
    worker_slots: Arc<Semaphore>,
    jitter_max_ms: u64,
    unit_cost: i64,
    max_lock_wait_ms: u64,
}

impl TaskOrchestrator {
    pub fn new(
        pool: SqlitePool,
        processor: Arc<ItemProcessor>,
        ledger: CreditLedger,
        event_bus: EventBus,
        pipeline: &PipelineConfig,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            pool,
            processor,
            ledger,
            event_bus,
            worker_slots: Arc::new(Semaphore::new(pipeline.max_concurrent_items.max(1))),
            jitter_max_ms: pipeline.jitter_max_ms,
            unit_cost: pipeline.unit_cost,
            max_lock_wait_ms,
        }
    }

    /// Credits charged per submitted item
    pub fn unit_cost(&self) -> i64 {
        self.unit_cost
    }

    /// Reject the whole submission if any entry is unusable
    pub fn validate_submission(
        items: &[SubmissionItem],
        config: &TaskConfig,
    ) -> Result<(), OrchestratorError> {
        if items.is_empty() {
            return Err(OrchestratorError::Validation(
                "submission contains no items".to_string(),
            ));
        }

        if let Some(index) = items
            .iter()
            .position(|item| item.staged.source_id.trim().is_empty())
        {
            return Err(OrchestratorError::Validation(format!(
                "item {} is missing a staged source_id",
                index
            )));
        }

        if config.content_type.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "content_type is required".to_string(),
            ));
        }

        Ok(())
    }

    /// Persist a pending task with one pending item per entry
    ///
    /// `task_id` is chosen by the caller so credits can be charged against it
    /// before anything is written.
    pub async fn submit(
        &self,
        task_id: Uuid,
        owner: &str,
        name: Option<String>,
        items: Vec<SubmissionItem>,
        config: TaskConfig,
    ) -> Result<Task, OrchestratorError> {
        if owner.trim().is_empty() {
            return Err(OrchestratorError::Validation("owner is required".to_string()));
        }
        Self::validate_submission(&items, &config)?;

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Rewrite batch {}", Utc::now().format("%Y-%m-%d %H:%M")));

        let task = Task::new(task_id, owner.to_string(), name, config);
        let rows: Vec<Item> = items
            .into_iter()
            .enumerate()
            .map(|(ordinal, entry)| Item::new(task_id, ordinal, entry.reference, entry.staged))
            .collect();

        retry_on_lock("tasks.create_task_with_items", self.max_lock_wait_ms, || {
            db::tasks::create_task_with_items(&self.pool, &task, &rows)
        })
        .await?;

        info!(task_id = %task_id, owner = %owner, items = rows.len(), "Task submitted");
        Ok(task)
    }

    /// Begin processing a task; returns as soon as the run is scheduled
    pub async fn start(self: &Arc<Self>, task_id: Uuid, owner: &str) -> Result<StartAck, OrchestratorError> {
        let task = db::tasks::load_task(&self.pool, task_id)
            .await?
            .filter(|t| t.owner == owner)
            .ok_or(OrchestratorError::NotFound(task_id))?;

        match task.status {
            TaskStatus::Processing => return Err(OrchestratorError::AlreadyProcessing),
            TaskStatus::Completed => return Err(OrchestratorError::AlreadyCompleted),
            TaskStatus::Pending | TaskStatus::Failed => {}
        }

        let credential = db::credentials::get_credential(&self.pool, owner)
            .await?
            .ok_or_else(|| OrchestratorError::MissingFetchCredential(owner.to_string()))?;

        let pending = db::items::load_pending_items(&self.pool, task_id).await?;
        if pending.is_empty() {
            return Err(OrchestratorError::NoPendingItems);
        }

        let claimed = retry_on_lock("tasks.try_begin_processing", self.max_lock_wait_ms, || {
            db::tasks::try_begin_processing(&self.pool, task_id, owner)
        })
        .await?;
        if !claimed {
            return Err(OrchestratorError::AlreadyProcessing);
        }

        info!(task_id = %task_id, owner = %owner, items = pending.len(), "Task started");
        self.spawn_run(task, credential, pending.len());

        Ok(StartAck {
            accepted: true,
            item_count: pending.len(),
        })
    }

    /// Continue a task that is already `processing` (startup recovery)
    pub fn resume(self: &Arc<Self>, task: Task, credential: String, pending_items: usize) {
        info!(task_id = %task.task_id, items = pending_items, "Resuming interrupted task");
        self.spawn_run(task, credential, pending_items);
    }

    fn spawn_run(self: &Arc<Self>, task: Task, credential: String, item_count: usize) {
        self.event_bus.emit_lossy(RedraftEvent::TaskStarted {
            task_id: task.task_id,
            owner: task.owner.clone(),
            item_count,
            timestamp: Utc::now(),
        });

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run(task, credential).await;
        });
    }

    /// Process every pending item of a `processing` task, then aggregate
    pub async fn run(&self, task: Task, credential: String) {
        let started = Instant::now();
        let task_id = task.task_id;

        let items = match db::items::load_pending_items(&self.pool, task_id).await {
            Ok(items) => items,
            Err(e) => {
                self.fail_task(task_id, &format!("failed to load items: {}", e)).await;
                return;
            }
        };

        let config = Arc::new(task.config.clone());
        let credential = Arc::new(credential);
        let mut jobs = JoinSet::new();

        for item in items {
            let processor = Arc::clone(&self.processor);
            let slots = Arc::clone(&self.worker_slots);
            let config = Arc::clone(&config);
            let credential = Arc::clone(&credential);
            let jitter = self.jitter();
            let item_id = item.item_id;

            let job = async move {
                if !jitter.is_zero() {
                    tokio::time::sleep(jitter).await;
                }
                let _permit = match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ItemOutcome::Failed("worker pool closed".to_string()),
                };
                processor.process(&item, &config, &credential).await
            };

            jobs.spawn(async move { (item_id, AssertUnwindSafe(job).catch_unwind().await) });
        }

        let mut completed = 0usize;
        let mut failed = 0usize;
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok((_, Ok(ItemOutcome::Completed { .. }))) => completed += 1,
                Ok((_, Ok(ItemOutcome::Failed(_)))) => failed += 1,
                Ok((item_id, Ok(ItemOutcome::Skipped))) => {
                    debug!(task_id = %task_id, item_id = %item_id, "Item job skipped");
                }
                Ok((item_id, Err(_))) => {
                    failed += 1;
                    error!(task_id = %task_id, item_id = %item_id, "Item job panicked");
                    self.fail_panicked_item(item_id).await;
                }
                Err(e) => {
                    error!(task_id = %task_id, error = %e, "Item job could not be joined");
                }
            }
        }

        debug!(task_id = %task_id, completed, failed, "All item jobs joined");

        if let Err(e) = self.finalize(&task, started).await {
            self.fail_task(task_id, &format!("aggregation failed: {}", e)).await;
        }
    }

    /// Fail leftovers, refund failed items and complete the task
    pub async fn finalize(&self, task: &Task, started: Instant) -> Result<(), OrchestratorError> {
        let task_id = task.task_id;

        let aborted = retry_on_lock("items.fail_unfinished", self.max_lock_wait_ms, || {
            db::items::fail_unfinished_for_task(&self.pool, task_id, ABORTED_MESSAGE)
        })
        .await?;
        if aborted > 0 {
            warn!(task_id = %task_id, aborted, "Unfinished items marked failed");
        }

        // Terminal items never keep generating variants, however they got there
        let closed = retry_on_lock("variants.fail_for_terminal_items", self.max_lock_wait_ms, || {
            db::variants::fail_generating_for_terminal_items(&self.pool, task_id, ABORTED_MESSAGE)
        })
        .await?;
        if closed > 0 {
            warn!(task_id = %task_id, closed, "Closed variants left generating");
        }

        let counts = db::items::count_by_status(&self.pool, task_id).await?;
        let refund_amount = counts.failed as i64 * self.unit_cost;

        let mut refunded = 0;
        if refund_amount > 0 {
            let reason = format!(
                "refund for {} failed item(s) of task {} ({})",
                counts.failed, task_id, task.name
            );
            match self.ledger.refund(&task.owner, refund_amount, &reason, task_id).await {
                Ok(receipt) => refunded = receipt.refunded,
                Err(e) => {
                    error!(task_id = %task_id, amount = refund_amount, error = %e, "Refund failed");
                }
            }
        }

        let marked = retry_on_lock("tasks.mark_completed", self.max_lock_wait_ms, || {
            db::tasks::mark_completed(&self.pool, task_id)
        })
        .await?;
        if !marked {
            warn!(task_id = %task_id, "Task was not processing at aggregation time");
        }

        let duration_seconds = started.elapsed().as_secs();
        info!(
            task_id = %task_id,
            completed = counts.completed,
            failed = counts.failed,
            refunded,
            duration_seconds,
            "Task completed"
        );

        self.event_bus.emit_lossy(RedraftEvent::TaskCompleted {
            task_id,
            completed_items: counts.completed,
            failed_items: counts.failed,
            refunded_credits: refunded,
            duration_seconds,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    async fn fail_panicked_item(&self, item_id: Uuid) {
        let message = "item processing panicked";
        let result = async {
            db::variants::fail_generating_for_item(&self.pool, item_id, message).await?;
            db::items::mark_failed(&self.pool, item_id, message).await
        }
        .await;

        if let Err(e) = result {
            error!(item_id = %item_id, error = %e, "Failed to mark panicked item failed");
        }
    }

    async fn fail_task(&self, task_id: Uuid, message: &str) {
        error!(task_id = %task_id, error = %message, "Task orchestration failed");

        if let Err(e) = db::tasks::mark_failed(&self.pool, task_id, message).await {
            error!(task_id = %task_id, error = %e, "Failed to mark task failed");
        }

        self.event_bus.emit_lossy(RedraftEvent::TaskFailed {
            task_id,
            error_message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn jitter(&self) -> Duration {
        if self.jitter_max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_max_ms))
    }
}
