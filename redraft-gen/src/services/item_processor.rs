//! Item processor
//!
//! Drives one item through reference check → content resolution → prompt →
//! streamed generation → variant persistence. Every outcome is written to the
//! database; the return value only tells the orchestrator what happened.

use async_trait::async_trait;
use chrono::Utc;
use redraft_common::config::ItemSuccessPolicy;
use redraft_common::events::{EventBus, RedraftEvent};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::content_fetcher::{ContentFetcher, SourceContent};
use super::generation_client::{GenerationError, GenerationHandler, TextGenerator};
use super::prompt_builder::{build_messages, ReferenceGate};
use super::result_parser::parse_variants;
use crate::db;
use crate::models::{Item, ItemStatus, TaskConfig, Variant};
use crate::utils::retry_on_lock;

/// What happened to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed { variants_completed: usize },
    Failed(String),
    /// The item was no longer pending when the job reached it
    Skipped,
}

/// Shared collaborators for item jobs
pub struct ItemProcessor {
    pool: SqlitePool,
    generator: Arc<dyn TextGenerator>,
    fetcher: Arc<dyn ContentFetcher>,
    gate: ReferenceGate,
    event_bus: EventBus,
    variants_per_item: usize,
    success_policy: ItemSuccessPolicy,
    max_lock_wait_ms: u64,
}

impl ItemProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        generator: Arc<dyn TextGenerator>,
        fetcher: Arc<dyn ContentFetcher>,
        gate: ReferenceGate,
        event_bus: EventBus,
        variants_per_item: usize,
        success_policy: ItemSuccessPolicy,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            pool,
            generator,
            fetcher,
            gate,
            event_bus,
            variants_per_item,
            success_policy,
            max_lock_wait_ms,
        }
    }

    /// Process one item to a terminal status
    pub async fn process(&self, item: &Item, config: &TaskConfig, credential: &str) -> ItemOutcome {
        let claimed = retry_on_lock("items.mark_processing", self.max_lock_wait_ms, || {
            db::items::mark_processing(&self.pool, item.item_id)
        })
        .await;

        match claimed {
            Ok(true) => {}
            Ok(false) => {
                debug!(item_id = %item.item_id, "Item no longer pending, skipping");
                return ItemOutcome::Skipped;
            }
            Err(e) => {
                error!(item_id = %item.item_id, error = %e, "Failed to claim item");
                return ItemOutcome::Failed(e.to_string());
            }
        }
        self.emit_status(item, ItemStatus::Processing, None);

        match self.run(item, config, credential).await {
            Ok(variants_completed) => {
                self.finish_completed(item).await;
                info!(
                    task_id = %item.task_id,
                    item_id = %item.item_id,
                    variants_completed,
                    "Item completed"
                );
                ItemOutcome::Completed { variants_completed }
            }
            Err(message) => {
                self.finish_failed(item, &message).await;
                warn!(
                    task_id = %item.task_id,
                    item_id = %item.item_id,
                    error = %message,
                    "Item failed"
                );
                ItemOutcome::Failed(message)
            }
        }
    }

    /// Steps after the item is claimed; `Err` carries the item's failure text
    async fn run(&self, item: &Item, config: &TaskConfig, credential: &str) -> Result<usize, String> {
        let reference = self
            .gate
            .check(item.reference.as_deref())
            .map_err(|e| e.to_string())?;

        let content = self.resolve_content(item, reference, credential).await?;
        let messages = build_messages(&content, config, self.variants_per_item);

        let variants = retry_on_lock("variants.create_for_item", self.max_lock_wait_ms, || {
            db::variants::create_for_item(&self.pool, item.item_id, self.variants_per_item)
        })
        .await
        .map_err(|e| format!("failed to create variants: {}", e))?;

        if variants.is_empty() {
            return Err("no variants could be created".to_string());
        }

        let writer = VariantWriter::new(
            self.pool.clone(),
            self.event_bus.clone(),
            item.task_id,
            item.item_id,
            variants,
            self.max_lock_wait_ms,
        );

        match self.generator.generate(&messages, &writer).await {
            Ok(_) => {}
            Err(e @ GenerationError::Stream(_)) => {
                // on_error already failed the generating variants
                return Err(e.to_string());
            }
            Err(e) => {
                let message = e.to_string();
                writer.fail_remaining(&message).await;
                return Err(message);
            }
        }

        let expected = writer.variant_count();
        let completed = writer.completed();
        match self.success_policy {
            ItemSuccessPolicy::AnyVariant if completed > 0 => Ok(completed),
            ItemSuccessPolicy::AnyVariant => {
                let reason = writer
                    .last_failure()
                    .await
                    .unwrap_or_else(|| "empty generation output".to_string());
                Err(format!("no variant was generated: {}", reason))
            }
            ItemSuccessPolicy::AllVariants if completed == expected => Ok(completed),
            ItemSuccessPolicy::AllVariants => Err(format!(
                "only {} of {} variants were generated",
                completed, expected
            )),
        }
    }

    /// Full document from the fetcher, falling back to the staged payload
    async fn resolve_content(
        &self,
        item: &Item,
        reference: &str,
        credential: &str,
    ) -> Result<SourceContent, String> {
        match self.fetcher.fetch_detail(reference, credential).await {
            Ok(content) if content.has_text() => return Ok(content),
            Ok(_) => {
                warn!(item_id = %item.item_id, "Content detail was empty, using staged content");
            }
            Err(e) => {
                warn!(item_id = %item.item_id, error = %e, "Content fetch failed, using staged content");
            }
        }

        let staged = SourceContent::from_staged(&item.staged);
        if staged.has_text() {
            Ok(staged)
        } else {
            Err("empty source data".to_string())
        }
    }

    async fn finish_completed(&self, item: &Item) {
        let result = retry_on_lock("items.mark_completed", self.max_lock_wait_ms, || {
            db::items::mark_completed(&self.pool, item.item_id)
        })
        .await;

        match result {
            Ok(_) => self.emit_status(item, ItemStatus::Completed, None),
            Err(e) => error!(item_id = %item.item_id, error = %e, "Failed to mark item completed"),
        }
    }

    async fn finish_failed(&self, item: &Item, message: &str) {
        if let Err(e) = retry_on_lock("variants.fail_generating", self.max_lock_wait_ms, || {
            db::variants::fail_generating_for_item(&self.pool, item.item_id, message)
        })
        .await
        {
            error!(item_id = %item.item_id, error = %e, "Failed to close generating variants");
        }

        let result = retry_on_lock("items.mark_failed", self.max_lock_wait_ms, || {
            db::items::mark_failed(&self.pool, item.item_id, message)
        })
        .await;

        match result {
            Ok(_) => self.emit_status(item, ItemStatus::Failed, Some(message.to_string())),
            Err(e) => error!(item_id = %item.item_id, error = %e, "Failed to mark item failed"),
        }
    }

    fn emit_status(&self, item: &Item, status: ItemStatus, error_message: Option<String>) {
        self.event_bus.emit_lossy(RedraftEvent::ItemStatusChanged {
            task_id: item.task_id,
            item_id: item.item_id,
            status: status.to_string(),
            error_message,
            timestamp: Utc::now(),
        });
    }
}

/// Generation handler that persists parsed versions into pre-created variants
pub struct VariantWriter {
    pool: SqlitePool,
    event_bus: EventBus,
    task_id: Uuid,
    item_id: Uuid,
    variants: Vec<Variant>,
    max_lock_wait_ms: u64,
    received_chars: AtomicUsize,
    completed: AtomicUsize,
    last_failure: Mutex<Option<String>>,
}

impl VariantWriter {
    pub fn new(
        pool: SqlitePool,
        event_bus: EventBus,
        task_id: Uuid,
        item_id: Uuid,
        variants: Vec<Variant>,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            pool,
            event_bus,
            task_id,
            item_id,
            variants,
            max_lock_wait_ms,
            received_chars: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            last_failure: Mutex::new(None),
        }
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Variants persisted as completed so far
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub async fn last_failure(&self) -> Option<String> {
        self.last_failure.lock().await.clone()
    }

    /// Fail every variant of the item that is still generating
    pub async fn fail_remaining(&self, message: &str) {
        *self.last_failure.lock().await = Some(message.to_string());

        if let Err(e) = retry_on_lock("variants.fail_generating", self.max_lock_wait_ms, || {
            db::variants::fail_generating_for_item(&self.pool, self.item_id, message)
        })
        .await
        {
            error!(item_id = %self.item_id, error = %e, "Failed to mark variants failed");
        }
    }

    async fn fail_one(&self, variant: &Variant, message: &str) {
        *self.last_failure.lock().await = Some(message.to_string());

        if let Err(e) = retry_on_lock("variants.fail", self.max_lock_wait_ms, || {
            db::variants::fail(&self.pool, variant.variant_id, message)
        })
        .await
        {
            error!(variant_id = %variant.variant_id, error = %e, "Failed to mark variant failed");
        }
    }
}

#[async_trait]
impl GenerationHandler for VariantWriter {
    async fn on_chunk(&self, fragment: &str) {
        let chars = fragment.chars().count();
        let received = self.received_chars.fetch_add(chars, Ordering::SeqCst) + chars;

        self.event_bus.emit_lossy(RedraftEvent::GenerationProgress {
            task_id: self.task_id,
            item_id: self.item_id,
            received_chars: received,
            timestamp: Utc::now(),
        });
    }

    async fn on_complete(&self, full_text: &str) {
        let parsed = parse_variants(full_text);
        let expected = self.variants.len();
        let found = parsed.len().min(expected);

        debug!(
            item_id = %self.item_id,
            parsed = parsed.len(),
            expected,
            "Generation finished"
        );

        for (variant, version) in self.variants.iter().zip(parsed.iter()) {
            let result = retry_on_lock("variants.complete", self.max_lock_wait_ms, || {
                db::variants::complete(&self.pool, variant.variant_id, &version.title, &version.body)
            })
            .await;

            match result {
                Ok(true) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(false) => {
                    debug!(variant_id = %variant.variant_id, "Variant already finalized");
                }
                Err(e) => {
                    error!(variant_id = %variant.variant_id, error = %e, "Failed to store variant");
                    self.fail_one(variant, &format!("failed to store variant: {}", e))
                        .await;
                }
            }
        }

        if found < expected {
            let message = format!("generation returned only {} of {} versions", found, expected);
            for variant in &self.variants[found..] {
                self.fail_one(variant, &message).await;
            }
        }
    }

    async fn on_error(&self, message: &str) {
        self.fail_remaining(message).await;
    }
}
