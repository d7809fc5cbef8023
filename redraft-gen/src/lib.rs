//! redraft-gen library interface
//!
//! Exposes the services, repositories and router for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use redraft_common::config::TomlConfig;
use redraft_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::services::{
    ContentFetcher, CreditLedger, ItemProcessor, ReferenceGate, TaskOrchestrator, TextGenerator,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub orchestrator: Arc<TaskOrchestrator>,
    pub ledger: CreditLedger,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire the services together from configuration and injected collaborators
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: &TomlConfig,
        generator: Arc<dyn TextGenerator>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Result<Self, redraft_common::Error> {
        let pipeline = &config.pipeline;
        let max_lock_wait_ms = config.database.max_lock_wait_ms;

        let gate = ReferenceGate::new(&pipeline.allowed_domains).map_err(|e| {
            redraft_common::Error::Config(format!("Invalid pipeline.allowed_domains: {}", e))
        })?;

        if pipeline.variants_per_item == 0 {
            return Err(redraft_common::Error::Config(
                "pipeline.variants_per_item must be at least 1".to_string(),
            ));
        }
        if pipeline.unit_cost < 0 {
            return Err(redraft_common::Error::Config(
                "pipeline.unit_cost must not be negative".to_string(),
            ));
        }

        let processor = Arc::new(ItemProcessor::new(
            db.clone(),
            generator,
            fetcher,
            gate,
            event_bus.clone(),
            pipeline.variants_per_item,
            pipeline.item_success_policy,
            max_lock_wait_ms,
        ));
        let ledger = CreditLedger::new(db.clone(), max_lock_wait_ms);
        let orchestrator = Arc::new(TaskOrchestrator::new(
            db.clone(),
            processor,
            ledger.clone(),
            event_bus.clone(),
            pipeline,
            max_lock_wait_ms,
        ));

        Ok(Self {
            db,
            event_bus,
            orchestrator,
            ledger,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        })
    }

    /// Remember an error for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::task_routes())
        .merge(api::credit_routes())
        .merge(api::health_routes())
        .with_state(state)
}
