//! Event types and EventBus for redraft services
//!
//! Events are broadcast in-process and can be serialized for SSE transmission.
//! Persisted task/item/variant state stays the source of truth; events are a
//! best-effort progress feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Redraft event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RedraftEvent {
    /// Task moved to processing and its item jobs were scheduled
    TaskStarted {
        task_id: Uuid,
        owner: String,
        item_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// One item changed status
    ItemStatusChanged {
        task_id: Uuid,
        item_id: Uuid,
        status: String,
        /// Failure text for failed items
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Streamed text received for an item
    GenerationProgress {
        task_id: Uuid,
        item_id: Uuid,
        /// Characters accumulated so far
        received_chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// All items terminal, refunds reconciled
    TaskCompleted {
        task_id: Uuid,
        completed_items: usize,
        failed_items: usize,
        refunded_credits: i64,
        duration_seconds: u64,
        timestamp: DateTime<Utc>,
    },

    /// Orchestration failed before reaching the items
    TaskFailed {
        task_id: Uuid,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl RedraftEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RedraftEvent::TaskStarted { .. } => "TaskStarted",
            RedraftEvent::ItemStatusChanged { .. } => "ItemStatusChanged",
            RedraftEvent::GenerationProgress { .. } => "GenerationProgress",
            RedraftEvent::TaskCompleted { .. } => "TaskCompleted",
            RedraftEvent::TaskFailed { .. } => "TaskFailed",
        }
    }

    /// Task the event belongs to
    pub fn task_id(&self) -> Uuid {
        match self {
            RedraftEvent::TaskStarted { task_id, .. }
            | RedraftEvent::ItemStatusChanged { task_id, .. }
            | RedraftEvent::GenerationProgress { task_id, .. }
            | RedraftEvent::TaskCompleted { task_id, .. }
            | RedraftEvent::TaskFailed { task_id, .. } => *task_id,
        }
    }
}

/// Broadcast bus shared by the orchestrator, item jobs and SSE handlers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RedraftEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RedraftEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RedraftEvent,
    ) -> Result<usize, broadcast::error::SendError<RedraftEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RedraftEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
