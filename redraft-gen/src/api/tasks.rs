//! Task endpoints: submit, start, status, list

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info};
use uuid::Uuid;

use crate::db;
use crate::db::items::ItemCounts;
use crate::models::{Item, Task, TaskConfig, Variant};
use crate::services::{StartAck, SubmissionItem, TaskOrchestrator};
use crate::{ApiError, ApiResult, AppState};

/// POST /tasks request
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub owner: String,
    #[serde(default)]
    pub name: Option<String>,
    pub items: Vec<SubmissionItem>,
    pub config: TaskConfig,
}

/// POST /tasks response
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: Uuid,
    pub item_count: usize,
    pub credits_charged: i64,
    pub remaining_balance: i64,
}

/// POST /tasks/:task_id/start request
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner: String,
}

/// Item with its variants
#[derive(Debug, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub variants: Vec<Variant>,
}

/// GET /tasks/:task_id response
#[derive(Debug, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub item_counts: ItemCounts,
    pub items: Vec<ItemDetail>,
}

/// One row of GET /tasks
#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub task_id: Uuid,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub item_counts: ItemCounts,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskSummary>,
}

/// POST /tasks
///
/// Validates, charges `items × unit_cost` against a fresh task id, then
/// persists the task. Credits are returned if persistence fails.
pub async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let owner = request.owner.trim().to_string();
    if owner.is_empty() {
        return Err(ApiError::BadRequest("owner is required".to_string()));
    }
    TaskOrchestrator::validate_submission(&request.items, &request.config)?;

    let task_id = Uuid::new_v4();
    let item_count = request.items.len();
    let cost = item_count as i64 * state.orchestrator.unit_cost();

    let remaining_balance = if cost > 0 {
        let reason = format!("rewrite of {} item(s)", item_count);
        state
            .ledger
            .consume(&owner, cost, &reason, Some(task_id))
            .await?
            .remaining
    } else {
        state.ledger.balance(&owner).await?
    };

    let submitted = state
        .orchestrator
        .submit(task_id, &owner, request.name, request.items, request.config)
        .await;

    if let Err(e) = submitted {
        error!(task_id = %task_id, owner = %owner, error = %e, "Task submission failed");
        state.record_error(format!("submit failed: {}", e)).await;
        if cost > 0 {
            if let Err(refund_err) = state
                .ledger
                .refund(&owner, cost, "submission could not be saved", task_id)
                .await
            {
                error!(task_id = %task_id, error = %refund_err, "Refund after failed submission failed");
            }
        }
        return Err(e.into());
    }

    info!(task_id = %task_id, owner = %owner, item_count, cost, "Task accepted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            task_id,
            item_count,
            credits_charged: cost,
            remaining_balance,
        }),
    ))
}

/// POST /tasks/:task_id/start
pub async fn start_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<StartRequest>,
) -> ApiResult<(StatusCode, Json<StartAck>)> {
    let ack = state.orchestrator.start(task_id, request.owner.trim()).await?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// GET /tasks/:task_id?owner=
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<TaskDetail>> {
    let task = db::tasks::load_task(&state.db, task_id)
        .await?
        .filter(|t| t.owner == query.owner)
        .ok_or_else(|| ApiError::NotFound(format!("task {}", task_id)))?;

    let items = db::items::load_items_for_task(&state.db, task_id).await?;
    let variants = db::variants::load_for_task(&state.db, task_id).await?;
    let item_counts = db::items::count_by_status(&state.db, task_id).await?;

    let mut by_item: HashMap<Uuid, Vec<Variant>> = HashMap::new();
    for variant in variants {
        by_item.entry(variant.item_id).or_default().push(variant);
    }

    let items = items
        .into_iter()
        .map(|item| ItemDetail {
            variants: by_item.remove(&item.item_id).unwrap_or_default(),
            item,
        })
        .collect();

    Ok(Json(TaskDetail {
        task,
        item_counts,
        items,
    }))
}

/// GET /tasks?owner=
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<TaskListResponse>> {
    let tasks = db::tasks::list_tasks_for_owner(&state.db, &query.owner).await?;

    let mut summaries = Vec::with_capacity(tasks.len());
    for task in tasks {
        let item_counts = db::items::count_by_status(&state.db, task.task_id).await?;
        summaries.push(TaskSummary {
            task_id: task.task_id,
            name: task.name,
            status: task.status.to_string(),
            error_message: task.error_message,
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
            item_counts,
        });
    }

    Ok(Json(TaskListResponse { tasks: summaries }))
}

/// Build task routes
pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(submit_task).get(list_tasks))
        .route("/tasks/events", get(super::sse::task_event_stream))
        .route("/tasks/:task_id", get(get_task))
        .route("/tasks/:task_id/start", post(start_task))
}
