//! Startup recovery sweep
//!
//! A task still `processing` when the service starts belongs to a run that
//! died with the previous process. Items it left in `processing` are put back
//! to `pending` (their partial variants dropped) and the run is resumed. With
//! `resume_interrupted = false`, or when the owner's fetch credential is gone,
//! the leftovers are failed instead and the task is finalized, which refunds
//! them.

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::task_orchestrator::{OrchestratorError, TaskOrchestrator};
use crate::db;
use crate::models::{Task, TaskStatus};

/// Message written on items failed by the sweep
pub const INTERRUPTED_MESSAGE: &str = "interrupted by service restart";

/// What the sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub resumed: usize,
    pub finalized: usize,
}

/// Reconcile every task left in `processing`
pub async fn recover_interrupted_tasks(
    pool: &SqlitePool,
    orchestrator: &Arc<TaskOrchestrator>,
    resume: bool,
) -> Result<RecoveryReport, OrchestratorError> {
    let tasks = db::tasks::list_tasks_with_status(pool, TaskStatus::Processing).await?;
    let mut report = RecoveryReport::default();

    if tasks.is_empty() {
        return Ok(report);
    }
    info!(count = tasks.len(), resume, "Found interrupted tasks");

    for task in tasks {
        let credential = if resume {
            db::credentials::get_credential(pool, &task.owner).await?
        } else {
            None
        };

        match credential {
            Some(credential) => {
                let pending = requeue_interrupted_items(pool, &task).await?;
                orchestrator.resume(task, credential, pending);
                report.resumed += 1;
            }
            None => {
                if resume {
                    warn!(
                        task_id = %task.task_id,
                        owner = %task.owner,
                        "No fetch credential for interrupted task, failing its items"
                    );
                }
                db::items::fail_unfinished_for_task(pool, task.task_id, INTERRUPTED_MESSAGE).await?;
                orchestrator.finalize(&task, Instant::now()).await?;
                report.finalized += 1;
            }
        }
    }

    info!(resumed = report.resumed, finalized = report.finalized, "Recovery sweep finished");
    Ok(report)
}

/// Put interrupted items back to pending; returns how many items are pending
async fn requeue_interrupted_items(pool: &SqlitePool, task: &Task) -> Result<usize, OrchestratorError> {
    let reset = db::items::reset_processing_to_pending(pool, task.task_id).await?;
    for item_id in &reset {
        db::variants::delete_for_item(pool, *item_id).await?;
    }
    if !reset.is_empty() {
        info!(task_id = %task.task_id, items = reset.len(), "Requeued interrupted items");
    }

    Ok(db::items::load_pending_items(pool, task.task_id).await?.len())
}
