//! Read-only progress views and push events.
//!
//! [`JobSnapshot`] is derived from the job under its lock, so it can never
//! observe an item transition apart from its counter update. The events are
//! advisory hints for push channels; polling a snapshot is always the
//! authoritative read path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::{BatchJob, ItemStatus, JobStatus};

/// Consistent point-in-time view of a job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub name: Option<String>,
    pub status: JobStatus,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    /// Share of items in a terminal state, in `[0, 100]`.
    pub progress_percentage: f64,
    /// Distinct providers assigned so far, in first-assignment order.
    pub providers_used: Vec<String>,
    pub estimated_cost_usd: f64,
    pub actual_cost_usd: f64,
    pub can_cancel: bool,
    pub can_retry_failed: bool,
}

impl JobSnapshot {
    pub fn of(job: &BatchJob) -> Self {
        let total = job.total_items();
        let done = job.completed_items + job.failed_items;
        let progress = if total == 0 {
            0.0
        } else {
            (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        Self {
            job_id: job.id,
            name: job.name.clone(),
            status: job.status,
            total_items: total,
            completed_items: job.completed_items,
            failed_items: job.failed_items,
            progress_percentage: progress,
            providers_used: job.providers_used(),
            estimated_cost_usd: job.estimated_cost_usd,
            actual_cost_usd: job.actual_cost_usd,
            can_cancel: matches!(job.status, JobStatus::Pending | JobStatus::Processing),
            can_retry_failed: job.status.is_terminal() && job.failed_items > 0,
        }
    }
}

/// Advisory event pushed after each item outcome and at job completion.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        job_id: Uuid,
        completed_items: usize,
        failed_items: usize,
        total_items: usize,
        item_index: usize,
        item_status: ItemStatus,
        provider: Option<String>,
    },
    Completed {
        job_id: Uuid,
        status: JobStatus,
        completed_items: usize,
        failed_items: usize,
        total_items: usize,
        actual_cost_usd: f64,
    },
}

impl ProgressEvent {
    pub fn progress(job: &BatchJob, item_index: usize) -> Self {
        let item = &job.items[item_index];
        ProgressEvent::Progress {
            job_id: job.id,
            completed_items: job.completed_items,
            failed_items: job.failed_items,
            total_items: job.total_items(),
            item_index,
            item_status: item.status,
            provider: item.provider.clone(),
        }
    }

    pub fn completed(job: &BatchJob) -> Self {
        ProgressEvent::Completed {
            job_id: job.id,
            status: job.status,
            completed_items: job.completed_items,
            failed_items: job.failed_items,
            total_items: job.total_items(),
            actual_cost_usd: job.actual_cost_usd,
        }
    }

    /// True when this is the completion event for `job_id`.
    pub fn is_completion_of(&self, job_id: Uuid) -> bool {
        matches!(self, ProgressEvent::Completed { job_id: id, .. } if *id == job_id)
    }
}
