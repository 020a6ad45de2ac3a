use thiserror::Error;
use uuid::Uuid;

use crate::batch::JobStatus;

/// Errors surfaced by the scheduler's operations.
///
/// Item-level generation failures never appear here: they are recorded on the
/// item, counted, and the job keeps going. Only submission-time, retry-time
/// and provider-configuration problems are hard failures.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed job submission (empty item list, zero concurrency,
    /// unknown strategy, out-of-range retry index).
    #[error("invalid submission: {0}")]
    Validation(String),

    /// No usable provider for the chosen strategy. Fatal for the whole job.
    #[error("provider configuration: {0}")]
    Configuration(String),

    /// Operation referenced an unknown job id.
    #[error("job not found: {0}")]
    NotFound(Uuid),

    /// Retry requested with no qualifying failed items.
    #[error("no retryable items in job {0}")]
    NoRetryableItems(Uuid),

    /// Operation not allowed in the job's current status, e.g. running a job
    /// twice or retrying one that is still executing.
    #[error("job {job} is {status}, operation not allowed")]
    InvalidState { job: Uuid, status: JobStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
