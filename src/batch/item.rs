use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::TokenUsage;

/// One unit of generation work as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    /// Subject of the content to generate.
    pub topic: String,
    /// Keywords the content should cover.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Desired tone label, passed through to the generation backend.
    #[serde(default)]
    pub tone: Option<String>,
}

/// Lifecycle status of an item.
///
/// `pending → queued → processing → {completed | failed}`; `cancelled` is
/// reachable from `pending` and `queued` when the job is cancelled. A retry
/// returns a `failed` item to `pending` for a fresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ItemStatus {
    /// True for `completed`, `failed` and `cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemStatus::Completed | ItemStatus::Failed | ItemStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
            ItemStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One unit of generation work inside a job, identified by `(job_id, index)`.
///
/// The scheduler core is the only writer during an execution pass; a retry is
/// the only path that returns a terminal item to `pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Position in the submission order, stable for the job's lifetime.
    pub index: usize,
    pub topic: String,
    pub keywords: Vec<String>,
    pub tone: Option<String>,
    pub status: ItemStatus,
    /// Provider assigned for the current attempt.
    pub provider: Option<String>,
    /// Token counts from the current attempt, when it completed.
    pub usage: Option<TokenUsage>,
    /// Cost of the current attempt in USD. Prior attempts' cost lives in the
    /// job's cumulative ledger and is never un-spent.
    pub cost_usd: f64,
    pub retry_count: u32,
    /// Provider override for the next attempt only, set by a retry.
    pub forced_provider: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl Item {
    pub fn new(index: usize, spec: ItemSpec) -> Self {
        Self {
            index,
            topic: spec.topic,
            keywords: spec.keywords,
            tone: spec.tone,
            status: ItemStatus::Pending,
            provider: None,
            usage: None,
            cost_usd: 0.0,
            retry_count: 0,
            forced_provider: None,
            started_at: None,
            ended_at: None,
            content: None,
            error: None,
        }
    }

    /// The submission-time fields of this item.
    pub fn spec(&self) -> ItemSpec {
        ItemSpec {
            topic: self.topic.clone(),
            keywords: self.keywords.clone(),
            tone: self.tone.clone(),
        }
    }
}
