use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::{Item, ItemSpec, ItemStatus};
use crate::error::SchedulerError;
use crate::generation::{GenerationOutput, GenerationRequest};
use crate::router::{self, AssignmentRecord};

/// Policy used to pick a provider per item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStrategy {
    /// Always the preferred provider.
    #[default]
    Single,
    /// Cycle through preferred + fallbacks in submission order.
    RoundRobin,
    /// Lowest projected-cost provider from the cost table.
    CostOptimized,
    /// Highest quality-ranked provider from the cost table.
    QualityOptimized,
    /// Provider with the fewest assignments so far in this job.
    LoadBalanced,
}

impl std::fmt::Display for ProviderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderStrategy::Single => "single",
            ProviderStrategy::RoundRobin => "round_robin",
            ProviderStrategy::CostOptimized => "cost_optimized",
            ProviderStrategy::QualityOptimized => "quality_optimized",
            ProviderStrategy::LoadBalanced => "load_balanced",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProviderStrategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ProviderStrategy::Single),
            "round_robin" => Ok(ProviderStrategy::RoundRobin),
            "cost_optimized" => Ok(ProviderStrategy::CostOptimized),
            "quality_optimized" => Ok(ProviderStrategy::QualityOptimized),
            "load_balanced" => Ok(ProviderStrategy::LoadBalanced),
            other => Err(SchedulerError::Validation(format!(
                "unknown strategy: {other}"
            ))),
        }
    }
}

/// Post-processing flags passed through to the generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFlags {
    #[serde(default)]
    pub research: bool,
    #[serde(default)]
    pub proofread: bool,
    #[serde(default)]
    pub humanize: bool,
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    /// Cancellation requested; in-flight items are finishing.
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// True for `completed`, `failed` and `cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

fn default_concurrency_limit() -> usize {
    3
}

/// One batch submission, deserializable straight from a TOML batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub items: Vec<ItemSpec>,
    #[serde(default)]
    pub strategy: ProviderStrategy,
    pub preferred_provider: String,
    #[serde(default)]
    pub fallback_providers: Vec<String>,
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(flatten)]
    pub flags: GenerationFlags,
    #[serde(default)]
    pub brand_profile: Option<String>,
}

impl JobSpec {
    /// Submission-time validation. Provider configuration is checked later,
    /// when the job runs.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.items.is_empty() {
            return Err(SchedulerError::Validation(
                "a job needs at least one item".into(),
            ));
        }
        if self.concurrency_limit == 0 {
            return Err(SchedulerError::Validation(
                "concurrency_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One batch submission and its full mutable state.
///
/// During an execution pass all mutation happens under the scheduler's job
/// lock; item state transitions and the job-level counters always move in the
/// same critical section, so a snapshot never observes them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub strategy: ProviderStrategy,
    pub preferred_provider: String,
    pub fallback_providers: Vec<String>,
    pub concurrency_limit: usize,
    pub flags: GenerationFlags,
    pub brand_profile: Option<String>,
    pub items: Vec<Item>,
    pub status: JobStatus,
    pub completed_items: usize,
    pub failed_items: usize,
    /// Projection fixed at submission time.
    pub estimated_cost_usd: f64,
    /// Cumulative ledger across all attempts. Never decreases.
    pub actual_cost_usd: f64,
    /// Set when provider validation fails and the whole job is marked failed.
    pub failure_reason: Option<String>,
    pub assignments: AssignmentRecord,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn new(spec: JobSpec, estimated_cost_usd: f64) -> Self {
        let items = spec
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Item::new(index, item))
            .collect();
        Self {
            id: Uuid::new_v4(),
            name: spec.name,
            tags: spec.tags,
            strategy: spec.strategy,
            preferred_provider: spec.preferred_provider,
            fallback_providers: spec.fallback_providers,
            concurrency_limit: spec.concurrency_limit,
            flags: spec.flags,
            brand_profile: spec.brand_profile,
            items,
            status: JobStatus::Pending,
            completed_items: 0,
            failed_items: 0,
            estimated_cost_usd,
            actual_cost_usd: 0.0,
            failure_reason: None,
            assignments: AssignmentRecord::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// Provider candidates in priority order: preferred first, then fallbacks.
    pub fn candidates(&self) -> Vec<String> {
        router::candidates(&self.preferred_provider, &self.fallback_providers)
    }

    /// Lowest-indexed item still waiting for admission.
    pub fn next_pending_index(&self) -> Option<usize> {
        self.items
            .iter()
            .find(|item| item.status == ItemStatus::Pending)
            .map(|item| item.index)
    }

    /// Distinct providers assigned so far, in item order.
    pub fn providers_used(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for item in &self.items {
            if let Some(provider) = &item.provider
                && !seen.contains(provider)
            {
                seen.push(provider.clone());
            }
        }
        seen
    }

    /// Request for one item's execution attempt, using its assigned provider.
    pub fn generation_request(&self, index: usize) -> GenerationRequest {
        let item = &self.items[index];
        GenerationRequest {
            provider: item.provider.clone().unwrap_or_default(),
            topic: item.topic.clone(),
            keywords: item.keywords.clone(),
            tone: item.tone.clone(),
            research: self.flags.research,
            proofread: self.flags.proofread,
            humanize: self.flags.humanize,
            brand_profile: self.brand_profile.clone(),
        }
    }

    /// Record a successful attempt: item terminal state, counter and ledger
    /// move together.
    pub fn complete_item(&mut self, index: usize, output: GenerationOutput, cost_usd: f64) {
        let item = &mut self.items[index];
        item.status = ItemStatus::Completed;
        item.content = Some(output.content);
        item.usage = Some(output.usage);
        item.cost_usd = cost_usd;
        item.error = None;
        item.ended_at = Some(Utc::now());
        self.completed_items += 1;
        self.actual_cost_usd += cost_usd;
    }

    /// Record a failed attempt.
    pub fn fail_item(&mut self, index: usize, error: String) {
        let item = &mut self.items[index];
        item.status = ItemStatus::Failed;
        item.error = Some(error);
        item.ended_at = Some(Utc::now());
        self.failed_items += 1;
    }

    /// Return a failed item to `pending` for another attempt. The prior
    /// attempt's cost stays in the cumulative ledger.
    pub fn readmit_item(&mut self, index: usize, forced_provider: Option<String>) {
        let item = &mut self.items[index];
        item.retry_count += 1;
        item.status = ItemStatus::Pending;
        item.forced_provider = forced_provider;
        item.provider = None;
        item.usage = None;
        item.cost_usd = 0.0;
        item.content = None;
        item.error = None;
        item.started_at = None;
        item.ended_at = None;
        self.failed_items -= 1;
    }

    /// Close out an execution pass.
    ///
    /// Zero successes make the job `failed`; any partial success is
    /// `completed`. A cancelled pass marks every unstarted item `cancelled`.
    pub fn finalize(&mut self, fatal: Option<String>) {
        if let Some(reason) = fatal {
            self.status = JobStatus::Failed;
            self.failure_reason = Some(reason);
        } else if self.status == JobStatus::Cancelling {
            for item in &mut self.items {
                if matches!(item.status, ItemStatus::Pending | ItemStatus::Queued) {
                    item.status = ItemStatus::Cancelled;
                }
            }
            self.status = JobStatus::Cancelled;
        } else if self.completed_items == 0 {
            self.status = JobStatus::Failed;
        } else {
            self.status = JobStatus::Completed;
        }
        self.completed_at = Some(Utc::now());
    }
}
