//! draftmill — batch scheduler for fan-out AI content generation.
//!
//! A client submits a batch of independent generation items; the scheduler
//! executes them with bounded concurrency across interchangeable backend
//! providers, tracks per-item and job-level progress, estimates and accounts
//! for monetary cost, and lets the caller selectively retry failures without
//! re-running successful work.

pub mod batch;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod estimator;
pub mod export;
pub mod generation;
pub mod router;
pub mod scheduler;
pub mod snapshot;
pub mod ui;

pub use batch::{
    BatchJob, GenerationFlags, Item, ItemSpec, ItemStatus, JobSpec, JobStatus, ProviderStrategy,
};
pub use catalog::{ProviderCatalog, ProviderProfile};
pub use error::SchedulerError;
pub use estimator::{CostEstimate, CostEstimator, ItemEstimate, ProviderRecommendation};
pub use export::{ExportFormat, ItemRecord};
pub use generation::{
    GenerationError, GenerationOutput, GenerationRequest, Generator, HttpGenerator, TokenUsage,
};
pub use router::{AssignmentRecord, ProviderRouter};
pub use scheduler::BatchScheduler;
pub use snapshot::{JobSnapshot, ProgressEvent};
