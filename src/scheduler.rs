//! Bounded-concurrency execution of batch jobs.
//!
//! One logical scheduler owns a registry of jobs. Each execution pass drives
//! the job's pending items through a worker pool bounded by the job's
//! concurrency limit: admission follows submission index order, completion
//! order is unconstrained. All mutation of a job happens under its own lock in
//! short critical sections; the generator call itself is never awaited while
//! a lock is held. A retry is another bounded pass over the same job identity,
//! and it can only start once the job is terminal, so two passes never overlap.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::batch::{BatchJob, ItemStatus, JobSpec, JobStatus};
use crate::catalog::ProviderCatalog;
use crate::error::SchedulerError;
use crate::estimator::{CostEstimate, CostEstimator};
use crate::export::{self, ExportFormat};
use crate::generation::Generator;
use crate::router::ProviderRouter;
use crate::snapshot::{JobSnapshot, ProgressEvent};

const EVENT_CHANNEL_CAPACITY: usize = 256;

type JobHandle = Arc<Mutex<BatchJob>>;

pub struct BatchScheduler {
    catalog: Arc<ProviderCatalog>,
    generator: Arc<dyn Generator>,
    jobs: Mutex<HashMap<Uuid, JobHandle>>,
    events: broadcast::Sender<ProgressEvent>,
}

impl BatchScheduler {
    pub fn new(catalog: ProviderCatalog, generator: Arc<dyn Generator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            catalog: Arc::new(catalog),
            generator,
            jobs: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Advisory progress/completion events. Polling [`Self::snapshot`] stays
    /// the authoritative read path.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Pre-run cost projection for a submission, without executing anything.
    pub fn estimate(&self, spec: &JobSpec) -> Result<CostEstimate, SchedulerError> {
        CostEstimator::new(&self.catalog).estimate(
            &spec.items,
            spec.strategy,
            &spec.preferred_provider,
            &spec.fallback_providers,
            &spec.flags,
        )
    }

    /// Validate and register a new job. All items start `pending`.
    ///
    /// The submission-time estimate is recorded on the job; when the provider
    /// configuration is unusable the estimate is left at zero and the problem
    /// surfaces as a fatal error when the job runs.
    pub async fn submit(&self, spec: JobSpec) -> Result<Uuid, SchedulerError> {
        spec.validate()?;
        let estimated = self.estimate(&spec).map(|e| e.total_usd).unwrap_or(0.0);
        let job = BatchJob::new(spec, estimated);
        let id = job.id;
        self.jobs.lock().await.insert(id, Arc::new(Mutex::new(job)));
        Ok(id)
    }

    /// Execute the job's initial pass to completion.
    pub async fn run(&self, job_id: Uuid) -> Result<(), SchedulerError> {
        let job = self.handle(job_id).await?;
        {
            let mut j = job.lock().await;
            match j.status {
                JobStatus::Pending => {
                    j.status = JobStatus::Processing;
                    j.started_at = Some(Utc::now());
                }
                // Cancelled before the pass ever started; nothing to do.
                JobStatus::Cancelled => return Ok(()),
                status => {
                    return Err(SchedulerError::InvalidState {
                        job: job_id,
                        status,
                    });
                }
            }
            let router = ProviderRouter::new(&self.catalog);
            if let Err(e) = router.validate(&j.candidates()) {
                j.finalize(Some(e.to_string()));
                let _ = self.events.send(ProgressEvent::completed(&j));
                return Err(e);
            }
        }
        self.run_pass(&job).await;
        Ok(())
    }

    /// Request cooperative cancellation. No-op when the job is already
    /// terminal. In-flight items finish naturally and their results are
    /// accepted; nothing new is admitted.
    pub async fn cancel(&self, job_id: Uuid) -> Result<(), SchedulerError> {
        let job = self.handle(job_id).await?;
        let mut j = job.lock().await;
        match j.status {
            JobStatus::Pending => {
                // No pass is active, so the job can settle immediately.
                j.status = JobStatus::Cancelling;
                j.finalize(None);
                let _ = self.events.send(ProgressEvent::completed(&j));
            }
            JobStatus::Processing => j.status = JobStatus::Cancelling,
            _ => {}
        }
        Ok(())
    }

    /// Re-admit failed items and execute a retry pass over them.
    ///
    /// Targets `item_indices` filtered to currently-failed items, or every
    /// failed item when omitted. Succeeded items, their results and the cost
    /// ledger are untouched. Returns the job id: a retry is an execution pass
    /// over the same job, not a new job.
    pub async fn retry(
        &self,
        job_id: Uuid,
        item_indices: Option<&[usize]>,
        override_provider: Option<&str>,
    ) -> Result<Uuid, SchedulerError> {
        let job = self.handle(job_id).await?;
        {
            let mut j = job.lock().await;
            if !j.status.is_terminal() {
                return Err(SchedulerError::InvalidState {
                    job: job_id,
                    status: j.status,
                });
            }
            if let Some(provider) = override_provider
                && !self.catalog.contains(provider)
            {
                return Err(SchedulerError::Configuration(format!(
                    "override provider not in cost table: {provider}"
                )));
            }
            let targets: Vec<usize> = match item_indices {
                Some(indices) => {
                    for &index in indices {
                        if index >= j.items.len() {
                            return Err(SchedulerError::Validation(format!(
                                "item index {index} out of range"
                            )));
                        }
                    }
                    indices
                        .iter()
                        .copied()
                        .filter(|&index| j.items[index].status == ItemStatus::Failed)
                        .collect()
                }
                None => j
                    .items
                    .iter()
                    .filter(|item| item.status == ItemStatus::Failed)
                    .map(|item| item.index)
                    .collect(),
            };
            if targets.is_empty() {
                return Err(SchedulerError::NoRetryableItems(job_id));
            }
            for &index in &targets {
                j.readmit_item(index, override_provider.map(str::to_string));
            }
            j.status = JobStatus::Processing;
            j.completed_at = None;
            j.failure_reason = None;
        }
        self.run_pass(&job).await;
        Ok(job_id)
    }

    /// Consistent point-in-time view of the job.
    pub async fn snapshot(&self, job_id: Uuid) -> Result<JobSnapshot, SchedulerError> {
        let job = self.handle(job_id).await?;
        let j = job.lock().await;
        Ok(JobSnapshot::of(&j))
    }

    /// Render the job's terminal results. Never mutates state; callable
    /// mid-execution.
    pub async fn export(
        &self,
        job_id: Uuid,
        format: ExportFormat,
    ) -> Result<Vec<u8>, SchedulerError> {
        let job = self.handle(job_id).await?;
        let j = job.lock().await;
        export::export(&j, format)
    }

    async fn handle(&self, job_id: Uuid) -> Result<JobHandle, SchedulerError> {
        self.jobs
            .lock()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(SchedulerError::NotFound(job_id))
    }

    /// Drive one bounded execution pass over the job's pending items.
    async fn run_pass(&self, job: &JobHandle) {
        let limit = job.lock().await.concurrency_limit;
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut workers: JoinSet<()> = JoinSet::new();
        let mut fatal: Option<String> = None;

        loop {
            // Admission step: lowest pending index, unless cancellation landed.
            let next = {
                let mut j = job.lock().await;
                if j.status == JobStatus::Cancelling {
                    None
                } else {
                    match j.next_pending_index() {
                        Some(index) => {
                            j.items[index].status = ItemStatus::Queued;
                            Some(index)
                        }
                        None => None,
                    }
                }
            };
            let Some(index) = next else { break };

            // Wait for a free worker slot before the item may start.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            // Assign the provider atomically with the transition to
            // processing; cancellation may have landed while waiting.
            let launch = {
                let mut j = job.lock().await;
                if j.status == JobStatus::Cancelling {
                    j.items[index].status = ItemStatus::Cancelled;
                    None
                } else {
                    let router = ProviderRouter::new(&self.catalog);
                    let forced = j.items[index].forced_provider.take();
                    let assigned = match forced {
                        Some(provider) => {
                            j.assignments.note(&provider);
                            Ok(provider)
                        }
                        None => {
                            let candidates = j.candidates();
                            let strategy = j.strategy;
                            router.assign(strategy, &candidates, &mut j.assignments)
                        }
                    };
                    match assigned {
                        Ok(provider) => {
                            let item = &mut j.items[index];
                            item.status = ItemStatus::Processing;
                            item.provider = Some(provider.clone());
                            item.started_at = Some(Utc::now());
                            Some((provider, j.generation_request(index)))
                        }
                        Err(e) => {
                            j.items[index].status = ItemStatus::Pending;
                            fatal = Some(e.to_string());
                            None
                        }
                    }
                }
            };

            match launch {
                Some((provider, request)) => {
                    let job = Arc::clone(job);
                    let generator = Arc::clone(&self.generator);
                    let catalog = Arc::clone(&self.catalog);
                    let events = self.events.clone();
                    workers.spawn(async move {
                        let _permit = permit;
                        let outcome = generator.generate(request).await;
                        let mut j = job.lock().await;
                        match outcome {
                            Ok(output) => {
                                let cost = catalog.cost(&provider, &output.usage).unwrap_or(0.0);
                                j.complete_item(index, output, cost);
                            }
                            Err(e) => j.fail_item(index, e.to_string()),
                        }
                        let _ = events.send(ProgressEvent::progress(&j, index));
                    });
                }
                None => {
                    drop(permit);
                    if fatal.is_some() {
                        break;
                    }
                }
            }
        }

        // Let every in-flight item finish before settling the job.
        while workers.join_next().await.is_some() {}

        let mut j = job.lock().await;
        j.finalize(fatal);
        let _ = self.events.send(ProgressEvent::completed(&j));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{GenerationFlags, ItemSpec, ProviderStrategy};
    use crate::export::ItemRecord;
    use crate::generation::{
        GenerationError, GenerationOutput, GenerationRequest, TokenUsage,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Generator double: topics containing "always-fail" fail every attempt,
    /// topics containing "flaky" fail only the first. Tracks peak concurrency.
    struct StubGenerator {
        delay: Duration,
        current: AtomicUsize,
        peak: AtomicUsize,
        attempts: std::sync::Mutex<HashMap<String, u32>>,
    }

    impl StubGenerator {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(delay_ms),
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                attempts: std::sync::Mutex::new(HashMap::new()),
            })
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationOutput, GenerationError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let entry = attempts.entry(request.topic.clone()).or_insert(0);
                *entry += 1;
                *entry
            };
            if request.topic.contains("always-fail")
                || (request.topic.contains("flaky") && attempt == 1)
            {
                return Err(GenerationError::ApiError {
                    status: 500,
                    message: "backend exploded".into(),
                });
            }
            Ok(GenerationOutput {
                content: format!("article about {}", request.topic),
                usage: TokenUsage {
                    input_tokens: 500,
                    output_tokens: 1200,
                },
            })
        }
    }

    fn spec(topics: &[&str], strategy: ProviderStrategy, limit: usize) -> JobSpec {
        JobSpec {
            name: None,
            tags: vec![],
            items: topics
                .iter()
                .map(|t| ItemSpec {
                    topic: (*t).into(),
                    keywords: vec![],
                    tone: None,
                })
                .collect(),
            strategy,
            preferred_provider: "anthropic".into(),
            fallback_providers: vec!["openai".into()],
            concurrency_limit: limit,
            flags: GenerationFlags::default(),
            brand_profile: None,
        }
    }

    fn scheduler(generator: Arc<StubGenerator>) -> Arc<BatchScheduler> {
        Arc::new(BatchScheduler::new(ProviderCatalog::builtin(), generator))
    }

    async fn records(s: &BatchScheduler, id: Uuid) -> Vec<ItemRecord> {
        let bytes = s.export(id, ExportFormat::Json).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn submit_rejects_empty_items() {
        let s = scheduler(StubGenerator::new(0));
        let result = s.submit(spec(&[], ProviderStrategy::Single, 2)).await;
        assert!(matches!(result, Err(SchedulerError::Validation(_))));
    }

    #[tokio::test]
    async fn submit_rejects_zero_concurrency() {
        let s = scheduler(StubGenerator::new(0));
        let result = s.submit(spec(&["a"], ProviderStrategy::Single, 0)).await;
        assert!(matches!(result, Err(SchedulerError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let s = scheduler(StubGenerator::new(0));
        let id = Uuid::new_v4();
        assert!(matches!(
            s.snapshot(id).await,
            Err(SchedulerError::NotFound(_))
        ));
        assert!(matches!(s.run(id).await, Err(SchedulerError::NotFound(_))));
    }

    #[tokio::test]
    async fn five_items_with_limit_two_stay_bounded_and_complete() {
        let generator = StubGenerator::new(20);
        let s = scheduler(Arc::clone(&generator));
        let id = s
            .submit(spec(&["a", "b", "c", "d", "e"], ProviderStrategy::Single, 2))
            .await
            .unwrap();
        s.run(id).await.unwrap();

        assert!(generator.peak() <= 2, "peak was {}", generator.peak());
        assert_eq!(generator.peak(), 2);

        let snap = s.snapshot(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.completed_items, 5);
        assert_eq!(snap.failed_items, 0);
        assert_eq!(snap.progress_percentage, 100.0);
        assert!(snap.actual_cost_usd > 0.0);
        assert_eq!(snap.providers_used, vec!["anthropic".to_string()]);
    }

    #[tokio::test]
    async fn partial_failure_still_completes_and_is_retryable() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(
                &["fine one", "always-fail two", "fine three"],
                ProviderStrategy::Single,
                2,
            ))
            .await
            .unwrap();
        s.run(id).await.unwrap();

        let snap = s.snapshot(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.completed_items, 2);
        assert_eq!(snap.failed_items, 1);
        assert!(snap.can_retry_failed);
        assert!(!snap.can_cancel);
    }

    #[tokio::test]
    async fn all_failures_mark_job_failed() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(
                &["always-fail a", "always-fail b"],
                ProviderStrategy::Single,
                2,
            ))
            .await
            .unwrap();
        s.run(id).await.unwrap();

        let snap = s.snapshot(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.failed_items, 2);
        assert!(snap.can_retry_failed);
    }

    #[tokio::test]
    async fn round_robin_assigns_in_admission_order() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["a", "b", "c", "d"], ProviderStrategy::RoundRobin, 2))
            .await
            .unwrap();
        s.run(id).await.unwrap();

        let providers: Vec<Option<String>> = records(&s, id)
            .await
            .into_iter()
            .map(|r| r.provider)
            .collect();
        assert_eq!(
            providers,
            vec![
                Some("anthropic".into()),
                Some("openai".into()),
                Some("anthropic".into()),
                Some("openai".into()),
            ]
        );
    }

    #[tokio::test]
    async fn cancel_before_start_cancels_everything() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["a", "b", "c"], ProviderStrategy::Single, 2))
            .await
            .unwrap();
        s.cancel(id).await.unwrap();

        let snap = s.snapshot(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Cancelled);
        assert_eq!(snap.completed_items, 0);
        assert_eq!(snap.failed_items, 0);
        let records = records(&s, id).await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.status == ItemStatus::Cancelled));

        // Running afterwards is a no-op.
        s.run(id).await.unwrap();
        assert_eq!(s.snapshot(id).await.unwrap().status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_mid_run_finishes_in_flight_and_cancels_the_rest() {
        let s = scheduler(StubGenerator::new(40));
        let id = s
            .submit(spec(&["a", "b", "c", "d", "e", "f"], ProviderStrategy::Single, 1))
            .await
            .unwrap();
        let runner = tokio::spawn({
            let s = Arc::clone(&s);
            async move { s.run(id).await }
        });
        tokio::time::sleep(Duration::from_millis(60)).await;
        s.cancel(id).await.unwrap();
        runner.await.unwrap().unwrap();

        let snap = s.snapshot(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Cancelled);
        assert!(snap.completed_items >= 1, "in-flight result was accepted");
        let records = records(&s, id).await;
        assert!(records.iter().any(|r| r.status == ItemStatus::Cancelled));
        assert_eq!(records.len(), 6);
    }

    #[tokio::test]
    async fn cancel_is_noop_on_terminal_job() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["a"], ProviderStrategy::Single, 1))
            .await
            .unwrap();
        s.run(id).await.unwrap();
        s.cancel(id).await.unwrap();
        assert_eq!(s.snapshot(id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_provider_fails_whole_job_without_admitting_items() {
        let s = scheduler(StubGenerator::new(1));
        let mut spec = spec(&["a", "b"], ProviderStrategy::Single, 2);
        spec.preferred_provider = "typewriter".into();
        spec.fallback_providers = vec![];
        let id = s.submit(spec).await.unwrap();

        let err = s.run(id).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));

        let snap = s.snapshot(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.completed_items, 0);
        assert_eq!(snap.failed_items, 0);
        assert!(!snap.can_retry_failed);
        assert!(records(&s, id).await.is_empty());
    }

    #[tokio::test]
    async fn running_twice_is_an_invalid_state() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["a"], ProviderStrategy::Single, 1))
            .await
            .unwrap();
        s.run(id).await.unwrap();
        assert!(matches!(
            s.run(id).await,
            Err(SchedulerError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn retry_reruns_only_failed_items() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(
                &["fine one", "flaky two", "always-fail three"],
                ProviderStrategy::Single,
                2,
            ))
            .await
            .unwrap();
        s.run(id).await.unwrap();

        let before = s.snapshot(id).await.unwrap();
        assert_eq!(before.completed_items, 1);
        assert_eq!(before.failed_items, 2);
        let untouched_before: Vec<ItemRecord> = records(&s, id)
            .await
            .into_iter()
            .filter(|r| r.index == 0)
            .collect();

        let retry_id = s.retry(id, None, None).await.unwrap();
        assert_eq!(retry_id, id);

        let after = s.snapshot(id).await.unwrap();
        assert_eq!(after.status, JobStatus::Completed);
        assert_eq!(after.completed_items, 2); // flaky succeeded on attempt 2
        assert_eq!(after.failed_items, 1);
        assert!(
            after.actual_cost_usd >= before.actual_cost_usd,
            "ledger never shrinks"
        );

        let records = records(&s, id).await;
        let untouched_after: Vec<ItemRecord> = records
            .iter()
            .filter(|r| r.index == 0)
            .cloned()
            .collect();
        assert_eq!(untouched_before, untouched_after);
        let flaky = records.iter().find(|r| r.index == 1).unwrap();
        assert_eq!(flaky.status, ItemStatus::Completed);
        assert_eq!(flaky.retry_count, 1);
    }

    #[tokio::test]
    async fn retry_with_override_provider_forces_assignment() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["fine", "flaky item"], ProviderStrategy::Single, 2))
            .await
            .unwrap();
        s.run(id).await.unwrap();

        s.retry(id, Some(&[1]), Some("gemini")).await.unwrap();
        let records = records(&s, id).await;
        let retried = records.iter().find(|r| r.index == 1).unwrap();
        assert_eq!(retried.provider.as_deref(), Some("gemini"));
        assert_eq!(retried.status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn retry_guards() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["fine", "always-fail x"], ProviderStrategy::Single, 2))
            .await
            .unwrap();

        // Not terminal yet.
        assert!(matches!(
            s.retry(id, None, None).await,
            Err(SchedulerError::InvalidState { .. })
        ));

        s.run(id).await.unwrap();

        // Out-of-range index.
        assert!(matches!(
            s.retry(id, Some(&[9]), None).await,
            Err(SchedulerError::Validation(_))
        ));
        // Index list naming only succeeded items.
        assert!(matches!(
            s.retry(id, Some(&[0]), None).await,
            Err(SchedulerError::NoRetryableItems(_))
        ));
        // Unknown override provider.
        assert!(matches!(
            s.retry(id, None, Some("typewriter")).await,
            Err(SchedulerError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn retry_on_fully_successful_job_has_nothing_to_do() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["a", "b"], ProviderStrategy::Single, 2))
            .await
            .unwrap();
        s.run(id).await.unwrap();
        assert!(matches!(
            s.retry(id, None, None).await,
            Err(SchedulerError::NoRetryableItems(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_is_idempotent_when_idle() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["a", "always-fail b"], ProviderStrategy::Single, 2))
            .await
            .unwrap();
        s.run(id).await.unwrap();
        let first = s.snapshot(id).await.unwrap();
        let second = s.snapshot(id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn progress_is_monotone_and_counters_conserve() {
        let s = scheduler(StubGenerator::new(10));
        let id = s
            .submit(spec(&["a", "b", "c", "d", "e"], ProviderStrategy::Single, 2))
            .await
            .unwrap();
        let runner = tokio::spawn({
            let s = Arc::clone(&s);
            async move { s.run(id).await }
        });

        let mut last = -1.0f64;
        loop {
            let snap = s.snapshot(id).await.unwrap();
            assert!(snap.completed_items + snap.failed_items <= snap.total_items);
            assert!(
                snap.progress_percentage >= last,
                "progress went backwards: {} < {last}",
                snap.progress_percentage
            );
            last = snap.progress_percentage;
            if snap.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn events_cover_every_item_and_completion() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["a", "b", "c"], ProviderStrategy::Single, 2))
            .await
            .unwrap();
        let mut events = s.subscribe();
        s.run(id).await.unwrap();

        let mut progress_count = 0;
        loop {
            match events.try_recv() {
                Ok(event) if event.is_completion_of(id) => break,
                Ok(ProgressEvent::Progress { job_id, .. }) => {
                    assert_eq!(job_id, id);
                    progress_count += 1;
                }
                Ok(_) => {}
                Err(_) => panic!("completion event missing"),
            }
        }
        assert_eq!(progress_count, 3);
    }

    #[tokio::test]
    async fn load_balanced_spreads_across_providers() {
        let s = scheduler(StubGenerator::new(1));
        let id = s
            .submit(spec(&["a", "b", "c", "d"], ProviderStrategy::LoadBalanced, 2))
            .await
            .unwrap();
        s.run(id).await.unwrap();

        let records = records(&s, id).await;
        let anthropic = records
            .iter()
            .filter(|r| r.provider.as_deref() == Some("anthropic"))
            .count();
        let openai = records
            .iter()
            .filter(|r| r.provider.as_deref() == Some("openai"))
            .count();
        assert_eq!(anthropic, 2);
        assert_eq!(openai, 2);
    }
}
