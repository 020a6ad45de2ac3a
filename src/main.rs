use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use draftmill::batch::{JobSpec, JobStatus};
use draftmill::cli::{Cli, Command, ExportArg};
use draftmill::config::DraftmillConfig;
use draftmill::estimator::CostEstimator;
use draftmill::generation::{Generator, HttpGenerator};
use draftmill::scheduler::BatchScheduler;
use draftmill::ui::{self, BatchProgress};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DraftmillConfig::load()?;

    match &cli.command {
        Command::Run {
            file,
            export,
            out,
            retry_failed,
        } => {
            run_batch(
                &config,
                &cli,
                file,
                *export,
                out.clone(),
                *retry_failed,
            )
            .await
        }
        Command::Estimate { file } => estimate_batch(&config, &cli, file),
        Command::Providers => {
            ui::print_providers(&config.catalog());
            Ok(())
        }
    }
}

/// Load a batch file and apply the CLI's global overrides.
fn load_spec(path: &Path, cli: &Cli) -> Result<JobSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading batch file {}", path.display()))?;
    let mut spec: JobSpec =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    if let Some(limit) = cli.concurrency {
        spec.concurrency_limit = limit;
    }
    if let Some(provider) = &cli.provider {
        spec.preferred_provider = provider.clone();
    }
    Ok(spec)
}

fn estimate_batch(config: &DraftmillConfig, cli: &Cli, file: &Path) -> Result<()> {
    let spec = load_spec(file, cli)?;
    spec.validate()?;
    let catalog = config.catalog();
    let estimate = CostEstimator::new(&catalog).estimate(
        &spec.items,
        spec.strategy,
        &spec.preferred_provider,
        &spec.fallback_providers,
        &spec.flags,
    )?;
    ui::print_estimate(&estimate);
    Ok(())
}

async fn run_batch(
    config: &DraftmillConfig,
    cli: &Cli,
    file: &Path,
    export: Option<ExportArg>,
    out: Option<PathBuf>,
    retry_failed: bool,
) -> Result<()> {
    let spec = load_spec(file, cli)?;
    let name = spec.name.clone().unwrap_or_else(|| "batch".to_string());
    let total = spec.items.len() as u64;

    let generator: Arc<dyn Generator> = Arc::new(HttpGenerator::with_base_url(
        config.api_key.clone(),
        config.api_base_url.clone(),
    ));
    let scheduler = Arc::new(BatchScheduler::new(config.catalog(), generator));

    let job_id = scheduler.submit(spec).await?;
    let mut events = scheduler.subscribe();
    let progress = BatchProgress::start(&name, total);

    let runner = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run(job_id).await }
    });

    loop {
        match events.recv().await {
            Ok(event) => {
                progress.observe(&event);
                if event.is_completion_of(job_id) {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
    runner.await??;

    let mut snapshot = scheduler.snapshot(job_id).await?;

    if retry_failed && snapshot.can_retry_failed {
        println!("retrying {} failed item(s)...", snapshot.failed_items);
        scheduler.retry(job_id, None, None).await?;
        snapshot = scheduler.snapshot(job_id).await?;
    }

    progress.finish(&snapshot);

    if let Some(format) = export {
        let format = format.format();
        let bytes = scheduler.export(job_id, format).await?;
        let path =
            out.unwrap_or_else(|| PathBuf::from(format!("results.{}", format.extension())));
        std::fs::write(&path, bytes)
            .with_context(|| format!("writing export to {}", path.display()))?;
        println!("  export written to {}", path.display());
    }

    if snapshot.status == JobStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
