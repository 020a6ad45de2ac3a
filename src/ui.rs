//! Terminal rendering — progress bar and colored summaries.
//!
//! Uses `indicatif` for the batch progress bar and `console` for color
//! styling. [`BatchProgress`] tracks a running job visually in the terminal,
//! fed from the scheduler's event channel.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::{ItemStatus, JobStatus};
use crate::catalog::ProviderCatalog;
use crate::estimator::CostEstimate;
use crate::snapshot::{JobSnapshot, ProgressEvent};

/// Visual progress indicator for one running batch.
pub struct BatchProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl BatchProgress {
    /// Start the bar for a batch of `total` items.
    pub fn start(name: &str, total: u64) -> Self {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(name.to_string());

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Advance the bar for one scheduler event.
    pub fn observe(&self, event: &ProgressEvent) {
        if let ProgressEvent::Progress {
            item_index,
            item_status,
            provider,
            ..
        } = event
        {
            self.pb.inc(1);
            let provider = provider.as_deref().unwrap_or("-");
            match item_status {
                ItemStatus::Failed => self.pb.println(format!(
                    "  {} item {item_index} failed ({provider})",
                    self.red.apply_to("✗")
                )),
                _ => self.pb.set_message(format!("item {item_index} ({provider})")),
            }
        }
    }

    /// Finish the bar and print the job summary.
    pub fn finish(&self, snapshot: &JobSnapshot) {
        self.pb.finish_and_clear();
        let status_style = match snapshot.status {
            JobStatus::Completed => &self.green,
            JobStatus::Failed => &self.red,
            _ => &self.yellow,
        };
        println!(
            "  {} {} — {}/{} completed, {} failed",
            status_style.apply_to(match snapshot.status {
                JobStatus::Completed => "✓",
                JobStatus::Failed => "✗",
                _ => "→",
            }),
            status_style.apply_to(snapshot.status),
            snapshot.completed_items,
            snapshot.total_items,
            snapshot.failed_items,
        );
        if !snapshot.providers_used.is_empty() {
            println!("  providers: {}", snapshot.providers_used.join(", "));
        }
        println!(
            "  cost: ${:.4} actual (${:.4} estimated)",
            snapshot.actual_cost_usd, snapshot.estimated_cost_usd
        );
        if snapshot.can_retry_failed {
            println!(
                "  {} {} failed item(s) can be retried",
                self.yellow.apply_to("↻"),
                snapshot.failed_items
            );
        }
    }
}

/// Print a pre-run cost estimate with the provider comparison table.
pub fn print_estimate(estimate: &CostEstimate) {
    println!(
        "Estimated cost: ${:.4} ({} items, ~{} input / ~{} output tokens, confidence {:.0}%)",
        estimate.total_usd,
        estimate.per_item.len(),
        estimate.input_tokens,
        estimate.output_tokens,
        estimate.confidence * 100.0
    );
    println!();
    println!("  {:<12} {:>12} {:>8}", "provider", "projected", "quality");
    for rec in &estimate.recommendations {
        println!(
            "  {:<12} {:>11.4}$ {:>8}",
            rec.provider, rec.projected_cost_usd, rec.quality_rank
        );
    }
}

/// Print the provider cost table.
pub fn print_providers(catalog: &ProviderCatalog) {
    println!(
        "  {:<12} {:>10} {:>10} {:>8}",
        "provider", "in $/Mtok", "out $/Mtok", "quality"
    );
    for name in catalog.names() {
        if let Some(profile) = catalog.get(name) {
            println!(
                "  {:<12} {:>10.2} {:>10.2} {:>8}",
                name, profile.input_per_mtok, profile.output_per_mtok, profile.quality_rank
            );
        }
    }
}
