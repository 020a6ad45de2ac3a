//! Command-line interface, built on clap.
//!
//! Defines the [`Cli`] struct with subcommands [`Command`] (run, estimate,
//! providers) and global flags (--concurrency, --provider).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::export::ExportFormat;

/// draftmill — batch scheduler for fan-out AI content generation.
#[derive(Debug, Parser)]
#[command(name = "draftmill", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Override the batch file's concurrency limit.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Override the batch file's preferred provider.
    #[arg(long, global = true)]
    pub provider: Option<String>,
}

/// Export format accepted by the CLI, mapped to [`ExportFormat`] internally.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportArg {
    Json,
    Csv,
    Markdown,
    Zip,
}

impl ExportArg {
    pub fn format(self) -> ExportFormat {
        match self {
            ExportArg::Json => ExportFormat::Json,
            ExportArg::Csv => ExportFormat::Csv,
            ExportArg::Markdown => ExportFormat::Markdown,
            ExportArg::Zip => ExportFormat::Zip,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a batch file end to end.
    Run {
        /// Path to a TOML batch file.
        file: PathBuf,

        /// Write the results in this format once the job finishes.
        #[arg(long)]
        export: Option<ExportArg>,

        /// Output path for --export (defaults to results.<ext>).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Retry failed items once after the first pass.
        #[arg(long)]
        retry_failed: bool,
    },

    /// Print the pre-run cost estimate for a batch file.
    Estimate {
        /// Path to a TOML batch file.
        file: PathBuf,
    },

    /// List the provider cost table.
    Providers,
}
