//! Rendering of terminal item results.
//!
//! Exporting reads the job, never mutates it, and may run mid-execution: it
//! covers whatever is terminal at that instant. The job's item vector is the
//! result store; the records here are its serialized view.

use std::io::{Cursor, Write};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::batch::{BatchJob, Item, ItemStatus, JobStatus};
use crate::error::SchedulerError;

/// Requested export rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
    Zip,
}

impl ExportFormat {
    /// Conventional file extension for the format.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
            ExportFormat::Zip => "zip",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Zip => "zip",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "markdown" => Ok(ExportFormat::Markdown),
            "zip" => Ok(ExportFormat::Zip),
            other => Err(SchedulerError::Validation(format!(
                "unknown export format: {other}"
            ))),
        }
    }
}

/// Serialized view of one terminal item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub index: usize,
    pub topic: String,
    pub keywords: Vec<String>,
    pub tone: Option<String>,
    pub status: ItemStatus,
    pub provider: Option<String>,
    pub retry_count: u32,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub cost_usd: f64,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl ItemRecord {
    pub fn from_item(item: &Item) -> Self {
        Self {
            index: item.index,
            topic: item.topic.clone(),
            keywords: item.keywords.clone(),
            tone: item.tone.clone(),
            status: item.status,
            provider: item.provider.clone(),
            retry_count: item.retry_count,
            input_tokens: item.usage.map(|u| u.input_tokens),
            output_tokens: item.usage.map(|u| u.output_tokens),
            cost_usd: item.cost_usd,
            content: item.content.clone(),
            error: item.error.clone(),
        }
    }
}

#[derive(Serialize)]
struct Manifest {
    job_id: Uuid,
    name: Option<String>,
    status: JobStatus,
    total_items: usize,
    completed_items: usize,
    failed_items: usize,
    actual_cost_usd: f64,
    items: Vec<ItemRecord>,
}

/// Render the job's terminal results in the requested format.
pub fn export(job: &BatchJob, format: ExportFormat) -> Result<Vec<u8>, SchedulerError> {
    match format {
        ExportFormat::Json => export_json(job),
        ExportFormat::Csv => Ok(export_csv(job)),
        ExportFormat::Markdown => Ok(export_markdown(job)),
        ExportFormat::Zip => export_zip(job),
    }
}

fn terminal_records(job: &BatchJob) -> Vec<ItemRecord> {
    job.items
        .iter()
        .filter(|item| item.status.is_terminal())
        .map(ItemRecord::from_item)
        .collect()
}

fn export_json(job: &BatchJob) -> Result<Vec<u8>, SchedulerError> {
    Ok(serde_json::to_vec_pretty(&terminal_records(job))?)
}

fn export_csv(job: &BatchJob) -> Vec<u8> {
    let mut out = String::from("index,topic,status,provider,cost_usd,content,error\n");
    for record in terminal_records(job) {
        out.push_str(&format!(
            "{},{},{},{},{:.6},{},{}\n",
            record.index,
            csv_field(&record.topic),
            record.status,
            csv_field(record.provider.as_deref().unwrap_or("")),
            record.cost_usd,
            csv_field(record.content.as_deref().unwrap_or("")),
            csv_field(record.error.as_deref().unwrap_or("")),
        ));
    }
    out.into_bytes()
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn export_markdown(job: &BatchJob) -> Vec<u8> {
    let title = job.name.as_deref().unwrap_or("Batch results");
    let mut out = format!("# {title}\n\n");
    for item in &job.items {
        if item.status != ItemStatus::Completed {
            continue;
        }
        out.push_str(&format!("## {}\n\n", item.topic));
        if let Some(content) = &item.content {
            out.push_str(content);
            out.push_str("\n\n");
        }
    }
    out.into_bytes()
}

fn export_zip(job: &BatchJob) -> Result<Vec<u8>, SchedulerError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = Manifest {
        job_id: job.id,
        name: job.name.clone(),
        status: job.status,
        total_items: job.total_items(),
        completed_items: job.completed_items,
        failed_items: job.failed_items,
        actual_cost_usd: job.actual_cost_usd,
        items: terminal_records(job),
    };
    writer.start_file("manifest.json", options)?;
    writer.write_all(&serde_json::to_vec_pretty(&manifest)?)?;

    for item in &job.items {
        if item.status != ItemStatus::Completed {
            continue;
        }
        let name = format!("{:03}-{}.md", item.index, slug(&item.topic));
        writer.start_file(name, options)?;
        writer.write_all(format!("# {}\n\n", item.topic).as_bytes())?;
        if let Some(content) = &item.content {
            writer.write_all(content.as_bytes())?;
        }
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Filesystem-safe slice of a topic for archive file names.
fn slug(topic: &str) -> String {
    let mut out = String::new();
    for ch in topic.chars().take(48) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{GenerationFlags, ItemSpec, JobSpec, ProviderStrategy};
    use crate::generation::{GenerationOutput, TokenUsage};
    use std::io::Read;

    fn finished_job() -> BatchJob {
        let mut job = BatchJob::new(
            JobSpec {
                name: Some("Garden series".into()),
                tags: vec![],
                items: ["Raised beds, explained", "Seed starting", "Mulching"]
                    .iter()
                    .map(|t| ItemSpec {
                        topic: (*t).into(),
                        keywords: vec!["garden".into()],
                        tone: None,
                    })
                    .collect(),
                strategy: ProviderStrategy::Single,
                preferred_provider: "anthropic".into(),
                fallback_providers: vec![],
                concurrency_limit: 2,
                flags: GenerationFlags::default(),
                brand_profile: None,
            },
            0.5,
        );
        job.status = JobStatus::Processing;
        for index in [0, 1] {
            job.items[index].provider = Some("anthropic".into());
            job.complete_item(
                index,
                GenerationOutput {
                    content: format!("Article body {index}"),
                    usage: TokenUsage {
                        input_tokens: 200,
                        output_tokens: 900,
                    },
                },
                0.015,
            );
        }
        job.items[2].provider = Some("anthropic".into());
        job.fail_item(2, "rate limited, retry after 7000ms".into());
        job.finalize(None);
        job
    }

    #[test]
    fn json_roundtrip_matches_store() {
        let job = finished_job();
        let bytes = export(&job, ExportFormat::Json).unwrap();
        let parsed: Vec<ItemRecord> = serde_json::from_slice(&bytes).unwrap();
        let expected: Vec<(String, ItemStatus, Option<String>, Option<String>)> = job
            .items
            .iter()
            .map(|i| {
                (
                    i.topic.clone(),
                    i.status,
                    i.content.clone(),
                    i.error.clone(),
                )
            })
            .collect();
        let actual: Vec<(String, ItemStatus, Option<String>, Option<String>)> = parsed
            .iter()
            .map(|r| (r.topic.clone(), r.status, r.content.clone(), r.error.clone()))
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let job = finished_job();
        let bytes = export(&job, ExportFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "index,topic,status,provider,cost_usd,content,error"
        );
        assert!(text.contains(r#""Raised beds, explained""#));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn csv_escapes_embedded_quotes() {
        assert_eq!(csv_field(r#"say "hi""#), r#""say ""hi""""#);
        assert_eq!(csv_field("plain"), "plain");
    }

    #[test]
    fn markdown_has_one_section_per_success() {
        let job = finished_job();
        let bytes = export(&job, ExportFormat::Markdown).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("# Garden series"));
        assert_eq!(text.matches("\n## ").count() + 1, 3); // title + 2 sections
        assert!(text.contains("## Seed starting"));
        assert!(!text.contains("Mulching"));
    }

    #[test]
    fn zip_contains_manifest_plus_one_file_per_success() {
        let job = finished_job();
        let bytes = export(&job, ExportFormat::Zip).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3); // manifest + 2 successes

        let mut manifest = String::new();
        archive
            .by_name("manifest.json")
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(parsed["completed_items"], 2);
        assert_eq!(parsed["failed_items"], 1);
        assert_eq!(parsed["items"].as_array().unwrap().len(), 3);

        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"000-raised-beds-explained.md".to_string()));
        assert!(names.contains(&"001-seed-starting.md".to_string()));
    }

    #[test]
    fn export_skips_non_terminal_items() {
        let mut job = finished_job();
        job.readmit_item(2, None); // back to pending
        let bytes = export(&job, ExportFormat::Json).unwrap();
        let parsed: Vec<ItemRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn format_parse_and_extension() {
        let format: ExportFormat = "markdown".parse().unwrap();
        assert_eq!(format, ExportFormat::Markdown);
        assert_eq!(format.extension(), "md");
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn slug_is_filesystem_safe() {
        assert_eq!(slug("Raised beds, explained!"), "raised-beds-explained");
        assert_eq!(slug("  ...  "), "");
    }
}
