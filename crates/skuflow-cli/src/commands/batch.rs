//! Batch command - extract records from multiple documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use futures::stream::{self, StreamExt};
use glob::glob;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use skuflow_core::extract::router::{classify, extractor_name};
use skuflow_core::{Document, DocumentKind, ExtractionMetadata, ExtractionResult, ExtractionRouter, InMemoryCatalog, ReviewBatch, TieredMatcher};

use super::extract::{format_result, format_review, OutputFormat};
use super::{build_matcher, build_router, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Catalog JSON file to match the extracted records against
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of documents processed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome for a single file.
struct FileOutcome {
    path: PathBuf,
    result: ExtractionResult,
    review: Option<ReviewBatch>,
    processing_time_ms: u64,
}

impl FileOutcome {
    fn error(&self) -> Option<&str> {
        (!self.result.success).then(|| self.result.message.as_deref().unwrap_or("unknown error"))
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && is_supported(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let router = build_router(&config)?;
    let matcher = match &args.catalog {
        Some(catalog) => Some(build_matcher(&config, catalog)?),
        None => None,
    };

    let multi_progress = MultiProgress::new();
    let overall_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let outcomes: Vec<FileOutcome> = stream::iter(files)
        .map(|path| {
            let (router, matcher, pb) = (&router, matcher.as_ref(), &overall_pb);
            async move {
                let outcome = process_file(path, router, matcher).await;
                pb.inc(1);
                outcome
            }
        })
        .buffered(args.jobs.max(1))
        .collect()
        .await;

    overall_pb.finish_with_message("Complete");

    let failed: Vec<&FileOutcome> = outcomes.iter().filter(|o| o.error().is_some()).collect();
    if !failed.is_empty() && !args.continue_on_error {
        let first = failed[0];
        anyhow::bail!(
            "Processing failed for {}: {}",
            first.path.display(),
            first.error().unwrap_or_default()
        );
    }

    if let Some(output_dir) = &args.output_dir {
        for outcome in outcomes.iter().filter(|o| o.result.success) {
            let output_name = outcome
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("records");
            let output_path = output_dir.join(format!("{}.{}", output_name, args.format.extension()));

            let content = match &outcome.review {
                Some(batch) => format_review(&outcome.result, batch, args.format)?,
                None => format_result(&outcome.result, args.format)?,
            };

            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let records: usize = outcomes.iter().map(|o| o.result.records.len()).sum();
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} records",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red(),
        records
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error().unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    classify(&Document::new(&[]).with_filename(name)) != DocumentKind::Unrecognized
}

async fn process_file(
    path: PathBuf,
    router: &ExtractionRouter,
    matcher: Option<&TieredMatcher<InMemoryCatalog>>,
) -> FileOutcome {
    let file_start = Instant::now();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let result = match fs::read(&path) {
        Ok(bytes) => router.extract(&Document::new(&bytes).with_filename(&name)).await,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            let metadata = ExtractionMetadata::new(DocumentKind::Unrecognized).with_file_name(&name);
            ExtractionResult::failure(metadata, format!("cannot read file: {}", e))
        }
    };

    if let Some(message) = result.message.as_deref().filter(|_| !result.success) {
        warn!("Failed to process {}: {}", path.display(), message);
    }

    let review = match matcher {
        Some(matcher) if result.success => Some(matcher.review(result.clone()).await),
        _ => None,
    };

    FileOutcome {
        path,
        result,
        review,
        processing_time_ms: file_start.elapsed().as_millis() as u64,
    }
}

fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "extractor",
        "records",
        "confidence",
        "pending",
        "processing_time_ms",
        "error",
    ])?;

    for outcome in outcomes {
        let filename = outcome
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let status = if outcome.result.success { "success" } else { "error" };
        let pending = outcome
            .review
            .as_ref()
            .map(|b| b.pending_count().to_string())
            .unwrap_or_default();

        wtr.write_record([
            filename,
            status,
            extractor_name(outcome.result.metadata.extractor),
            &outcome.result.records.len().to_string(),
            &format!("{:.2}", outcome.result.confidence),
            &pending,
            &outcome.processing_time_ms.to_string(),
            outcome.error().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
