//! Extract command - extract records from a single document.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use skuflow_core::extract::router::{estimate_processing_time, extractor_name};
use skuflow_core::matching::{ReviewBatch, ReviewEntry, ReviewSummary};
use skuflow_core::{DecisionState, Document, ExtractedRecord, ExtractionMetadata, ExtractionResult, MatchDecision};

use super::{build_matcher, build_router, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (spreadsheet, CSV, PDF, text or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Declared content type, overriding the file extension
    #[arg(long)]
    content_type: Option<String>,

    /// Catalog JSON file to match the extracted records against
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Abort an external model call after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Show extraction confidence and timing
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one line per record
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Extraction result with its match decisions, as handed to review.
#[derive(Serialize)]
struct ReviewReport<'a> {
    success: bool,
    metadata: &'a ExtractionMetadata,
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    summary: ReviewSummary,
    entries: Vec<&'a ReviewEntry>,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let bytes = fs::read(&args.input)?;
    let file_name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let mut doc = Document::new(&bytes).with_filename(file_name);
    if let Some(content_type) = args.content_type.as_deref() {
        doc = doc.with_content_type(content_type);
    }

    let kind = doc.kind();
    info!("Processing file: {} as {:?}", args.input.display(), kind);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!(
        "{} extraction (about {}s)...",
        extractor_name(kind),
        estimate_processing_time(kind, bytes.len()).as_secs_f32().ceil()
    ));
    pb.enable_steady_tick(Duration::from_millis(100));

    let router = build_router(&config)?;
    let result = match args.timeout {
        Some(secs) => router.extract_with_deadline(&doc, Duration::from_secs(secs)).await,
        None => router.extract(&doc).await,
    };

    if !result.success {
        pb.finish_and_clear();
        anyhow::bail!(
            "Extraction failed: {}",
            result.message.as_deref().unwrap_or("unknown error")
        );
    }

    let output = match &args.catalog {
        Some(catalog) => {
            pb.set_message("Matching against catalog...");
            let matcher = build_matcher(&config, catalog)?;
            let batch = matcher.review(result.clone()).await;
            format_review(&result, &batch, args.format)?
        }
        None => format_result(&result, args.format)?,
    };

    pb.finish_and_clear();

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            result.confidence * 100.0
        );
        println!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            result.metadata.processing_time_ms
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Render an extraction result without match decisions.
pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(result)?),
        OutputFormat::Csv => format_csv(&result.records, None),
        OutputFormat::Text => Ok(format_text(result, None)),
    }
}

/// Render an extraction result together with its review batch.
pub fn format_review(result: &ExtractionResult, batch: &ReviewBatch, format: OutputFormat) -> anyhow::Result<String> {
    let decisions: Vec<MatchDecision> = batch.entries().map(|e| e.decision.clone()).collect();

    match format {
        OutputFormat::Json => {
            let report = ReviewReport {
                success: result.success,
                metadata: &result.metadata,
                confidence: result.confidence,
                message: result.message.as_deref(),
                summary: batch.summary(),
                entries: batch.entries().collect(),
            };
            Ok(serde_json::to_string(&report)?)
        }
        OutputFormat::Csv => format_csv(&result.records, Some(&decisions)),
        OutputFormat::Text => Ok(format_text(result, Some(batch))),
    }
}

fn format_csv(records: &[ExtractedRecord], decisions: Option<&[MatchDecision]>) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![
        "name",
        "manufacturer",
        "part_number",
        "category",
        "supplier",
        "quantity",
        "price_eur",
        "price_usd",
        "price_cny",
        "original_currency",
        "notes",
        "confidence",
    ];
    if decisions.is_some() {
        header.extend(["decision", "selected", "candidates"]);
    }
    wtr.write_record(&header)?;

    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let number = |value: Option<String>| value.unwrap_or_default();

    for (i, record) in records.iter().enumerate() {
        let mut row = vec![
            record.name.clone(),
            text(&record.manufacturer),
            text(&record.part_number),
            text(&record.category),
            text(&record.supplier),
            number(record.quantity.map(|q| q.to_string())),
            number(record.price_eur.map(|p| p.to_string())),
            number(record.price_usd.map(|p| p.to_string())),
            number(record.price_cny.map(|p| p.to_string())),
            number(record.original_currency.map(|c| c.to_string())),
            text(&record.notes),
            format!("{:.2}", record.confidence),
        ];

        if let Some(decision) = decisions.and_then(|d| d.get(i)) {
            row.push(state_label(decision.state).to_string());
            row.push(text(&decision.selected));
            row.push(decision.candidates.len().to_string());
        }

        wtr.write_record(&row)?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn state_label(state: DecisionState) -> &'static str {
    match state {
        DecisionState::Pending => "pending",
        DecisionState::AcceptUpdate => "accept_update",
        DecisionState::CreateNew => "create_new",
    }
}

fn format_text(result: &ExtractionResult, batch: Option<&ReviewBatch>) -> String {
    let mut output = String::new();
    let metadata = &result.metadata;

    output.push_str(&format!("Extractor: {}\n", extractor_name(metadata.extractor)));
    if let Some(file_name) = &metadata.file_name {
        output.push_str(&format!("File: {}\n", file_name));
    }
    if let Some(sheet) = &metadata.sheet_name {
        output.push_str(&format!("Sheet: {}\n", sheet));
    }
    output.push_str(&format!(
        "Records: {} ({} rows examined, {} skipped)\n",
        result.records.len(),
        metadata.total_rows,
        metadata.skipped_rows
    ));
    output.push_str(&format!("Confidence: {:.0}%\n", result.confidence * 100.0));
    if let Some(message) = &result.message {
        output.push_str(&format!("Note: {}\n", message));
    }
    output.push('\n');

    for (i, record) in result.records.iter().enumerate() {
        output.push_str(&format!("{:>3}. {}", i + 1, record.name));
        if let Some(part_number) = &record.part_number {
            output.push_str(&format!(" [{}]", part_number));
        }
        if let Some(manufacturer) = &record.manufacturer {
            output.push_str(&format!(" - {}", manufacturer));
        }
        if let Some((amount, currency)) = record.source_price() {
            output.push_str(&format!("  {} {}", amount, currency));
        }
        if let Some(entry) = batch.and_then(|b| b.get(i)) {
            let decision = &entry.decision;
            let state = match (&decision.selected, decision.is_pending()) {
                (Some(selected), _) => format!("update {}", selected),
                (None, true) => format!("review ({} candidates)", decision.candidates.len()),
                (None, false) => "new".to_string(),
            };
            output.push_str(&format!("  -> {}", state));
        }
        output.push('\n');
    }

    if let Some(batch) = batch {
        let summary = batch.summary();
        output.push_str(&format!(
            "\nMatching: {} update, {} new, {} pending\n",
            summary.accept_update, summary.create_new, summary.pending
        ));
    }

    output
}
