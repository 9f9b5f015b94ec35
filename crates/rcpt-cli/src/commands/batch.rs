//! Batch processing command for multiple receipt files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use rcpt_core::{CandidateRecord, DuplicateDetector, ExportRow, ParseResult, PriorRecord, RcptConfig, ReceiptParser};

use super::{OutputFormat, SUPPORTED_EXTENSIONS, format_result, load_config, load_document, load_prior};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Skip receipts that duplicate a stored or earlier receipt
    #[arg(long)]
    skip_duplicates: bool,

    /// JSON file of stored receipts to check for duplicates
    #[arg(long)]
    prior: Option<PathBuf>,

    /// User the receipts belong to
    #[arg(long, default_value = "local")]
    user: String,
}

/// Outcome for one file.
enum Status {
    Parsed(Box<ParseResult>),
    Duplicate { result: Box<ParseResult>, of: String },
    Failed(String),
}

struct FileResult {
    path: PathBuf,
    file_hash: String,
    status: Status,
    processing_time_ms: u64,
}

type Parsed = (ParseResult, String, u64);

fn parse_file(parser: &ReceiptParser, path: &Path) -> anyhow::Result<Parsed> {
    let start = Instant::now();
    let document = load_document(path)?;
    let result = parser.parse(&document.input, &document.context);
    Ok((result, document.file_hash, start.elapsed().as_millis() as u64))
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!("{} Found {} files to process", style("ℹ").blue(), files.len());

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let parser = Arc::new(ReceiptParser::with_config(config.clone())?);
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut join_set = JoinSet::new();

    for (index, path) in files.iter().enumerate() {
        let parser = Arc::clone(&parser);
        let semaphore = Arc::clone(&semaphore);
        let path = path.clone();

        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let outcome = tokio::task::spawn_blocking(move || parse_file(&parser, &path)).await?;
            Ok::<_, anyhow::Error>((index, outcome))
        });
    }

    let mut outcomes: Vec<Option<anyhow::Result<Parsed>>> = files.iter().map(|_| None).collect();

    while let Some(joined) = join_set.join_next().await {
        let (index, outcome) = match joined {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => anyhow::bail!("Worker failed: {}", e),
            Err(join_err) => anyhow::bail!("Task join error: {}", join_err),
        };

        if let Err(e) = &outcome {
            let path = &files[index];
            if args.continue_on_error {
                warn!("Failed to process {}: {}", path.display(), e);
            } else {
                error!("Failed to process {}: {}", path.display(), e);
                join_set.abort_all();
                anyhow::bail!("Processing failed for {}: {}", path.display(), e);
            }
        }

        outcomes[index] = Some(outcome);
        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    // Duplicate checks run in input order so the ledger is deterministic.
    let mut ledger: Vec<PriorRecord> = match &args.prior {
        Some(path) => load_prior(path)?,
        None => Vec::new(),
    };
    let detector = DuplicateDetector::new();

    let mut results = Vec::with_capacity(files.len());
    for (path, outcome) in files.into_iter().zip(outcomes) {
        let file_result = match outcome {
            Some(Ok((result, file_hash, processing_time_ms))) => {
                let record = CandidateRecord::from_result(&result, args.user.as_str(), file_hash.as_str());
                let duplicate = if args.skip_duplicates {
                    detector.check(&record, &ledger)
                } else {
                    None
                };

                let status = match duplicate {
                    Some(found) => {
                        info!("Skipping {}: duplicate of {}", path.display(), found.record.id);
                        Status::Duplicate {
                            result: Box::new(result),
                            of: found.record.id,
                        }
                    }
                    None => {
                        ledger.push(record.into_prior(path.display().to_string()));
                        Status::Parsed(Box::new(result))
                    }
                };
                FileResult {
                    path,
                    file_hash,
                    status,
                    processing_time_ms,
                }
            }
            Some(Err(e)) => FileResult {
                path,
                file_hash: String::new(),
                status: Status::Failed(e.to_string()),
                processing_time_ms: 0,
            },
            None => FileResult {
                path,
                file_hash: String::new(),
                status: Status::Failed("not processed".to_string()),
                processing_time_ms: 0,
            },
        };
        results.push(file_result);
    }

    if let Some(output_dir) = &args.output_dir {
        for result in &results {
            let Status::Parsed(parsed) = &result.status else {
                continue;
            };
            let output_name = result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("receipt");
            let output_path = output_dir.join(format!("{}.{}", output_name, args.format.extension()));

            fs::write(&output_path, format_result(parsed, args.format, &config)?)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results, &config)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let parsed = results.iter().filter(|r| matches!(r.status, Status::Parsed(_))).count();
    let duplicates = results.iter().filter(|r| matches!(r.status, Status::Duplicate { .. })).count();
    let failed: Vec<_> = results.iter().filter(|r| matches!(r.status, Status::Failed(_))).collect();
    let review = results
        .iter()
        .filter(|r| matches!(&r.status, Status::Parsed(p) if p.needs_review))
        .count();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful ({} need review), {} duplicates, {} failed",
        style(parsed).green(),
        review,
        style(duplicates).yellow(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            if let Status::Failed(e) = &result.status {
                println!("  - {}: {}", result.path.display(), e);
            }
        }
    }

    Ok(())
}

fn write_summary(path: &Path, results: &[FileResult], config: &RcptConfig) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["filename", "status", "file_hash"];
    header.extend(ExportRow::headers());
    header.extend(["processing_time_ms", "duplicate_of", "error"]);
    wtr.write_record(&header)?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");

        let (status, parsed, duplicate_of, error) = match &result.status {
            Status::Parsed(p) => ("success", Some(p), "", ""),
            Status::Duplicate { result: p, of } => ("duplicate", Some(p), of.as_str(), ""),
            Status::Failed(e) => ("error", None, "", e.as_str()),
        };

        let mut record = vec![filename.to_string(), status.to_string(), result.file_hash.clone()];
        match parsed {
            Some(p) => record.extend(ExportRow::from_result(p, &config.export).to_record()),
            None => record.extend(ExportRow::headers().iter().map(|_| String::new())),
        }
        record.push(result.processing_time_ms.to_string());
        record.push(duplicate_of.to_string());
        record.push(error.to_string());

        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
