//! Process command - extract fields from a single receipt.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use rcpt_core::{CandidateRecord, DuplicateDetector, DuplicateKind, ReceiptParser};

use super::{OutputFormat, format_result, load_config, load_document, load_prior};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (text, .eml, or a .json word list)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Email sender display name
    #[arg(long)]
    sender_name: Option<String>,

    /// Email sender address
    #[arg(long)]
    sender_email: Option<String>,

    /// Email subject
    #[arg(long)]
    subject: Option<String>,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,

    /// JSON file of stored receipts to check for duplicates
    #[arg(long)]
    prior: Option<PathBuf>,

    /// File hash for duplicate checks (default: SHA-256 of the input)
    #[arg(long)]
    file_hash: Option<String>,

    /// User the receipt belongs to
    #[arg(long, default_value = "local")]
    user: String,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let document = load_document(&args.input)?;
    let mut context = document.context;
    if args.sender_name.is_some() {
        context.sender_name = args.sender_name.clone();
    }
    if args.sender_email.is_some() {
        context.sender_email = args.sender_email.clone();
    }
    if args.subject.is_some() {
        context.subject = args.subject.clone();
    }

    let parser = ReceiptParser::with_config(config.clone())?;
    let result = parser.parse(&document.input, &context);

    let output = format_result(&result, args.format, &config)?;

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

    if let Some(prior_path) = &args.prior {
        let prior = load_prior(prior_path)?;
        let file_hash = args.file_hash.clone().unwrap_or(document.file_hash);
        let record = CandidateRecord::from_result(&result, args.user.as_str(), file_hash);

        match DuplicateDetector::new().check(&record, &prior) {
            Some(found) => {
                let how = match &found.kind {
                    DuplicateKind::ExactHash => "same file".to_string(),
                    DuplicateKind::Semantic { matched_fields } => format!(
                        "same {}",
                        matched_fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                };
                eprintln!(
                    "{} Duplicate of {} ({})",
                    style("⚠").yellow(),
                    found.record.id,
                    how
                );
            }
            None => debug!("No duplicate among {} prior records", prior.len()),
        }
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Overall confidence: {:.1}%",
            style("ℹ").blue(),
            result.overall_confidence * 100.0
        );
        for (field, confidence) in &result.debug.field_confidence {
            println!("   {:<9} {:.2}", field, confidence);
        }
        if result.needs_review {
            println!(
                "{} Needs review: {}",
                style("ℹ").blue(),
                result.review_reason.join("; ")
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
