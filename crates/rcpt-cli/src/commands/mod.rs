//! Subcommands and the input/output helpers they share.

pub mod batch;
pub mod config;
pub mod process;

use std::fs;
use std::path::Path;

use anyhow::Context;
use sha2::{Digest, Sha256};

use rcpt_core::{DocumentInput, ExportRow, ParseContext, ParseResult, PriorRecord, RcptConfig};

/// File extensions `batch` picks up.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "eml", "text", "json"];

/// Engine configuration from `--config`, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<RcptConfig> {
    match config_path {
        Some(path) => RcptConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path)),
        None => Ok(RcptConfig::default()),
    }
}

/// Hex SHA-256 of file content.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// A loaded input file.
pub struct LoadedDocument {
    pub input: DocumentInput,
    /// Email headers found at the top of `.eml` files.
    pub context: ParseContext,
    pub file_hash: String,
}

/// Read a receipt file: a JSON word list for `.json`, text otherwise.
pub fn load_document(path: &Path) -> anyhow::Result<LoadedDocument> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_hash = sha256_hex(&bytes);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let (input, context) = match extension.as_str() {
        "json" => {
            let input = DocumentInput::words_from_json(&String::from_utf8_lossy(&bytes))
                .with_context(|| format!("Failed to load {}", path.display()))?;
            (input, ParseContext::default())
        }
        "eml" => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let context = email_context(&text);
            (DocumentInput::Text(text), context)
        }
        _ => (
            DocumentInput::Text(String::from_utf8_lossy(&bytes).into_owned()),
            ParseContext::default(),
        ),
    };

    Ok(LoadedDocument {
        input,
        context,
        file_hash,
    })
}

/// Sender and subject from the header block of an email file.
fn email_context(text: &str) -> ParseContext {
    let mut context = ParseContext::default();

    for line in text.lines().take_while(|l| !l.trim().is_empty()) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_lowercase().as_str() {
            "from" => {
                // `Display Name <address>` or a bare address
                match value.split_once('<') {
                    Some((display, address)) => {
                        let display = display.trim().trim_matches('"').trim();
                        if !display.is_empty() {
                            context.sender_name = Some(display.to_string());
                        }
                        context.sender_email = Some(address.trim_end_matches('>').trim().to_string());
                    }
                    None if value.contains('@') => context.sender_email = Some(value.to_string()),
                    None => context.sender_name = Some(value.to_string()),
                }
            }
            "subject" => context.subject = Some(value.to_string()),
            _ => {}
        }
    }

    context
}

/// Stored records for duplicate checks, from a JSON array file.
pub fn load_prior(path: &Path) -> anyhow::Result<Vec<PriorRecord>> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of records", path.display()))?;
    Ok(records)
}

/// Output format for extraction results.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
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

pub fn format_result(result: &ParseResult, format: OutputFormat, config: &RcptConfig) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(&ExportRow::from_result(result, &config.export)),
        OutputFormat::Text => Ok(format_text(result, &ExportRow::from_result(result, &config.export))),
    }
}

fn format_csv(row: &ExportRow) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(ExportRow::headers())?;
    wtr.write_record(row.to_record())?;
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ParseResult, row: &ExportRow) -> String {
    let mut output = String::new();

    output.push_str(&format!("Vendor:   {}\n", row.vendor));
    output.push_str(&format!("Date:     {}\n", row.date));
    output.push_str(&format!("Amount:   {} {}\n", row.amount, row.currency));
    output.push_str(&format!("Tax:      {}\n", row.tax));
    if let Some(subtotal) = result.subtotal.value() {
        output.push_str(&format!("Subtotal: {}\n", subtotal));
    }
    output.push('\n');
    output.push_str(&format!("Confidence: {}\n", row.confidence));
    output.push_str(&format!("Status:     {}\n", row.review_status()));

    if !result.review_reason.is_empty() {
        output.push_str("\nReview reasons:\n");
        for reason in &result.review_reason {
            output.push_str(&format!("  - {}\n", reason));
        }
    }

    output
}
