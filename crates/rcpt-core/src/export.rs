//! Flat, string-valued rows for CSV and text export.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::config::ExportConfig;
use crate::models::receipt::ParseResult;

/// One exported receipt. Every column is filled: missing values use the
/// configured placeholder and a missing currency uses the fallback code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub date: String,
    pub vendor: String,
    pub amount: String,
    pub currency: String,
    pub tax: String,
    pub needs_review: bool,
    pub confidence: String,
    /// Review reasons and export notes joined with `"; "`, or `"None"`.
    pub warnings: String,
    /// Whether `currency` is the fallback rather than a detected code.
    pub currency_defaulted: bool,
}

fn money(value: Option<&Decimal>, missing: &str) -> String {
    match value {
        Some(v) => format!("{:.2}", v.round_dp(2)),
        None => missing.to_string(),
    }
}

impl ExportRow {
    pub fn from_result(result: &ParseResult, config: &ExportConfig) -> Self {
        let missing = config.missing_placeholder.as_str();
        let (currency, currency_defaulted) = match result.currency.value() {
            Some(code) => (code.to_string(), false),
            None => (config.fallback_currency.clone(), true),
        };

        let mut warnings: Vec<String> = result.review_reason.clone();
        if currency_defaulted {
            warnings.push(format!("currency defaulted to {}", currency));
        }
        if result.debug.forwarded {
            warnings.push("forwarded email".to_string());
        }

        Self {
            date: result
                .date
                .value()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| missing.to_string()),
            vendor: result.vendor.value().cloned().unwrap_or_else(|| missing.to_string()),
            amount: money(result.amount.value(), missing),
            currency,
            tax: money(result.tax.value(), missing),
            needs_review: result.needs_review,
            confidence: format!("{:.2}", result.overall_confidence),
            warnings: if warnings.is_empty() {
                "None".to_string()
            } else {
                warnings.join("; ")
            },
            currency_defaulted,
        }
    }

    /// Column names, in [`to_record`](Self::to_record) order.
    pub fn headers() -> [&'static str; 8] {
        [
            "date",
            "vendor",
            "amount",
            "currency",
            "tax",
            "review_status",
            "confidence",
            "warnings",
        ]
    }

    pub fn review_status(&self) -> &'static str {
        if self.needs_review { "Needs Review" } else { "Reviewed" }
    }

    pub fn to_record(&self) -> [String; 8] {
        [
            self.date.clone(),
            self.vendor.clone(),
            self.amount.clone(),
            self.currency.clone(),
            self.tax.clone(),
            self.review_status().to_string(),
            self.confidence.clone(),
            self.warnings.clone(),
        ]
    }
}
