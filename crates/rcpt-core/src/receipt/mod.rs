//! Receipt field extraction module.

mod parser;
pub mod review;
pub mod rules;
pub mod scoring;
pub mod select;
pub mod validate;

pub use parser::ReceiptParser;

use crate::models::document::{DocumentInput, ParseContext};
use crate::models::receipt::ParseResult;

/// Trait for receipt field extractors.
///
/// Extraction never fails: problems are reported as issues on the result.
pub trait ReceiptExtractor {
    /// Extract receipt fields from text or OCR words.
    fn extract(&self, input: &DocumentInput, ctx: &ParseContext) -> ParseResult;

    /// Extract receipt fields from plain text without email metadata.
    fn extract_text(&self, text: &str) -> ParseResult {
        self.extract(&DocumentInput::Text(text.to_string()), &ParseContext::default())
    }
}
