//! Receipt parser combining normalization, rule-based generation, scoring,
//! selection, validation and review gating.

use std::fmt::Debug;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::config::RcptConfig;
use crate::models::document::{DocumentInput, InputKind, ParseContext, Word};
use crate::models::receipt::{Candidate, DebugInfo, Field, FieldResult, Issue, ParseResult};
use crate::normalize::Normalizer;
use crate::spatial::{reconstruct_lines, Layout, SpatialLabel, SpatialSearch};

use super::rules::{
    tax, AmountGenerator, CandidateGenerator, CompiledLexicon, CurrencyGenerator, DateGenerator, DocumentContext,
    DocumentSignals, SubtotalGenerator, TaxGenerator, VendorGenerator,
};
use super::scoring::{score_amount, score_currency, score_date, score_subtotal, score_tax, score_vendor};
use super::select::{contenders, decimal_key, select, vendor_key};
use super::validate::check_consistency;
use super::{review, ReceiptExtractor};

/// Attach scores to freshly generated candidates.
fn scored<T>(candidates: Vec<Candidate<T>>, score: impl Fn(&Candidate<T>) -> f32) -> Vec<Candidate<T>> {
    candidates
        .into_iter()
        .map(|c| {
            let s = score(&c);
            c.scored(s)
        })
        .collect()
}

/// Rule-based receipt parser.
///
/// Holds the configuration and the compiled lexicon; parsing is read-only, so
/// one parser can be shared across threads.
pub struct ReceiptParser {
    config: RcptConfig,
    lexicon: CompiledLexicon,
}

impl ReceiptParser {
    /// Create a parser with default settings.
    pub fn new() -> Self {
        Self {
            config: RcptConfig::default(),
            lexicon: CompiledLexicon::default(),
        }
    }

    /// Create a parser from a configuration, compiling its lexicon.
    pub fn with_config(config: RcptConfig) -> Result<Self> {
        config.validate()?;
        let lexicon = CompiledLexicon::compile(&config.lexicon)?;
        Ok(Self { config, lexicon })
    }

    pub fn config(&self) -> &RcptConfig {
        &self.config
    }

    /// Parse plain text such as an email body or OCR output.
    pub fn parse_text(&self, text: &str, ctx: &ParseContext) -> ParseResult {
        self.run(text, None, InputKind::Text, ctx)
    }

    /// Parse OCR words: the text pipeline runs on reconstructed lines, and
    /// bounding-box search adds amount, subtotal and tax candidates.
    pub fn parse_words(&self, words: &[Word], ctx: &ParseContext) -> ParseResult {
        let layout = reconstruct_lines(words, self.config.spatial.line_tolerance);
        debug!("Reconstructed {} lines from {} words", layout.lines.len(), words.len());
        self.run(&layout.text, Some((words, &layout)), InputKind::Words, ctx)
    }

    pub fn parse(&self, input: &DocumentInput, ctx: &ParseContext) -> ParseResult {
        match input {
            DocumentInput::Text(text) => self.parse_text(text, ctx),
            DocumentInput::Words(words) => self.parse_words(words, ctx),
        }
    }

    fn run(&self, text: &str, spatial: Option<(&[Word], &Layout)>, kind: InputKind, ctx: &ParseContext) -> ParseResult {
        info!("Parsing {:?} document ({} bytes)", kind, text.len());

        let doc = Normalizer::new(&self.lexicon).normalize(text);
        let mut result = ParseResult::empty(kind);
        result.debug.line_count = doc.lines.len();

        if doc.is_empty() {
            warn!("Document has no usable text");
            result.debug.push_issue(
                Issue::MalformedInput {
                    reason: "empty or whitespace-only input".to_string(),
                },
                "document is empty",
            );
            for field in Field::ALL.into_iter().filter(|f| *f != Field::Subtotal) {
                result
                    .debug
                    .push_issue(Issue::NoCandidateFound { field }, format!("no {} candidate found", field));
            }
            review::apply(&mut result, &self.config.review);
            return result;
        }

        let signals = DocumentSignals::detect(&doc, ctx, &self.lexicon);
        result.debug.forwarded = signals.forwarded;
        if signals.forwarded {
            debug!("Document looks forwarded; own sender {:?}", signals.own_sender);
        }

        let dc = DocumentContext {
            doc: &doc,
            parse: ctx,
            signals: &signals,
            lexicon: &self.lexicon,
        };
        let extraction = &self.config.extraction;

        let vendors = scored(
            VendorGenerator::new()
                .with_scan_lines(extraction.vendor_scan_lines)
                .generate(&dc),
            |c| score_vendor(c, &dc),
        );
        let mut amounts = scored(
            AmountGenerator::new()
                .with_max_generic_amount(extraction.max_generic_amount)
                .generate(&dc),
            |c| score_amount(c, &dc),
        );
        let mut subtotals = scored(
            SubtotalGenerator::new()
                .with_max_amount(extraction.max_generic_amount)
                .generate(&dc),
            |c| score_subtotal(c, &dc),
        );
        let tax_lines = scored(
            TaxGenerator::new()
                .with_overlap_ratio(extraction.tax_overlap_ratio)
                .with_max_amount(extraction.max_generic_amount)
                .generate(&dc),
            |c| score_tax(c, &dc),
        );
        let dates = scored(DateGenerator::new().generate(&dc), |c| score_date(c, &dc));
        let currencies = scored(CurrencyGenerator::new().generate(&dc), |c| score_currency(c, &dc));

        let tax_sum = tax::sum_lines(&tax_lines);
        if tax_sum.is_none() && tax_lines.len() > 1 {
            result
                .debug
                .warnings
                .push(format!("{} tax lines could not be summed", tax_lines.len()));
        }
        let mut taxes: Vec<Candidate<Decimal>> = tax_sum.into_iter().collect();
        taxes.extend(tax_lines);

        if let Some((words, layout)) = spatial {
            let search = SpatialSearch::new(&self.config.spatial, &self.lexicon)
                .with_max_amount(extraction.max_generic_amount);
            amounts.extend(search.find(words, layout, SpatialLabel::Amount));
            subtotals.extend(search.find(words, layout, SpatialLabel::Subtotal));
            taxes.extend(search.find(words, layout, SpatialLabel::Tax));
        }

        result.vendor = select(vendors, vendor_key);
        result.amount = select(amounts, decimal_key);
        result.subtotal = select(subtotals, decimal_key);
        result.tax = select(taxes, decimal_key);
        result.date = select(dates, |d| *d);
        result.currency = select(currencies, |c| *c);

        let margin = extraction.ambiguity_margin;
        record(&mut result.debug, Field::Vendor, &result.vendor, Some(margin));
        record(&mut result.debug, Field::Amount, &result.amount, Some(margin));
        record(&mut result.debug, Field::Subtotal, &result.subtotal, None);
        record(&mut result.debug, Field::Tax, &result.tax, None);
        record(&mut result.debug, Field::Date, &result.date, Some(margin));
        record(&mut result.debug, Field::Currency, &result.currency, None);

        result.validation = check_consistency(
            result.amount.value().copied(),
            result.subtotal.value().copied(),
            result.tax.value().copied(),
            extraction.consistency_tolerance,
        );

        let weights = &extraction.weights;
        let mut overall = weights.vendor * result.vendor.confidence
            + weights.amount * result.amount.confidence
            + weights.date * result.date.confidence
            + weights.tax * result.tax.confidence
            + weights.currency * result.currency.confidence;

        if !result.validation.consistent {
            let expected = result.validation.expected_total.unwrap_or_default();
            let actual = result.validation.amount.unwrap_or_default();
            let detail = result
                .validation
                .detail
                .clone()
                .unwrap_or_else(|| "subtotal + tax does not match total".to_string());
            warn!("{}", detail);
            result.debug.push_issue(Issue::InconsistentTotals { expected, actual }, detail);
            overall -= extraction.inconsistency_penalty;
        }

        result.overall_confidence = if overall.is_nan() { 0.0 } else { overall.clamp(0.0, 1.0) };
        review::apply(&mut result, &self.config.review);

        info!(
            "Parsed document: overall confidence {:.2}, needs review: {}",
            result.overall_confidence, result.needs_review
        );
        result
    }
}

/// Fill the audit entries for one field.
///
/// Subtotal is never reported missing; it only feeds the consistency check.
fn record<T: Debug>(debug_info: &mut DebugInfo, field: Field, result: &FieldResult<T>, margin: Option<f32>) {
    let name = field.as_str().to_string();
    debug_info.field_confidence.insert(name.clone(), result.confidence);

    let Some(best) = result.best.as_ref() else {
        if field != Field::Subtotal {
            debug_info.push_issue(Issue::NoCandidateFound { field }, format!("no {} candidate found", field));
        }
        return;
    };

    debug!("Selected {} = {:?} via {} ({:.2})", field, best.value, best.pattern, result.confidence);
    debug_info.patterns_matched.insert(name, best.pattern.clone());

    if let Some(margin) = margin {
        let close = contenders(result, margin);
        if close > 1 {
            debug_info.push_issue(
                Issue::AmbiguousMatch { field, candidates: close },
                format!("{} {} candidates score within {:.2} of the best", close, field, margin),
            );
        }
    }
}

impl Default for ReceiptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptExtractor for ReceiptParser {
    fn extract(&self, input: &DocumentInput, ctx: &ParseContext) -> ParseResult {
        self.parse(input, ctx)
    }
}
