//! Tax line candidate generation and summation.
//!
//! Receipts often list several taxes (GST and PST, or HST on two lines of a
//! split bill). Every distinct tax line is a candidate; the total tax is their
//! sum. Two matches are the same line when their amount spans overlap, so
//! equal values on different lines are both counted.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::amounts::scan_line;
use super::patterns::{CURRENCY_PREFIX, MONEY, MONEY_ONLY_LINE};
use super::{CandidateGenerator, DocumentContext, PatternSpec};
use crate::models::receipt::{Candidate, CandidateSource, Field, RawSpan};

/// Filler allowed between a tax label and its amount: rates, parentheses,
/// colons and pipes. Lazy so `VAT 20.00` does not lose its leading digits.
const TAX_GAP: &str = r"[\s:()%\d.,|/]*?";

lazy_static! {
    pub static ref TAX_PATTERNS: Vec<PatternSpec> = vec![
        PatternSpec::new(
            "vat",
            1,
            &format!(r"(?i)\b(?P<label>vat)\b{}{}\s*{}", TAX_GAP, CURRENCY_PREFIX, MONEY),
        ),
        PatternSpec::new(
            "regional_tax",
            1,
            &format!(
                r"(?i)\b(?P<label>sales\s+tax|hst|gst|pst|qst|tps|tvq)(?:\s*/\s*(?:tps|tvq|hst|gst|pst|qst))?\b{}{}\s*{}",
                TAX_GAP, CURRENCY_PREFIX, MONEY
            ),
        ),
        PatternSpec::new(
            "generic_tax",
            2,
            &format!(r"(?i)\b(?P<label>tax)\b{}{}\s*{}", TAX_GAP, CURRENCY_PREFIX, MONEY),
        ),
    ];

    /// A tax label alone on its line; the amount is on the next line.
    static ref TAX_LABEL_ONLY: Regex = Regex::new(
        r"(?i)^\s*(?:sales\s+tax|tax|vat|hst|gst|pst|qst)(?:\s*\([^)]*\))?\s*[:|]?\s*$"
    ).unwrap();

    static ref TOTAL_WORD: Regex = Regex::new(r"(?i)\btotal\b").unwrap();
}

/// Fraction of the shorter span covered by the overlap of two spans.
pub fn overlap_ratio(a: (usize, usize), b: (usize, usize)) -> f32 {
    let shorter = (a.1 - a.0).min(b.1 - b.0);
    if shorter == 0 {
        return 0.0;
    }
    let overlap = a.1.min(b.1).saturating_sub(a.0.max(b.0));
    overlap as f32 / shorter as f32
}

/// Tax line generator.
pub struct TaxGenerator {
    overlap_ratio: f32,
    max_amount: Decimal,
}

impl TaxGenerator {
    pub fn new() -> Self {
        Self {
            overlap_ratio: 0.5,
            max_amount: Decimal::from(10_000),
        }
    }

    /// Set the largest tax line accepted.
    pub fn with_max_amount(mut self, max: Decimal) -> Self {
        self.max_amount = max;
        self
    }

    fn plausible(&self, value: Decimal) -> bool {
        if value <= Decimal::ZERO {
            return false;
        }
        if value > self.max_amount {
            debug!("Discarding tax {} above {}", value, self.max_amount);
            return false;
        }
        true
    }

    /// Set the span overlap at which two matches count as one tax line.
    pub fn with_overlap_ratio(mut self, ratio: f32) -> Self {
        self.overlap_ratio = ratio;
        self
    }

    fn next_line_matches(&self, doc: &DocumentContext<'_>) -> Vec<Candidate<Decimal>> {
        let lines = &doc.doc.lines;
        let mut found = Vec::new();
        for pair in lines.windows(2) {
            let (label, value) = (&pair[0], &pair[1]);
            if !TAX_LABEL_ONLY.is_match(&label.text) {
                continue;
            }
            let Some(caps) = MONEY_ONLY_LINE.captures(&value.text) else {
                continue;
            };
            let Some(amt) = caps.name("amt") else {
                continue;
            };
            let Some(amount) = super::parse_amount(amt.as_str()).filter(|a| self.plausible(*a)) else {
                continue;
            };
            found.push(Candidate::new(
                amount,
                RawSpan::text(value.offset + amt.start(), value.offset + amt.end()),
                value.index,
                CandidateSource::BodyPattern,
                "tax_next_line",
                2,
                format!("{} {}", label.text, value.text),
            ));
        }
        found
    }
}

impl Default for TaxGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator for TaxGenerator {
    type Output = Decimal;

    fn field(&self) -> Field {
        Field::Tax
    }

    fn generate(&self, doc: &DocumentContext<'_>) -> Vec<Candidate<Decimal>> {
        let mut matches = Vec::new();

        for spec in TAX_PATTERNS.iter() {
            for line in &doc.doc.lines {
                for m in scan_line(spec, line) {
                    // "Total tax" restates the taxes listed above it.
                    if spec.name == "generic_tax" && TOTAL_WORD.is_match(&line.text[..m.label_start]) {
                        continue;
                    }
                    if !self.plausible(m.value) {
                        continue;
                    }
                    matches.push(Candidate::new(
                        m.value,
                        RawSpan::text(m.start, m.end),
                        line.index,
                        CandidateSource::BodyPattern,
                        spec.name,
                        spec.priority,
                        m.raw,
                    ));
                }
            }
        }
        matches.extend(self.next_line_matches(doc));

        matches.sort_by(|a, b| {
            a.span
                .start()
                .cmp(&b.span.start())
                .then(a.priority.cmp(&b.priority))
        });

        let mut lines: Vec<Candidate<Decimal>> = Vec::new();
        for candidate in matches {
            let Some(span) = candidate.span.range() else {
                continue;
            };
            let duplicate = lines.iter().any(|kept| {
                kept.span
                    .range()
                    .is_some_and(|k| overlap_ratio(k, span) >= self.overlap_ratio)
            });
            if duplicate {
                debug!("Dropping duplicate tax match {:?}", candidate.raw);
                continue;
            }
            lines.push(candidate);
        }
        lines
    }
}

/// Combine scored tax lines into one summed candidate.
///
/// Returns `None` for fewer than two lines or when the sum overflows. The
/// sum carries the best score and priority of its parts and spans from the
/// first to the last line.
pub fn sum_lines(lines: &[Candidate<Decimal>]) -> Option<Candidate<Decimal>> {
    if lines.len() < 2 {
        return None;
    }
    let Some(total) = lines.iter().try_fold(Decimal::ZERO, |acc, c| acc.checked_add(c.value)) else {
        warn!("Tax lines overflow when summed; keeping them separate");
        return None;
    };
    let first = lines.iter().min_by_key(|c| c.span.start())?;
    let start = first.span.start();
    let end = lines
        .iter()
        .filter_map(|c| c.span.range().map(|(_, end)| end))
        .max()
        .unwrap_or(start);
    let score = lines.iter().map(|c| c.score).fold(0.0f32, f32::max);
    let priority = lines.iter().map(|c| c.priority).min().unwrap_or(first.priority);
    let raw = lines.iter().map(|c| c.raw.as_str()).collect::<Vec<_>>().join(" + ");

    Some(
        Candidate::new(
            total,
            RawSpan::text(start, end),
            first.line,
            CandidateSource::BodyPattern,
            "tax_sum",
            priority,
            raw,
        )
        .scored(score),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::ParseContext;
    use crate::receipt::rules::with_document;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn taxes(text: &str) -> Vec<(Decimal, String)> {
        with_document(text, &ParseContext::default(), |doc| {
            TaxGenerator::new()
                .generate(doc)
                .into_iter()
                .map(|c| (c.value, c.pattern))
                .collect()
        })
    }

    #[test]
    fn test_multiple_regional_taxes() {
        let found = taxes("Subtotal $52.40\nCANADA GST/TPS (5%): $2.62\nHST $4.70\nTotal $59.72");
        assert_eq!(
            found,
            vec![
                (dec("2.62"), "regional_tax".to_string()),
                (dec("4.70"), "regional_tax".to_string()),
            ]
        );
    }

    #[test]
    fn test_pipe_separator() {
        assert_eq!(taxes("HST| $1.09"), vec![(dec("1.09"), "regional_tax".to_string())]);
    }

    #[test]
    fn test_vat_without_symbol_keeps_digits() {
        assert_eq!(taxes("VAT 20.00"), vec![(dec("20.00"), "vat".to_string())]);
        assert_eq!(taxes("VAT (23%): € 643.77"), vec![(dec("643.77"), "vat".to_string())]);
    }

    #[test]
    fn test_same_span_is_counted_once() {
        assert_eq!(taxes("Sales tax: $1.00"), vec![(dec("1.00"), "regional_tax".to_string())]);
    }

    #[test]
    fn test_equal_values_on_different_lines_are_kept() {
        let found = taxes("GST 5% $1.19\nPST 5% $1.19");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_summary_lines_are_not_taxes() {
        assert!(taxes("Tax total CA$0.33").is_empty());
        assert!(taxes("Total tax: $1.09").is_empty());
        assert!(taxes("Tax ID: 123456789").is_empty());
    }

    #[test]
    fn test_amount_on_next_line() {
        assert_eq!(
            taxes("Sales Tax\nCA$0.33"),
            vec![(dec("0.33"), "tax_next_line".to_string())]
        );
    }

    #[test]
    fn test_overlap_ratio() {
        assert_eq!(overlap_ratio((0, 4), (0, 4)), 1.0);
        assert_eq!(overlap_ratio((0, 4), (2, 10)), 0.5);
        assert_eq!(overlap_ratio((0, 4), (4, 8)), 0.0);
        assert_eq!(overlap_ratio((0, 0), (0, 4)), 0.0);
    }

    #[test]
    fn test_sum_lines() {
        let gst = Candidate::new(dec("2.62"), RawSpan::text(10, 14), 1, CandidateSource::BodyPattern, "regional_tax", 1, "GST $2.62")
            .scored(0.8);
        let hst = Candidate::new(dec("4.70"), RawSpan::text(30, 34), 2, CandidateSource::BodyPattern, "regional_tax", 1, "HST $4.70")
            .scored(0.9);

        let sum = sum_lines(&[gst.clone(), hst]).unwrap();
        assert_eq!(sum.value, dec("7.32"));
        assert_eq!(sum.score, 0.9);
        assert_eq!(sum.span, RawSpan::text(10, 34));
        assert_eq!(sum.line, 1);
        assert_eq!(sum.pattern, "tax_sum");

        assert!(sum_lines(&[gst]).is_none());
    }

    #[test]
    fn test_sum_lines_overflow() {
        let huge = |start: usize| {
            Candidate::new(Decimal::MAX, RawSpan::text(start, start + 4), 1, CandidateSource::BodyPattern, "vat", 1, "VAT")
        };
        assert!(sum_lines(&[huge(0), huge(10)]).is_none());
    }

    #[test]
    fn test_oversized_tax_is_discarded() {
        assert!(taxes("GST $79228162514264337593543950335.00").is_empty());
        assert!(taxes("HST $25,000.00").is_empty());
        let found = with_document("HST $25,000.00", &ParseContext::default(), |doc| {
            TaxGenerator::new().with_max_amount(Decimal::from(50_000)).generate(doc).len()
        });
        assert_eq!(found, 1);
    }
}
