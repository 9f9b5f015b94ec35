//! Total amount and subtotal candidate generation.

use std::str::FromStr;

use lazy_static::lazy_static;
use rust_decimal::Decimal;
use tracing::debug;

use super::patterns::{has_disqualifying_qualifier, CURRENCY_PREFIX, LABEL_SEP, MONEY, MONEY_LOOSE, TRAILING_CODE};
use super::{CandidateGenerator, DocumentContext, PatternSpec};
use crate::models::receipt::{Candidate, CandidateSource, Field, RawSpan};
use crate::normalize::Line;

/// Amount core without the trailing guard, for patterns followed by a code.
const MONEY_CORE: &str = r"(?P<amt>\d{1,3}(?:[,.]\d{3})*[.,]\d{2}|\d+[.,]\d{2})";

lazy_static! {
    /// Total amount patterns, ordered by priority tier.
    pub static ref AMOUNT_PATTERNS: Vec<PatternSpec> = vec![
        PatternSpec::new(
            "explicit_total",
            1,
            &format!(
                r"(?i)\b(?:amount\s+paid|total\s+paid|grand\s+total|final\s+total|(?:amount|total)\s+charged)\b{}{}\s*{}",
                LABEL_SEP, CURRENCY_PREFIX, MONEY
            ),
        ),
        PatternSpec::new(
            "total_with_symbol",
            2,
            &format!(
                r"(?i)^[*|\s]*(?:(?:order|invoice|receipt)\s+)?total\b{}(?:[A-Za-z]{{0,3}}\s?[$€£¥]|(?:USD|CAD|EUR|GBP|AUD|NZD|CHF)\s)\s*{}",
                LABEL_SEP, MONEY
            ),
        ),
        PatternSpec::new(
            "total_with_code",
            2,
            &format!(
                r"(?i)^[*|\s]*(?:grand\s+)?total\b{}{}\s*{}",
                LABEL_SEP, MONEY_CORE, TRAILING_CODE
            ),
        ),
        PatternSpec::new(
            "generic_total",
            3,
            &format!(
                r"(?i)\b(?P<label>total|amount(?:\s+due)?|balance(?:\s+due)?|sum|paid)\b{}{}\s*{}",
                LABEL_SEP, CURRENCY_PREFIX, MONEY
            ),
        ),
        PatternSpec::new(
            "currency_symbol",
            4,
            &format!(r"(?:[A-Za-z]{{1,3}}\s?)?[$€£¥]\s*{}", MONEY_LOOSE),
        ),
        PatternSpec::new(
            "amount_with_code",
            4,
            &format!(r"{}\s*{}", MONEY_CORE, TRAILING_CODE),
        ),
    ];

    /// Subtotal patterns. Used for cross-validation only.
    pub static ref SUBTOTAL_PATTERNS: Vec<PatternSpec> = vec![
        PatternSpec::new(
            "subtotal",
            1,
            &format!(r"(?i)\bsub[\s-]?total\b{}{}\s*{}", LABEL_SEP, CURRENCY_PREFIX, MONEY),
        ),
        PatternSpec::new(
            "trip_fare",
            2,
            &format!(r"(?i)\b(?:trip\s+)?fare\b{}{}\s*{}", LABEL_SEP, CURRENCY_PREFIX, MONEY),
        ),
    ];
}

/// How amount tiers are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierPolicy {
    /// Stop at the first tier that yields an accepted match.
    #[default]
    FirstSuccessful,
    /// Collect every tier.
    All,
}

/// A money match on one line, before it becomes a candidate.
#[derive(Debug, Clone)]
pub(crate) struct MoneyMatch {
    pub value: Decimal,
    pub start: usize,
    pub end: usize,
    pub raw: String,
    /// Offset of the label or match start within the line.
    pub label_start: usize,
}

/// Run `spec` over one line and return every money match.
pub(crate) fn scan_line(spec: &PatternSpec, line: &Line) -> Vec<MoneyMatch> {
    spec.regex
        .captures_iter(&line.text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let amt = caps.name("amt")?;
            let value = parse_amount(amt.as_str())?;
            let label_start = caps.name("label").map(|m| m.start()).unwrap_or(whole.start());
            Some(MoneyMatch {
                value,
                start: line.offset + amt.start(),
                end: line.offset + amt.end(),
                raw: line.text[whole.start()..amt.end()].trim().to_string(),
                label_start,
            })
        })
        .collect()
}

fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Total amount generator.
pub struct AmountGenerator {
    max_generic_amount: Decimal,
    policy: TierPolicy,
}

impl AmountGenerator {
    pub fn new() -> Self {
        Self {
            max_generic_amount: Decimal::from(10_000),
            policy: TierPolicy::FirstSuccessful,
        }
    }

    /// Set the ceiling for generic and symbol-only matches.
    pub fn with_max_generic_amount(mut self, max: Decimal) -> Self {
        self.max_generic_amount = max;
        self
    }

    pub fn with_policy(mut self, policy: TierPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn accept(&self, spec: &PatternSpec, line: &Line, m: &MoneyMatch, doc: &DocumentContext<'_>) -> bool {
        if doc.lexicon.blacklist.is_match(&line.text) {
            debug!("Discarding amount {} on blacklisted line {:?}", m.value, line.text);
            return false;
        }
        if m.value <= Decimal::ZERO {
            return false;
        }
        if spec.priority >= 3 && m.value > self.max_generic_amount {
            debug!("Discarding generic amount {} above {}", m.value, self.max_generic_amount);
            return false;
        }
        if spec.name == "generic_total" && has_disqualifying_qualifier(&line.text[..m.label_start]) {
            return false;
        }
        true
    }

    fn tier(
        &self,
        priority: u8,
        doc: &DocumentContext<'_>,
        taken: &mut Vec<(usize, usize)>,
    ) -> Vec<Candidate<Decimal>> {
        let mut candidates = Vec::new();

        for spec in AMOUNT_PATTERNS.iter().filter(|s| s.priority == priority) {
            for line in &doc.doc.lines {
                for m in scan_line(spec, line) {
                    if !self.accept(spec, line, &m, doc) {
                        continue;
                    }
                    if taken.iter().any(|span| overlaps(*span, (m.start, m.end))) {
                        continue;
                    }
                    taken.push((m.start, m.end));
                    candidates.push(Candidate::new(
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

        candidates.sort_by_key(|c| c.span.start());
        candidates
    }
}

impl Default for AmountGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator for AmountGenerator {
    type Output = Decimal;

    fn field(&self) -> Field {
        Field::Amount
    }

    fn generate(&self, doc: &DocumentContext<'_>) -> Vec<Candidate<Decimal>> {
        let mut tiers: Vec<u8> = AMOUNT_PATTERNS.iter().map(|s| s.priority).collect();
        tiers.dedup();

        let mut taken = Vec::new();
        let mut all = Vec::new();
        for priority in tiers {
            let found = self.tier(priority, doc, &mut taken);
            debug!("Amount tier {} produced {} candidates", priority, found.len());
            if found.is_empty() {
                continue;
            }
            all.extend(found);
            if self.policy == TierPolicy::FirstSuccessful {
                break;
            }
        }
        all
    }
}

/// Subtotal generator.
pub struct SubtotalGenerator {
    max_amount: Decimal,
}

impl SubtotalGenerator {
    pub fn new() -> Self {
        Self {
            max_amount: Decimal::from(10_000),
        }
    }

    /// Set the largest subtotal accepted.
    pub fn with_max_amount(mut self, max: Decimal) -> Self {
        self.max_amount = max;
        self
    }
}

impl Default for SubtotalGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator for SubtotalGenerator {
    type Output = Decimal;

    fn field(&self) -> Field {
        Field::Subtotal
    }

    fn generate(&self, doc: &DocumentContext<'_>) -> Vec<Candidate<Decimal>> {
        let mut candidates = Vec::new();
        for spec in SUBTOTAL_PATTERNS.iter() {
            for line in &doc.doc.lines {
                for m in scan_line(spec, line) {
                    if m.value <= Decimal::ZERO {
                        continue;
                    }
                    if m.value > self.max_amount {
                        debug!("Discarding subtotal {} above {}", m.value, self.max_amount);
                        continue;
                    }
                    candidates.push(Candidate::new(
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
        candidates
    }
}

/// Parse an amount in US (`1,234.56`) or European (`1.234,56`) format.
///
/// A lone separator followed by one or two digits is a decimal point;
/// followed by three digits it groups thousands.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let decimals_after = |pos: usize| cleaned.len() - pos - 1;

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            if cleaned.matches(',').count() == 1 && (1..=2).contains(&decimals_after(c)) {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(d)) => {
            if cleaned.matches('.').count() > 1 || decimals_after(d) == 3 {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::ParseContext;
    use crate::receipt::rules::with_document;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn amounts(text: &str) -> Vec<(Decimal, String)> {
        with_document(text, &ParseContext::default(), |doc| {
            AmountGenerator::new()
                .generate(doc)
                .into_iter()
                .map(|c| (c.value, c.pattern))
                .collect()
        })
    }

    fn subtotals(text: &str) -> Vec<Decimal> {
        with_document(text, &ParseContext::default(), |doc| {
            SubtotalGenerator::new().generate(doc).into_iter().map(|c| c.value).collect()
        })
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("6.55"), Some(dec("6.55")));
        assert_eq!(parse_amount("59,99"), Some(dec("59.99")));
        assert_eq!(parse_amount("75,000"), Some(dec("75000")));
        assert_eq!(parse_amount("1.234"), Some(dec("1234")));
        assert_eq!(parse_amount("$12"), Some(dec("12")));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_pipe_separated_total() {
        let found = amounts("Trip fare| $6.40\nHST| $1.09\nTotal| $6.55");
        assert_eq!(found, vec![(dec("6.55"), "total_with_symbol".to_string())]);
    }

    #[test]
    fn test_explicit_label_beats_liability_clause() {
        let found = amounts(
            "Amount paid: $126.07\nYour liability for damage is limited to $75,000 per rental.",
        );
        assert_eq!(found, vec![(dec("126.07"), "explicit_total".to_string())]);
    }

    #[test]
    fn test_blacklisted_lines_are_skipped_in_every_tier() {
        let found = amounts("You earned 1,250 points worth $12.50\nRewards balance $40.00\n$8.75");
        assert_eq!(found, vec![(dec("8.75"), "currency_symbol".to_string())]);
    }

    #[test]
    fn test_subtotal_and_tax_total_are_not_totals() {
        let found = amounts("Sub total: $50.00\nTax total: $6.50\nAmount due: $56.50");
        assert_eq!(found, vec![(dec("56.50"), "generic_total".to_string())]);
    }

    #[test]
    fn test_generic_ceiling() {
        let found = amounts("Balance 25,000.00\n$19.99");
        assert_eq!(found, vec![(dec("19.99"), "currency_symbol".to_string())]);
    }

    #[test]
    fn test_total_with_currency_code() {
        let found = amounts("Subtotal: | 52.99 CAD\nTotal: | 59.99 CAD");
        assert_eq!(found, vec![(dec("59.99"), "total_with_code".to_string())]);
    }

    #[test]
    fn test_total_cad_dollar() {
        let found = amounts("TOTAL CAD $ 59.52");
        assert_eq!(found, vec![(dec("59.52"), "total_with_symbol".to_string())]);
    }

    #[test]
    fn test_european_amount() {
        let found = amounts("Grand total: € 1.234,56");
        assert_eq!(found, vec![(dec("1234.56"), "explicit_total".to_string())]);
    }

    #[test]
    fn test_all_tiers_policy() {
        let found = with_document("Amount paid: $10.00\n$3.00", &ParseContext::default(), |doc| {
            AmountGenerator::new().with_policy(TierPolicy::All).generate(doc).len()
        });
        // The generic and symbol matches on `$10.00` share its span and are dropped.
        assert_eq!(found, 2);
    }

    #[test]
    fn test_no_amount() {
        assert!(amounts("Thanks for shopping").is_empty());
    }

    #[test]
    fn test_subtotal_patterns() {
        assert_eq!(subtotals("Trip fare| $6.40"), vec![dec("6.40")]);
        assert_eq!(subtotals("Subtotal: $50.00\nAirfare $300.00"), vec![dec("50.00")]);
        assert_eq!(subtotals("Sub-total 12,50"), vec![dec("12.50")]);
    }

    #[test]
    fn test_oversized_subtotal_is_discarded() {
        assert!(subtotals("Subtotal $79228162514264337593543950335.00").is_empty());
        assert!(subtotals("Subtotal $12,000.00").is_empty());
        let found = with_document("Subtotal $12,000.00", &ParseContext::default(), |doc| {
            SubtotalGenerator::new()
                .with_max_amount(Decimal::from(20_000))
                .generate(doc)
                .len()
        });
        assert_eq!(found, 1);
    }
}
