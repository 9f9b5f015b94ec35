//! Currency candidate generation.

use lazy_static::lazy_static;
use regex::Captures;

use super::patterns::NORTH_AMERICAN_MARKER;
use super::{CandidateGenerator, DocumentContext, PatternSpec};
use crate::models::receipt::{Candidate, CandidateSource, Currency, Field, RawSpan};

lazy_static! {
    pub static ref CURRENCY_PATTERNS: Vec<PatternSpec> = vec![
        PatternSpec::new(
            "iso_code",
            1,
            r"\b(?P<code>USD|CAD|EUR|GBP|JPY|AUD|NZD|CHF|INR|MXN)\b",
        ),
        PatternSpec::new(
            "prefixed_dollar",
            1,
            r"(?:^|[^A-Za-z])(?P<code>CA|C|US|AU|A|NZ)\s?\$",
        ),
        PatternSpec::new("symbol", 2, r"(?P<code>[€£¥])"),
        PatternSpec::new("bare_dollar", 3, r"(?:^|[^A-Za-z])(?P<code>\$)"),
    ];
}

/// Map a matched marker to a currency.
fn currency_of(pattern: &str, code: &str) -> Option<Currency> {
    match pattern {
        "iso_code" => Currency::from_code(code),
        "prefixed_dollar" => match code {
            "CA" | "C" => Some(Currency::Cad),
            "US" => Some(Currency::Usd),
            "AU" | "A" => Some(Currency::Aud),
            "NZ" => Some(Currency::Nzd),
            _ => None,
        },
        "symbol" => match code {
            "€" => Some(Currency::Eur),
            "£" => Some(Currency::Gbp),
            "¥" => Some(Currency::Jpy),
            _ => None,
        },
        "bare_dollar" => Some(Currency::Usd),
        _ => None,
    }
}

/// Whether a pattern names the currency outright.
pub fn is_explicit(pattern: &str) -> bool {
    matches!(pattern, "iso_code" | "prefixed_dollar")
}

/// Matched span from the marker itself, excluding the leading boundary character.
fn marker_span(caps: &Captures<'_>) -> Option<(usize, usize)> {
    let code = caps.name("code")?;
    let whole = caps.get(0)?;
    Some((code.start(), whole.end()))
}

/// Number of explicit markers for `currency` anywhere in the document.
pub fn explicit_occurrences(doc: &DocumentContext<'_>, currency: Currency) -> usize {
    CURRENCY_PATTERNS
        .iter()
        .filter(|spec| is_explicit(spec.name))
        .map(|spec| {
            doc.doc
                .lines
                .iter()
                .flat_map(|line| spec.regex.captures_iter(&line.text))
                .filter(|caps| {
                    caps.name("code")
                        .and_then(|code| currency_of(spec.name, code.as_str()))
                        == Some(currency)
                })
                .count()
        })
        .sum()
}

/// Currency generator.
pub struct CurrencyGenerator;

impl CurrencyGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CurrencyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator for CurrencyGenerator {
    type Output = Currency;

    fn field(&self) -> Field {
        Field::Currency
    }

    fn generate(&self, doc: &DocumentContext<'_>) -> Vec<Candidate<Currency>> {
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut candidates = Vec::new();

        for spec in CURRENCY_PATTERNS.iter() {
            for line in &doc.doc.lines {
                for caps in spec.regex.captures_iter(&line.text) {
                    let Some((start, end)) = marker_span(&caps) else {
                        continue;
                    };
                    let span = (line.offset + start, line.offset + end);
                    // `CA $` is one marker, not CAD plus a bare dollar.
                    if taken.iter().any(|t| t.0 < span.1 && span.0 < t.1) {
                        continue;
                    }
                    let Some(currency) = caps.name("code").and_then(|c| currency_of(spec.name, c.as_str())) else {
                        continue;
                    };
                    taken.push(span);
                    candidates.push(Candidate::new(
                        currency,
                        RawSpan::text(span.0, span.1),
                        line.index,
                        CandidateSource::BodyPattern,
                        spec.name,
                        spec.priority,
                        &line.text[start..end],
                    ));
                }
            }
        }

        if let Some(marker) = NORTH_AMERICAN_MARKER.find(&doc.doc.text) {
            candidates.push(Candidate::new(
                Currency::Cad,
                RawSpan::text(marker.start(), marker.end()),
                doc.doc.line_at(marker.start()),
                CandidateSource::Inferred,
                "tax_locale",
                3,
                marker.as_str(),
            ));
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::ParseContext;
    use crate::receipt::rules::with_document;
    use pretty_assertions::assert_eq;

    fn currencies(text: &str) -> Vec<(Currency, String)> {
        with_document(text, &ParseContext::default(), |doc| {
            CurrencyGenerator::new()
                .generate(doc)
                .into_iter()
                .map(|c| (c.value, c.pattern))
                .collect()
        })
    }

    #[test]
    fn test_iso_codes_are_case_sensitive() {
        assert_eq!(currencies("Total: 59.99 CAD"), vec![(Currency::Cad, "iso_code".to_string())]);
        assert!(currencies("eur is not a code here").is_empty());
    }

    #[test]
    fn test_prefixed_dollar_is_one_marker() {
        assert_eq!(currencies("Total CA$12.00"), vec![(Currency::Cad, "prefixed_dollar".to_string())]);
        assert_eq!(currencies("Total US $12.00"), vec![(Currency::Usd, "prefixed_dollar".to_string())]);
        assert_eq!(currencies("A$40.00"), vec![(Currency::Aud, "prefixed_dollar".to_string())]);
    }

    #[test]
    fn test_symbols_and_bare_dollar() {
        assert_eq!(currencies("€ 12,00"), vec![(Currency::Eur, "symbol".to_string())]);
        assert_eq!(currencies("£5.00"), vec![(Currency::Gbp, "symbol".to_string())]);
        assert_eq!(currencies("Total $5.00"), vec![(Currency::Usd, "bare_dollar".to_string())]);
    }

    #[test]
    fn test_canadian_tax_infers_cad() {
        assert_eq!(
            currencies("HST $1.09"),
            vec![
                (Currency::Usd, "bare_dollar".to_string()),
                (Currency::Cad, "tax_locale".to_string()),
            ]
        );
    }

    #[test]
    fn test_explicit_occurrences() {
        let count = with_document("Subtotal 10.00 CAD\nTotal CA$11.30\nPaid $11.30", &ParseContext::default(), |doc| {
            explicit_occurrences(doc, Currency::Cad)
        });
        assert_eq!(count, 2);
    }
}
