//! Receipt extraction result models.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::document::{BoundingBox, InputKind};

/// Maximum number of alternatives kept per field.
pub const MAX_ALTERNATIVES: usize = 3;

/// The extracted fields of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Vendor,
    Amount,
    Subtotal,
    Tax,
    Date,
    Currency,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Vendor,
        Field::Amount,
        Field::Subtotal,
        Field::Tax,
        Field::Date,
        Field::Currency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Vendor => "vendor",
            Field::Amount => "amount",
            Field::Subtotal => "subtotal",
            Field::Tax => "tax",
            Field::Date => "date",
            Field::Currency => "currency",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO 4217 currency codes recognized on receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Cad,
    Eur,
    Gbp,
    Jpy,
    Aud,
    Nzd,
    Chf,
    Inr,
    Mxn,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Cad => "CAD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Aud => "AUD",
            Currency::Nzd => "NZD",
            Currency::Chf => "CHF",
            Currency::Inr => "INR",
            Currency::Mxn => "MXN",
        }
    }

    /// Parse an ISO code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "USD" => Some(Currency::Usd),
            "CAD" => Some(Currency::Cad),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            "JPY" => Some(Currency::Jpy),
            "AUD" => Some(Currency::Aud),
            "NZD" => Some(Currency::Nzd),
            "CHF" => Some(Currency::Chf),
            "INR" => Some(Currency::Inr),
            "MXN" => Some(Currency::Mxn),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Where a candidate value was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawSpan {
    /// Byte range in the normalized text.
    Text { start: usize, end: usize },
    /// A word located by bounding-box search, with the label it was paired to.
    Region {
        word: usize,
        value_box: BoundingBox,
        label_box: BoundingBox,
    },
    /// Supplied by the caller rather than found in the document.
    Context,
}

impl RawSpan {
    pub fn text(start: usize, end: usize) -> Self {
        RawSpan::Text { start, end }
    }

    /// Ordering key used for tie-breaking: text offset or word index.
    pub fn start(&self) -> usize {
        match self {
            RawSpan::Text { start, .. } => *start,
            RawSpan::Region { word, .. } => *word,
            RawSpan::Context => usize::MAX,
        }
    }

    /// Byte range for text spans.
    pub fn range(&self) -> Option<(usize, usize)> {
        match self {
            RawSpan::Text { start, end } => Some((*start, *end)),
            _ => None,
        }
    }
}

/// Origin of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    BodyPattern,
    EmailHeader,
    SenderName,
    LineHeuristic,
    PaymentProcessor,
    Spatial,
    Inferred,
}

impl CandidateSource {
    /// Candidates found in the document body (as opposed to email metadata).
    pub fn is_body(&self) -> bool {
        matches!(
            self,
            CandidateSource::BodyPattern | CandidateSource::LineHeuristic | CandidateSource::PaymentProcessor
        )
    }
}

/// One proposed value for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate<T> {
    pub value: T,
    pub span: RawSpan,
    /// Index of the normalized line the value came from.
    pub line: usize,
    pub source: CandidateSource,
    /// Name of the pattern family that produced the candidate.
    pub pattern: String,
    /// Lower is more trustworthy.
    pub priority: u8,
    /// Matched source text.
    pub raw: String,
    /// Score in [0, 1].
    pub score: f32,
}

impl<T> Candidate<T> {
    /// Create an unscored candidate.
    pub fn new(
        value: T,
        span: RawSpan,
        line: usize,
        source: CandidateSource,
        pattern: impl Into<String>,
        priority: u8,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            value,
            span,
            line,
            source,
            pattern: pattern.into(),
            priority,
            raw: raw.into(),
            score: 0.0,
        }
    }

    /// Attach the final score, clamped to [0, 1].
    pub fn scored(mut self, score: f32) -> Self {
        self.score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        self
    }
}

/// Selected value for one field plus up to three ranked alternatives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult<T> {
    pub best: Option<Candidate<T>>,
    pub alternatives: Vec<Candidate<T>>,
    pub confidence: f32,
}

impl<T> FieldResult<T> {
    pub fn empty() -> Self {
        Self {
            best: None,
            alternatives: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.best.as_ref().map(|c| &c.value)
    }

    pub fn is_found(&self) -> bool {
        self.best.is_some()
    }

    pub fn pattern(&self) -> Option<&str> {
        self.best.as_ref().map(|c| c.pattern.as_str())
    }
}

impl<T> Default for FieldResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Outcome of the subtotal + tax = total check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    /// Whether subtotal, tax and amount were all present.
    pub checked: bool,
    /// False only when the check ran and failed.
    pub consistent: bool,
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub expected_total: Option<Decimal>,
    pub amount: Option<Decimal>,
    /// `expected_total - amount`.
    pub difference: Option<Decimal>,
    pub detail: Option<String>,
}

impl Validation {
    pub fn unchecked() -> Self {
        Self {
            checked: false,
            consistent: true,
            subtotal: None,
            tax: None,
            expected_total: None,
            amount: None,
            difference: None,
            detail: None,
        }
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::unchecked()
    }
}

/// Conditions recorded while parsing a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    NoCandidateFound { field: Field },
    AmbiguousMatch { field: Field, candidates: usize },
    InconsistentTotals { expected: Decimal, actual: Decimal },
    MalformedInput { reason: String },
}

/// Audit data attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    pub input_kind: InputKind,
    /// Normalized lines fed to the generators.
    pub line_count: usize,
    /// Whether the document was detected as a forwarded email.
    pub forwarded: bool,
    /// Field name to the pattern family of its best candidate.
    pub patterns_matched: BTreeMap<String, String>,
    /// Confidence for every field, including missing ones.
    pub field_confidence: BTreeMap<String, f32>,
    pub warnings: Vec<String>,
    pub issues: Vec<Issue>,
}

impl DebugInfo {
    pub fn new(input_kind: InputKind) -> Self {
        Self {
            input_kind,
            line_count: 0,
            forwarded: false,
            patterns_matched: BTreeMap::new(),
            field_confidence: Field::ALL
                .iter()
                .map(|field| (field.as_str().to_string(), 0.0))
                .collect(),
            warnings: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Record an issue along with a readable warning.
    pub fn push_issue(&mut self, issue: Issue, warning: impl Into<String>) {
        self.issues.push(issue);
        self.warnings.push(warning.into());
    }
}

/// Structured extraction result for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub vendor: FieldResult<String>,
    pub amount: FieldResult<Decimal>,
    pub subtotal: FieldResult<Decimal>,
    pub tax: FieldResult<Decimal>,
    pub date: FieldResult<NaiveDate>,
    pub currency: FieldResult<Currency>,
    pub overall_confidence: f32,
    pub needs_review: bool,
    pub review_reason: Vec<String>,
    pub validation: Validation,
    pub debug: DebugInfo,
}

impl ParseResult {
    /// A result with every field missing.
    pub fn empty(input_kind: InputKind) -> Self {
        Self {
            vendor: FieldResult::empty(),
            amount: FieldResult::empty(),
            subtotal: FieldResult::empty(),
            tax: FieldResult::empty(),
            date: FieldResult::empty(),
            currency: FieldResult::empty(),
            overall_confidence: 0.0,
            needs_review: true,
            review_reason: Vec::new(),
            validation: Validation::unchecked(),
            debug: DebugInfo::new(input_kind),
        }
    }

    pub fn confidence_of(&self, field: Field) -> f32 {
        match field {
            Field::Vendor => self.vendor.confidence,
            Field::Amount => self.amount.confidence,
            Field::Subtotal => self.subtotal.confidence,
            Field::Tax => self.tax.confidence,
            Field::Date => self.date.confidence,
            Field::Currency => self.currency.confidence,
        }
    }

    pub fn pattern_of(&self, field: Field) -> Option<&str> {
        match field {
            Field::Vendor => self.vendor.pattern(),
            Field::Amount => self.amount.pattern(),
            Field::Subtotal => self.subtotal.pattern(),
            Field::Tax => self.tax.pattern(),
            Field::Date => self.date.pattern(),
            Field::Currency => self.currency.pattern(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::from_code("cad"), Some(Currency::Cad));
        assert_eq!(Currency::from_code("XYZ"), None);
        assert_eq!(Currency::Gbp.to_string(), "GBP");
        assert_eq!(serde_json::to_string(&Currency::Eur).unwrap(), "\"EUR\"");
    }

    #[test]
    fn test_scored_clamps() {
        let c = Candidate::new(1, RawSpan::text(0, 1), 0, CandidateSource::BodyPattern, "p", 1, "1");
        assert_eq!(c.clone().scored(1.7).score, 1.0);
        assert_eq!(c.clone().scored(-0.2).score, 0.0);
        assert_eq!(c.scored(f32::NAN).score, 0.0);
    }

    #[test]
    fn test_empty_result_shape() {
        let result = ParseResult::empty(InputKind::Text);
        assert!(result.needs_review);
        assert!(result.validation.consistent);
        assert_eq!(result.debug.field_confidence.len(), Field::ALL.len());
        assert!(result.vendor.alternatives.is_empty());
    }

    #[test]
    fn test_context_span_sorts_last() {
        assert!(RawSpan::Context.start() > RawSpan::text(10_000, 10_005).start());
    }
}
