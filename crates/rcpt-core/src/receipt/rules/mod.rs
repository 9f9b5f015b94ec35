//! Rule-based candidate generators for receipt fields.

pub mod amounts;
pub mod currency;
pub mod dates;
pub mod lexicon;
pub mod patterns;
pub mod tax;
pub mod vendor;

pub use amounts::{AmountGenerator, SubtotalGenerator, TierPolicy, parse_amount};
pub use currency::CurrencyGenerator;
pub use dates::{DateGenerator, DateLocale};
pub use lexicon::{CompiledLexicon, KnownVendor, Lexicon};
pub use tax::TaxGenerator;
pub use vendor::VendorGenerator;

use regex::Regex;

use crate::models::document::ParseContext;
use crate::models::receipt::{Candidate, Field};
use crate::normalize::{Line, NormalizedDocument};

use patterns::{FORWARD_SUBJECT, FROM_HEADER, NORTH_AMERICAN_MARKER, DAY_FIRST_MARKER};

/// Trait for per-field candidate generators.
pub trait CandidateGenerator {
    /// The type of value this generator proposes.
    type Output;

    /// The field the candidates belong to.
    fn field(&self) -> Field;

    /// Produce unscored candidates for the document.
    fn generate(&self, doc: &DocumentContext<'_>) -> Vec<Candidate<Self::Output>>;
}

/// A named regex with an explicit trust level.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    pub name: &'static str,
    /// Lower is more trustworthy.
    pub priority: u8,
    pub regex: Regex,
}

impl PatternSpec {
    /// Build a spec from a built-in pattern.
    ///
    /// Panics if `pattern` is invalid; only used for patterns compiled in
    /// `lazy_static!` blocks.
    pub fn new(name: &'static str, priority: u8, pattern: &str) -> Self {
        Self {
            name,
            priority,
            regex: Regex::new(pattern).unwrap(),
        }
    }
}

/// Document-level facts that influence scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSignals {
    /// The document is an email forwarded by a person.
    pub forwarded: bool,
    /// Name of whoever sent or forwarded the document.
    pub own_sender: Option<String>,
    /// How ambiguous numeric dates are read.
    pub locale: DateLocale,
}

impl DocumentSignals {
    pub fn detect(doc: &NormalizedDocument, ctx: &ParseContext, lexicon: &CompiledLexicon) -> Self {
        let subject_forwarded = ctx
            .subject
            .as_deref()
            .is_some_and(|s| FORWARD_SUBJECT.is_match(&format!(" {}", s)));
        let header_forwarded = doc
            .lines
            .iter()
            .filter(|l| l.header)
            .any(|l| FORWARD_SUBJECT.is_match(&l.text));
        let header = first_from_header(doc);
        let header_free_mail = header
            .as_ref()
            .and_then(FromHeader::domain)
            .is_some_and(|domain| lexicon.is_free_mail_domain(&domain));
        let free_mail = header_free_mail
            || ctx
                .sender_domain()
                .is_some_and(|domain| lexicon.is_free_mail_domain(&domain));

        // Without caller metadata, a header only names the forwarder when it
        // sits above the forward delimiter or comes from a personal mailbox.
        let own_sender = ctx
            .sender_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                header
                    .filter(|h| !h.quoted && (doc.forward_marker || header_free_mail))
                    .map(|h| h.name)
                    .filter(|name| !name.is_empty() && !name.contains('@'))
            });

        let locale = if NORTH_AMERICAN_MARKER.is_match(&doc.text) {
            DateLocale::MonthFirst
        } else if DAY_FIRST_MARKER.is_match(&doc.text) {
            DateLocale::DayFirst
        } else {
            DateLocale::MonthFirst
        };

        Self {
            forwarded: doc.forward_marker || subject_forwarded || header_forwarded || free_mail,
            own_sender,
            locale,
        }
    }
}

/// A `From:` header line found in the document body.
#[derive(Debug, Clone, PartialEq)]
pub struct FromHeader {
    /// Display name; a bare address when the header has no name.
    pub name: String,
    pub email: Option<String>,
    /// The header follows a forward delimiter.
    pub quoted: bool,
}

impl FromHeader {
    /// Lowercase domain of the header address.
    pub fn domain(&self) -> Option<String> {
        let address = self.email.as_deref().unwrap_or(&self.name);
        address
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim().to_lowercase())
            .filter(|domain| !domain.is_empty())
    }
}

/// First `From:` header in the document.
pub fn first_from_header(doc: &NormalizedDocument) -> Option<FromHeader> {
    doc.lines.iter().filter(|l| l.header).find_map(|l| {
        let caps = FROM_HEADER.captures(&l.text)?;
        let name = caps
            .name("name")
            .map(|m| m.as_str().trim_matches(['"', '\'', '*', ' ']).to_string())
            .unwrap_or_default();
        Some(FromHeader {
            name,
            email: caps.name("email").map(|m| m.as_str().to_string()),
            quoted: l.quoted,
        })
    })
}

/// Everything a generator or scorer may look at.
#[derive(Debug, Clone, Copy)]
pub struct DocumentContext<'a> {
    pub doc: &'a NormalizedDocument,
    pub parse: &'a ParseContext,
    pub signals: &'a DocumentSignals,
    pub lexicon: &'a CompiledLexicon,
}

impl<'a> DocumentContext<'a> {
    pub fn line(&self, index: usize) -> Option<&'a Line> {
        self.doc.lines.get(index)
    }

    /// Text on the candidate's line before its span.
    pub fn text_before(&self, line: usize, offset: usize) -> &'a str {
        match self.line(line) {
            Some(l) if offset >= l.offset => self.doc.slice(l.offset, offset.min(l.end())),
            _ => "",
        }
    }
}

/// Run `f` against a normalized document built from `text`.
#[cfg(test)]
pub(crate) fn with_document<R>(text: &str, ctx: &ParseContext, f: impl FnOnce(&DocumentContext<'_>) -> R) -> R {
    let lexicon = CompiledLexicon::default();
    let doc = crate::normalize::Normalizer::new(&lexicon).normalize(text);
    let signals = DocumentSignals::detect(&doc, ctx, &lexicon);
    let document = DocumentContext {
        doc: &doc,
        parse: ctx,
        signals: &signals,
        lexicon: &lexicon,
    };
    f(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;

    fn signals(text: &str, ctx: &ParseContext) -> DocumentSignals {
        let lexicon = CompiledLexicon::default();
        let doc = Normalizer::new(&lexicon).normalize(text);
        DocumentSignals::detect(&doc, ctx, &lexicon)
    }

    #[test]
    fn test_forwarded_by_subject() {
        let s = signals("Total $5.00", &ParseContext::new().with_subject("Fwd: Your trip"));
        assert!(s.forwarded);
    }

    #[test]
    fn test_forwarded_by_free_mail_sender() {
        let ctx = ParseContext::new()
            .with_sender_name("Jorden Shaw")
            .with_sender_email("jorden.shaw@gmail.com");
        let s = signals("Uber\nTotal $5.00", &ctx);
        assert!(s.forwarded);
        assert_eq!(s.own_sender.as_deref(), Some("Jorden Shaw"));
    }

    #[test]
    fn test_not_forwarded() {
        let ctx = ParseContext::new()
            .with_sender_name("Uber Receipts")
            .with_sender_email("noreply@uber.com");
        let s = signals("Uber\nTotal $5.00", &ctx);
        assert!(!s.forwarded);
    }

    #[test]
    fn test_own_sender_from_header_above_delimiter() {
        let s = signals(
            "From: \"Jorden Shaw\" <jorden@example.com>\n---------- Forwarded message ---------\nFrom: Uber <noreply@uber.com>\nTotal $5.00",
            &ParseContext::default(),
        );
        assert!(s.forwarded);
        assert_eq!(s.own_sender.as_deref(), Some("Jorden Shaw"));
    }

    #[test]
    fn test_merchant_header_is_not_own_sender() {
        let plain = signals(
            "From: Acme Store <orders@acme.com>\nMain Street Market\nTotal: $12.50",
            &ParseContext::default(),
        );
        assert!(!plain.forwarded);
        assert_eq!(plain.own_sender, None);

        let forwarded = signals(
            "---------- Forwarded message ---------\nFrom: Acme Store <orders@acme.com>\nTotal: $12.50",
            &ParseContext::default(),
        );
        assert!(forwarded.forwarded);
        assert_eq!(forwarded.own_sender, None);
    }

    #[test]
    fn test_forwarded_by_free_mail_header() {
        let s = signals(
            "From: Jorden Shaw <jorden.shaw@gmail.com>\nSubject: Your trip\nThanks\nTotal $6.55",
            &ParseContext::default(),
        );
        assert!(s.forwarded);
        assert_eq!(s.own_sender.as_deref(), Some("Jorden Shaw"));

        let bare = signals("From: jorden.shaw@gmail.com\nTotal $6.55", &ParseContext::default());
        assert!(bare.forwarded);
        assert_eq!(bare.own_sender, None);
    }

    #[test]
    fn test_locale_detection() {
        assert_eq!(signals("GST $2.62", &ParseContext::default()).locale, DateLocale::MonthFirst);
        assert_eq!(signals("VAT 20.00", &ParseContext::default()).locale, DateLocale::DayFirst);
        assert_eq!(signals("Total £5.00", &ParseContext::default()).locale, DateLocale::DayFirst);
        assert_eq!(signals("Total $5.00", &ParseContext::default()).locale, DateLocale::MonthFirst);
    }
}
