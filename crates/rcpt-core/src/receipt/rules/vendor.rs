//! Vendor candidate generation.
//!
//! Vendors come from email metadata, brand and company-name patterns, and a
//! heuristic over the first lines of the body. Payment processors are never
//! reported as vendors; the merchant behind them is recovered instead.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::dates::DATE_PATTERNS;
use super::patterns::{EMAIL_NOISE_WORDS, FROM_HEADER};
use super::{CandidateGenerator, DocumentContext};
use crate::models::receipt::{Candidate, CandidateSource, Field, RawSpan};
use crate::normalize::Line;

/// Non-header lines searched for company-suffix names.
const COMPANY_SCAN_LINES: usize = 30;

/// Longest vendor name kept, in words.
const MAX_NAME_WORDS: usize = 6;

lazy_static! {
    static ref PAYABLE_TO: Regex = Regex::new(
        r"(?i)\bpayable\s+to\s*:?\s*(?P<name>[A-Za-z0-9][A-Za-z0-9&'.\- ]{1,60})"
    ).unwrap();

    static ref STATEMENT_AS: Regex = Regex::new(
        r"(?i)\bstatement\s+as\b\s*:?\s*(?P<desc>.*)$"
    ).unwrap();
}

/// Clean a raw vendor string: trim punctuation, collapse whitespace, keep the
/// first words, and title-case names written entirely in capitals.
pub fn clean_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());
    let words: Vec<&str> = trimmed.split_whitespace().take(MAX_NAME_WORDS).collect();
    let name = words
        .join(" ")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string();

    if name.chars().filter(|c| c.is_alphabetic()).count() < 2 {
        return None;
    }

    let shouting = !name.chars().any(|c| c.is_lowercase())
        && name
            .split_whitespace()
            .any(|w| w.chars().filter(|c| c.is_alphabetic()).count() >= 4);
    if shouting {
        return Some(name.split_whitespace().map(title_word).collect::<Vec<_>>().join(" "));
    }
    Some(name)
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Strip mailer words such as `Receipts` or `noreply` from a display name.
fn strip_noise(name: &str) -> String {
    EMAIL_NOISE_WORDS.replace_all(name, " ").to_string()
}

/// Vendor generator.
pub struct VendorGenerator {
    scan_lines: usize,
}

impl VendorGenerator {
    pub fn new() -> Self {
        Self { scan_lines: 20 }
    }

    /// Set how many content lines the first-lines heuristic looks at.
    pub fn with_scan_lines(mut self, lines: usize) -> Self {
        self.scan_lines = lines;
        self
    }

    fn from_headers(&self, doc: &DocumentContext<'_>, out: &mut Vec<Candidate<String>>) {
        for line in doc.doc.lines.iter().filter(|l| l.header) {
            let Some(caps) = FROM_HEADER.captures(&line.text) else {
                continue;
            };
            let Some(name) = caps.name("name") else {
                continue;
            };
            if name.as_str().contains('@') {
                continue;
            }
            let Some(value) = clean_name(&strip_noise(name.as_str())).filter(|v| v.len() >= 3) else {
                continue;
            };
            out.push(Candidate::new(
                value,
                RawSpan::text(line.offset + name.start(), line.offset + name.end()),
                line.index,
                CandidateSource::EmailHeader,
                "from_header",
                1,
                name.as_str(),
            ));
        }
    }

    fn from_sender(&self, doc: &DocumentContext<'_>, out: &mut Vec<Candidate<String>>) {
        let Some(sender) = doc.parse.sender_name.as_deref() else {
            return;
        };
        if sender.contains('@') {
            return;
        }
        if let Some(value) = clean_name(&strip_noise(sender)).filter(|v| v.len() >= 3) {
            out.push(Candidate::new(
                value,
                RawSpan::Context,
                0,
                CandidateSource::SenderName,
                "sender_name",
                1,
                sender,
            ));
        }
    }

    fn from_body_patterns(&self, doc: &DocumentContext<'_>, out: &mut Vec<Candidate<String>>) {
        for line in &doc.doc.lines {
            for caps in PAYABLE_TO.captures_iter(&line.text) {
                let Some(name) = caps.name("name") else {
                    continue;
                };
                if let Some(value) = clean_name(name.as_str()) {
                    out.push(body_candidate(line, name.start(), name.end(), value, "payable_to"));
                }
            }
        }

        for (regex, name) in &doc.lexicon.known_vendors {
            if let Some(m) = regex.find(&doc.doc.text) {
                let line = doc.doc.line_at(m.start());
                out.push(Candidate::new(
                    name.clone(),
                    RawSpan::text(m.start(), m.end()),
                    line,
                    CandidateSource::BodyPattern,
                    "known_vendor",
                    2,
                    m.as_str(),
                ));
            }
        }

        for line in doc.doc.content_lines().take(COMPANY_SCAN_LINES) {
            for caps in doc.lexicon.company_name.captures_iter(&line.text) {
                let Some(name) = caps.name("name") else {
                    continue;
                };
                if let Some(value) = clean_name(name.as_str()) {
                    out.push(body_candidate(line, name.start(), name.end(), value, "company_suffix"));
                }
            }
        }
    }

    fn from_processors(&self, doc: &DocumentContext<'_>, out: &mut Vec<Candidate<String>>) {
        let lines = &doc.doc.lines;
        for (i, line) in lines.iter().enumerate() {
            for caps in doc.lexicon.processor_prefix.captures_iter(&line.text) {
                let Some(merchant) = caps.name("merchant") else {
                    continue;
                };
                let Some(value) = clean_name(merchant.as_str()) else {
                    continue;
                };
                out.push(Candidate::new(
                    value,
                    RawSpan::text(line.offset + merchant.start(), line.offset + merchant.end()),
                    line.index,
                    CandidateSource::PaymentProcessor,
                    "processor_prefix",
                    2,
                    &line.text,
                ));
            }

            let Some(caps) = STATEMENT_AS.captures(&line.text) else {
                continue;
            };
            let (source_line, desc, offset) = match caps.name("desc") {
                Some(d) if !d.as_str().trim().is_empty() => (line, d.as_str(), d.start()),
                _ => match lines.get(i + 1) {
                    Some(next) => (next, next.text.as_str(), 0),
                    None => continue,
                },
            };

            let (desc, offset) = match doc.lexicon.processor_prefix.captures(desc) {
                Some(inner) => match inner.name("merchant") {
                    Some(m) => (m.as_str(), offset + m.start()),
                    None => (desc, offset),
                },
                None => (desc, offset),
            };
            if let Some(value) = clean_name(desc) {
                out.push(Candidate::new(
                    value,
                    RawSpan::text(source_line.offset + offset, source_line.offset + offset + desc.len()),
                    source_line.index,
                    CandidateSource::PaymentProcessor,
                    "statement_descriptor",
                    2,
                    desc,
                ));
            }
        }
    }

    fn from_first_lines(&self, doc: &DocumentContext<'_>, out: &mut Vec<Candidate<String>>) {
        for line in doc.doc.content_lines().take(self.scan_lines) {
            if !is_name_line(doc, &line.text) {
                continue;
            }
            if let Some(value) = clean_name(&line.text) {
                out.push(Candidate::new(
                    value,
                    RawSpan::text(line.offset, line.end()),
                    line.index,
                    CandidateSource::LineHeuristic,
                    "first_lines",
                    4,
                    &line.text,
                ));
            }
        }
    }
}

fn body_candidate(line: &Line, start: usize, end: usize, value: String, pattern: &'static str) -> Candidate<String> {
    Candidate::new(
        value,
        RawSpan::text(line.offset + start, line.offset + end),
        line.index,
        CandidateSource::BodyPattern,
        pattern,
        2,
        &line.text[start..end],
    )
}

/// Whether a body line could be a vendor name on its own.
fn is_name_line(doc: &DocumentContext<'_>, text: &str) -> bool {
    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    let words = text.split_whitespace().count();

    if text.len() < 3 || letters < 2 || words > 8 {
        return false;
    }
    if digits * 10 > (letters + digits) * 3 {
        return false;
    }
    if text.contains([':', '@', '$', '€', '£', '¥', '|']) || text.to_lowercase().contains("http") {
        return false;
    }
    if DATE_PATTERNS.iter().any(|p| p.regex.is_match(text)) || doc.lexicon.processor_prefix.is_match(text) {
        return false;
    }
    let first_word = text.split_whitespace().next().unwrap_or("");
    if doc.lexicon.is_generic_phrase(text) || doc.lexicon.is_generic_phrase(first_word) {
        return false;
    }
    !doc.lexicon.blacklist.is_match(text)
}

impl Default for VendorGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator for VendorGenerator {
    type Output = String;

    fn field(&self) -> Field {
        Field::Vendor
    }

    fn generate(&self, doc: &DocumentContext<'_>) -> Vec<Candidate<String>> {
        let mut candidates = Vec::new();
        self.from_headers(doc, &mut candidates);
        self.from_sender(doc, &mut candidates);
        self.from_body_patterns(doc, &mut candidates);
        self.from_processors(doc, &mut candidates);
        self.from_first_lines(doc, &mut candidates);

        candidates.retain(|c| {
            let keep = c.source == CandidateSource::PaymentProcessor || !doc.lexicon.is_processor(&c.value);
            if !keep {
                debug!("Dropping payment processor {:?} as vendor", c.value);
            }
            keep
        });
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::ParseContext;
    use crate::receipt::rules::with_document;
    use pretty_assertions::assert_eq;

    fn vendors(text: &str, ctx: &ParseContext) -> Vec<(String, String)> {
        with_document(text, ctx, |doc| {
            VendorGenerator::new()
                .generate(doc)
                .into_iter()
                .map(|c| (c.value, c.pattern))
                .collect()
        })
    }

    fn has(found: &[(String, String)], value: &str, pattern: &str) -> bool {
        found.iter().any(|(v, p)| v == value && p == pattern)
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  **GEOGUESSR** ").as_deref(), Some("Geoguessr"));
        assert_eq!(clean_name("Lovable Labs Inc.").as_deref(), Some("Lovable Labs Inc"));
        assert_eq!(clean_name("AT&T").as_deref(), Some("AT&T"));
        assert_eq!(clean_name("One Two Three Four Five Six Seven").as_deref(), Some("One Two Three Four Five Six"));
        assert_eq!(clean_name("-- 1 --"), None);
    }

    #[test]
    fn test_header_and_sender_names() {
        let ctx = ParseContext::new().with_sender_name("Uber Receipts");
        let found = vendors("From: \"Lyft Receipts\" <no-reply@lyft.com>\nThanks for riding", &ctx);
        assert!(has(&found, "Lyft", "from_header"));
        assert!(has(&found, "Uber", "sender_name"));
    }

    #[test]
    fn test_known_vendor_and_first_lines() {
        let found = vendors("Uber\nThanks for riding, Jorden\nTotal $6.55", &ParseContext::default());
        assert!(has(&found, "Uber", "known_vendor"));
        assert!(has(&found, "Uber", "first_lines"));
        assert!(!found.iter().any(|(v, _)| v.starts_with("Thanks")));
    }

    #[test]
    fn test_company_suffix_and_payable_to() {
        let found = vendors(
            "Billed by Lovable Labs Inc.\nPlease make cheques payable to Smith Dental Clinic",
            &ParseContext::default(),
        );
        assert!(has(&found, "Lovable Labs Inc", "company_suffix"));
        assert!(has(&found, "Smith Dental Clinic", "payable_to"));
    }

    #[test]
    fn test_processor_merchant_is_recovered() {
        let found = vendors(
            "Paddle.com Market Ltd\nPADDLE.NET* GEOGUESSR\nThis charge will appear on your statement as:\nPADDLE.NET* GEOGUESSR",
            &ParseContext::default(),
        );
        assert!(has(&found, "Geoguessr", "processor_prefix"));
        assert!(has(&found, "Geoguessr", "statement_descriptor"));
        assert!(!found.iter().any(|(v, _)| v.to_lowercase().starts_with("paddle")));
    }

    #[test]
    fn test_first_lines_skip_noise() {
        let found = vendors(
            "Your receipt\nOrder #12345678\nJan 15, 2024\nTotal: $5.00\nCorner Bakery",
            &ParseContext::default(),
        );
        let heuristic: Vec<&str> = found
            .iter()
            .filter(|(_, p)| p == "first_lines")
            .map(|(v, _)| v.as_str())
            .collect();
        assert_eq!(heuristic, vec!["Corner Bakery"]);
    }

    #[test]
    fn test_scan_line_limit() {
        let found = with_document("Receipt\nTotal $1.00\nCorner Bakery", &ParseContext::default(), |doc| {
            VendorGenerator::new().with_scan_lines(2).generate(doc)
        });
        assert!(found.is_empty());
    }
}
