//! Word lists shared by the normalizer, generators and scorers.
//!
//! [`Lexicon`] is the serializable form that lives in the configuration file.
//! [`CompiledLexicon`] is built once per parser and is immutable afterwards.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A brand recognized anywhere in the document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownVendor {
    /// Case-insensitive regex.
    pub pattern: String,
    /// Display name reported as the vendor.
    pub name: String,
}

impl KnownVendor {
    fn new(pattern: &str, name: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            name: name.to_string(),
        }
    }
}

/// Tunable vocabulary used during extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Lines containing these terms never yield a total amount.
    pub amount_blacklist: Vec<String>,
    /// Legal-entity suffixes (`Inc`, `LLC`, ...).
    pub company_suffixes: Vec<String>,
    /// Words that mark a name as a business rather than a person.
    pub business_indicators: Vec<String>,
    /// Retail words that boost a vendor candidate.
    pub retail_keywords: Vec<String>,
    /// Capitalized words that continue a business name wrapped onto the next line.
    pub continuation_words: Vec<String>,
    /// First words of multi-word vendor names that OCR tends to wrap.
    pub wrap_prefixes: Vec<String>,
    /// Payment processors that appear in place of the real merchant.
    pub payment_processors: Vec<String>,
    pub known_vendors: Vec<KnownVendor>,
    /// Lines that are never a vendor name on their own.
    pub generic_phrases: Vec<String>,
    /// Consumer mail domains; a receipt sent from one was forwarded by a person.
    pub free_mail_domains: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            amount_blacklist: strings(&[
                "liability",
                "coverage",
                "insurance",
                "limit",
                "maximum",
                "up to",
                "points",
                "pts",
                "miles",
                "rewards",
                "booking reference",
                "confirmation",
                "reference",
                "tax breakdown",
            ]),
            company_suffixes: strings(&[
                "Incorporated",
                "Inc",
                "LLC",
                "Ltd",
                "Limited",
                "Corp",
                "Corporation",
                "Co",
                "Company",
                "GmbH",
                "PLC",
                "Labs",
            ]),
            business_indicators: strings(&[
                "inc",
                "llc",
                "ltd",
                "corp",
                "co",
                "company",
                "store",
                "shop",
                "market",
                "restaurant",
                "cafe",
                "clinic",
                "pharmacy",
                "services",
                "group",
                "labs",
                "airlines",
                "hotel",
                "receipts",
                "billing",
                "team",
                "support",
            ]),
            retail_keywords: strings(&[
                "store",
                "shop",
                "market",
                "supermarket",
                "mart",
                "restaurant",
                "cafe",
                "coffee",
                "bakery",
                "grill",
                "pizza",
                "kitchen",
                "pharmacy",
                "foods",
                "hotel",
                "airlines",
                "outfitters",
            ]),
            continuation_words: strings(&[
                "Inc",
                "LLC",
                "Ltd",
                "Corp",
                "Corporation",
                "Company",
                "Co",
                "Clinic",
                "Store",
                "Shop",
                "Market",
                "Restaurant",
                "Cafe",
                "Pharmacy",
                "Group",
                "Services",
                "Airlines",
            ]),
            wrap_prefixes: strings(&[
                "Air", "West", "East", "North", "South", "New", "San", "Los", "Las", "Saint", "St", "Fort",
                "Port", "Mount",
            ]),
            payment_processors: strings(&[
                "paddle.com market ltd",
                "paddle.com",
                "paddle.net",
                "paddle",
                "market ltd",
                "stripe",
                "square",
                "sq",
                "paypal",
                "google",
            ]),
            known_vendors: vec![
                KnownVendor::new(r"\buber\b", "Uber"),
                KnownVendor::new(r"\bamazon\b", "Amazon"),
                KnownVendor::new(r"\bairbnb\b", "Airbnb"),
                KnownVendor::new(r"\blyft\b", "Lyft"),
                KnownVendor::new(r"\bdoordash\b", "DoorDash"),
                KnownVendor::new(r"\bgrubhub\b", "Grubhub"),
                KnownVendor::new(r"\bskip\s*the\s*dishes\b", "Skip The Dishes"),
                KnownVendor::new(r"\bair\s*canada\b", "Air Canada"),
                KnownVendor::new(r"\bwestjet\b", "WestJet"),
                KnownVendor::new(r"\bapple\b", "Apple"),
                KnownVendor::new(r"\bwalmart\b", "Walmart"),
                KnownVendor::new(r"\btarget\b", "Target"),
                KnownVendor::new(r"\bstarbucks\b", "Starbucks"),
                KnownVendor::new(r"\bmcdonald", "McDonald's"),
                KnownVendor::new(r"\bpsa\s+submission\b", "PSA Canada"),
                KnownVendor::new(r"\bpsacanada@", "PSA Canada"),
            ],
            generic_phrases: strings(&[
                "receipt",
                "invoice",
                "bill",
                "order",
                "thanks",
                "thank you",
                "trip",
                "ride",
                "booking",
                "your order",
                "your trip",
                "your receipt",
                "your booking",
                "order summary",
                "payment summary",
                "order confirmation",
                "payment receipt",
                "tax invoice",
            ]),
            free_mail_domains: strings(&[
                "gmail.com",
                "googlemail.com",
                "outlook.com",
                "hotmail.com",
                "live.com",
                "yahoo.com",
                "icloud.com",
                "me.com",
                "proton.me",
                "protonmail.com",
            ]),
        }
    }
}

lazy_static! {
    /// The default lexicon, compiled once.
    pub static ref DEFAULT_LEXICON: CompiledLexicon = CompiledLexicon::compile(&Lexicon::default()).unwrap();
}

/// Never matches; used when a term list is empty.
const NEVER: &str = r"[^\s\S]";

/// Build a case-insensitive, word-bounded alternation from literal terms.
///
/// Longer terms come first so `paddle.com` wins over `paddle`. Internal
/// whitespace matches any run of whitespace.
fn alternation(terms: &[String]) -> String {
    let mut terms: Vec<&String> = terms.iter().filter(|t| !t.trim().is_empty()).collect();
    if terms.is_empty() {
        return NEVER.to_string();
    }
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let parts: Vec<String> = terms
        .iter()
        .map(|t| {
            t.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    format!("(?:{})", parts.join("|"))
}

/// The lexicon with every list compiled into regexes or lowercased sets.
#[derive(Debug, Clone)]
pub struct CompiledLexicon {
    pub blacklist: Regex,
    /// Matches a name ending in a company suffix.
    pub company_suffix_end: Regex,
    /// Captures `<Name> <Suffix>` inside a line.
    pub company_name: Regex,
    pub business_indicator: Regex,
    pub retail_keyword: Regex,
    /// Captures the merchant after `PROCESSOR*`.
    pub processor_prefix: Regex,
    pub known_vendors: Vec<(Regex, String)>,
    processors: Vec<String>,
    continuation_words: Vec<String>,
    wrap_prefixes: Vec<String>,
    generic_phrases: Vec<String>,
    free_mail_domains: Vec<String>,
}

impl CompiledLexicon {
    pub fn compile(lexicon: &Lexicon) -> Result<Self> {
        let blacklist = Regex::new(&format!(r"(?i)\b{}\b", alternation(&lexicon.amount_blacklist)))?;

        let suffixes = alternation(&lexicon.company_suffixes);
        let company_suffix_end = Regex::new(&format!(r"(?i)\b{}\.?$", suffixes))?;
        let company_name = Regex::new(&format!(
            r"(?P<name>[A-Z][A-Za-z0-9&'.\-]*(?:\s+[A-Z0-9&][A-Za-z0-9&'.\-]*){{0,5}}\s+(?i:{}))\b\.?",
            suffixes
        ))?;

        let business_indicator =
            Regex::new(&format!(r"(?i)\b{}\b", alternation(&lexicon.business_indicators)))?;
        let retail_keyword = Regex::new(&format!(r"(?i)\b{}\b", alternation(&lexicon.retail_keywords)))?;
        let processor_prefix = Regex::new(&format!(
            r"(?i)(?:^|[^A-Za-z0-9])(?P<processor>{})\s*\*\s*(?P<merchant>[A-Za-z0-9][A-Za-z0-9&'.\- ]*)",
            alternation(&lexicon.payment_processors)
        ))?;

        let known_vendors = lexicon
            .known_vendors
            .iter()
            .map(|v| Ok((Regex::new(&format!("(?i){}", v.pattern))?, v.name.clone())))
            .collect::<Result<Vec<_>>>()?;

        let lower = |items: &[String]| items.iter().map(|s| s.trim().to_lowercase()).collect::<Vec<_>>();

        Ok(Self {
            blacklist,
            company_suffix_end,
            company_name,
            business_indicator,
            retail_keyword,
            processor_prefix,
            known_vendors,
            processors: lower(&lexicon.payment_processors),
            continuation_words: lower(&lexicon.continuation_words),
            wrap_prefixes: lower(&lexicon.wrap_prefixes),
            generic_phrases: lower(&lexicon.generic_phrases),
            free_mail_domains: lower(&lexicon.free_mail_domains),
        })
    }

    /// Whether `name` is a payment processor rather than a merchant.
    pub fn is_processor(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.processors.iter().any(|p| *p == name)
    }

    pub fn is_continuation_word(&self, word: &str) -> bool {
        let word = word.trim_end_matches(['.', ',']).to_lowercase();
        self.continuation_words.iter().any(|w| *w == word)
    }

    pub fn is_wrap_prefix(&self, line: &str) -> bool {
        let line = line.trim().to_lowercase();
        self.wrap_prefixes.iter().any(|w| *w == line)
    }

    pub fn is_generic_phrase(&self, text: &str) -> bool {
        let text = text
            .trim()
            .trim_end_matches(['!', '.', ':'])
            .to_lowercase();
        self.generic_phrases.iter().any(|p| *p == text)
    }

    pub fn is_free_mail_domain(&self, domain: &str) -> bool {
        let domain = domain.trim().to_lowercase();
        self.free_mail_domains.iter().any(|d| *d == domain)
    }
}

impl Default for CompiledLexicon {
    fn default() -> Self {
        DEFAULT_LEXICON.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_respects_word_boundaries() {
        let lex = CompiledLexicon::default();
        assert!(lex.blacklist.is_match("Liability coverage is limited to $75,000"));
        assert!(lex.blacklist.is_match("You earned 120 pts"));
        assert!(lex.blacklist.is_match("Booking   reference: ABC123"));
        assert!(!lex.blacklist.is_match("Thanks for your receipts request"));
        assert!(!lex.blacklist.is_match("Total: $6.55"));
    }

    #[test]
    fn test_processor_prefix() {
        let lex = CompiledLexicon::default();
        let caps = lex.processor_prefix.captures("PADDLE.NET* GEOGUESSR").unwrap();
        assert_eq!(&caps["processor"], "PADDLE.NET");
        assert_eq!(caps["merchant"].trim(), "GEOGUESSR");

        let caps = lex.processor_prefix.captures("SQ *BLUE BOTTLE").unwrap();
        assert_eq!(caps["merchant"].trim(), "BLUE BOTTLE");
    }

    #[test]
    fn test_company_name() {
        let lex = CompiledLexicon::default();
        let caps = lex.company_name.captures("Billed by Lovable Labs Inc.").unwrap();
        assert_eq!(&caps["name"], "Lovable Labs Inc");
        assert!(lex.company_suffix_end.is_match("Acme Corp."));
        assert!(!lex.company_suffix_end.is_match("Acme Corporate Gifts"));
    }

    #[test]
    fn test_lookups() {
        let lex = CompiledLexicon::default();
        assert!(lex.is_processor("Paddle.com Market Ltd"));
        assert!(!lex.is_processor("GeoGuessr"));
        assert!(lex.is_continuation_word("Inc."));
        assert!(lex.is_wrap_prefix(" Air "));
        assert!(lex.is_generic_phrase("Your Receipt"));
        assert!(lex.is_free_mail_domain("Gmail.com"));
    }

    #[test]
    fn test_empty_list_never_matches() {
        let lexicon = Lexicon {
            amount_blacklist: Vec::new(),
            ..Lexicon::default()
        };
        let lex = CompiledLexicon::compile(&lexicon).unwrap();
        assert!(!lex.blacklist.is_match("liability"));
        assert!(!lex.blacklist.is_match(""));
    }

    #[test]
    fn test_invalid_vendor_pattern_is_an_error() {
        let mut lexicon = Lexicon::default();
        lexicon.known_vendors.push(KnownVendor::new(r"(unclosed", "Broken"));
        assert!(CompiledLexicon::compile(&lexicon).is_err());
    }
}
