//! Common regex patterns for receipt extraction.
//!
//! Money fragments capture the value in a group named `amt`. The trailing
//! `(?:[^%\d]|$)` keeps a match from ending inside a longer number or on a
//! percentage such as `13.00%`.

use lazy_static::lazy_static;
use regex::Regex;

/// Decimal amount with thousands separators in either US or European style.
pub const MONEY: &str = r"(?P<amt>\d{1,3}(?:[,.]\d{3})*[.,]\d{2}|\d+[.,]\d{2})(?:[^%\d]|$)";

/// Like [`MONEY`] but the decimal part is optional (`$75,000`, `$12`).
pub const MONEY_LOOSE: &str = r"(?P<amt>\d{1,3}(?:,\d{3})+(?:\.\d{2})?|\d+(?:[.,]\d{2})?)(?:[^%\d]|$)";

/// Optional currency marker before an amount: `$`, `C$`, `CA $`, `CAD $`, `EUR `.
pub const CURRENCY_PREFIX: &str = r"(?:[A-Za-z]{0,3}\s?[$€£¥]|(?:USD|CAD|EUR|GBP|AUD|NZD|CHF)\s)?";

/// Separator between a label and its value: colons, pipes, markdown bold, spaces.
pub const LABEL_SEP: &str = r"[\s:|*]*";

/// ISO codes accepted after an amount.
pub const TRAILING_CODE: &str = r"(?:USD|CAD|EUR|GBP|AUD|NZD|CHF)\b";

lazy_static! {
    // Normalizer
    pub static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();

    /// Three or more single letters separated by single spaces (`U B E R`).
    pub static ref SPACED_LETTERS: Regex = Regex::new(
        r"\b[A-Za-z](?: [A-Za-z]){2,}\b"
    ).unwrap();

    /// Lines that never carry a receipt field.
    pub static ref SKIP_LINE: Regex = Regex::new(
        r"(?i)^(?:(?:bill(?:ed)?|invoice|ship|sold)\s+to\b|customer\b[^:]{0,20}:|page\s+\d+(?:\s+of\s+\d+)?$|\d+\s+of\s+\d+$|(?:to|cc|bcc|sent|reply-to)\s*:|\[?https?://\S*\]?$|<?mailto:)"
    ).unwrap();

    pub static ref FORWARD_DELIMITER: Regex = Regex::new(
        r"(?i)^[-=_*>\s]*(?:(?:begin\s+)?forwarded\s+message|original\s+message)\b[-=_*:\s]*$"
    ).unwrap();

    /// Email headers kept in the text but excluded from body heuristics.
    pub static ref HEADER_LINE: Regex = Regex::new(
        r"(?i)^(?:from|subject|date)\s*:"
    ).unwrap();

    // Email
    pub static ref FROM_HEADER: Regex = Regex::new(
        r"(?i)^from:\s*(?P<name>[^<]*?)\s*(?:<(?P<email>[^>\s]+)>)?\s*$"
    ).unwrap();

    pub static ref FORWARD_SUBJECT: Regex = Regex::new(
        r"(?i)(?:^|[\s:\[])(?:fwd?|fw):"
    ).unwrap();

    pub static ref EMAIL_NOISE_WORDS: Regex = Regex::new(
        r"(?i)\b(?:receipts?|notifications?|noreply|no-reply|do-not-reply|billing)\b"
    ).unwrap();

    // Document signals
    pub static ref NORTH_AMERICAN_MARKER: Regex = Regex::new(
        r"(?i)\b(?:gst|hst|pst|qst|canada)\b"
    ).unwrap();

    pub static ref DAY_FIRST_MARKER: Regex = Regex::new(
        r"(?i)£|\bvat\b"
    ).unwrap();

    // Scoring
    /// Labels that make an amount a strong total.
    pub static ref STRONG_TOTAL_PREFIX: Regex = Regex::new(
        r"(?i)\b(?:amount\s+paid|total\s+paid|grand\s+total|final\s+total|(?:amount|total)\s+charged|total)\b"
    ).unwrap();

    pub static ref TOTAL_KEYWORD: Regex = Regex::new(
        r"(?i)\b(?:total|amount|paid|due|balance|charged)\b"
    ).unwrap();

    pub static ref SUBTOTAL_CONTEXT: Regex = Regex::new(
        r"(?i)\bsub[\s-]?total\b"
    ).unwrap();

    pub static ref DATE_PREFIX: Regex = Regex::new(
        r"(?i)\b(?:date|dated|issued|paid\s+on|order\s+date|transaction\s+date|invoice\s+date|purchase\s+date)\b"
    ).unwrap();

    /// A line that is only an amount, optionally with a currency marker.
    pub static ref MONEY_ONLY_LINE: Regex = Regex::new(
        &format!(r"^\s*{}\s*{}\s*$", CURRENCY_PREFIX, MONEY)
    ).unwrap();

    /// A single word holding an amount (`$6.55`, `CA$0.33`, `59,99`).
    pub static ref MONEY_WORD: Regex = Regex::new(
        &format!(r"^[(]?{}\s*(?P<amt>\d{{1,3}}(?:,\d{{3}})+(?:\.\d{{2}})?|\d+[.,]\d{{2}})[)]?$", CURRENCY_PREFIX)
    ).unwrap();
}

/// Whether the text before a label ends a `sub` or `tax` qualifier
/// (`Sub total`, `Tax total`), which turns a total label into something else.
pub fn has_disqualifying_qualifier(before: &str) -> bool {
    let before = before.trim_end().to_lowercase();
    before.ends_with("sub") || before.ends_with("sub-") || before.ends_with("tax")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(pattern: &str, text: &str) -> Option<String> {
        Regex::new(pattern)
            .unwrap()
            .captures(text)
            .map(|c| c["amt"].to_string())
    }

    #[test]
    fn test_money_fragment() {
        assert_eq!(money(MONEY, "126.07").as_deref(), Some("126.07"));
        assert_eq!(money(MONEY, "1,234.56 total").as_deref(), Some("1,234.56"));
        assert_eq!(money(MONEY, "1.234,56").as_deref(), Some("1.234,56"));
        assert_eq!(money(MONEY, "1234.56").as_deref(), Some("1234.56"));
        assert_eq!(money(MONEY, "13.00%"), None);
        assert_eq!(money(MONEY, "75,000"), None);
    }

    #[test]
    fn test_money_loose_fragment() {
        assert_eq!(money(MONEY_LOOSE, "75,000 limit").as_deref(), Some("75,000"));
        assert_eq!(money(MONEY_LOOSE, "12").as_deref(), Some("12"));
    }

    #[test]
    fn test_money_word() {
        let amt = |w: &str| MONEY_WORD.captures(w).map(|c| c["amt"].to_string());
        assert_eq!(amt("$6.55").as_deref(), Some("6.55"));
        assert_eq!(amt("CA$0.33").as_deref(), Some("0.33"));
        assert_eq!(amt("59,99").as_deref(), Some("59,99"));
        assert_eq!(amt("Total"), None);
        assert_eq!(amt("2024"), None);
    }

    #[test]
    fn test_skip_lines() {
        assert!(SKIP_LINE.is_match("Bill to: Jane Doe"));
        assert!(SKIP_LINE.is_match("Page 1 of 2"));
        assert!(SKIP_LINE.is_match("To: jorden@example.com"));
        assert!(SKIP_LINE.is_match("https://uber.com/receipts"));
        assert!(!SKIP_LINE.is_match("Total: $6.55"));
        assert!(!SKIP_LINE.is_match("From: Uber Receipts <noreply@uber.com>"));
    }

    #[test]
    fn test_forward_markers() {
        assert!(FORWARD_DELIMITER.is_match("---------- Forwarded message ---------"));
        assert!(FORWARD_DELIMITER.is_match("Begin forwarded message:"));
        assert!(FORWARD_SUBJECT.is_match("Subject: Fwd: Your Tuesday trip"));
        assert!(!FORWARD_SUBJECT.is_match("Subject: Your Tuesday trip"));
    }

    #[test]
    fn test_disqualifying_qualifier() {
        assert!(has_disqualifying_qualifier("Sub "));
        assert!(has_disqualifying_qualifier("Tax "));
        assert!(!has_disqualifying_qualifier("Order "));
    }
}
