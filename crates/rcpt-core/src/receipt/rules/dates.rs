//! Date candidate generation.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Captures;
use serde::{Deserialize, Serialize};

use super::{CandidateGenerator, DocumentContext, PatternSpec};
use crate::models::receipt::{Candidate, CandidateSource, Field, RawSpan};

const MONTH: &str = r"(?P<mon>jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?";

const ORDINAL: &str = r"(?:st|nd|rd|th)?";

/// Earliest and latest years accepted on a receipt.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1990..=2100;

lazy_static! {
    pub static ref DATE_PATTERNS: Vec<PatternSpec> = vec![
        PatternSpec::new(
            "iso",
            1,
            r"\b(?P<y>\d{4})-(?P<m>\d{1,2})-(?P<d>\d{1,2})\b",
        ),
        PatternSpec::new(
            "month_name",
            1,
            &format!(r"(?i)\b{}\s+(?P<d>\d{{1,2}}){}(?:,\s*|\s+|/)(?P<y>\d{{4}})\b", MONTH, ORDINAL),
        ),
        PatternSpec::new(
            "day_month_name",
            1,
            &format!(r"(?i)\b(?P<d>\d{{1,2}}){}\s+(?:of\s+)?{},?\s+(?P<y>\d{{4}})\b", ORDINAL, MONTH),
        ),
        PatternSpec::new(
            "numeric",
            2,
            r"\b(?P<a>\d{1,2})[/.-](?P<b>\d{1,2})[/.-](?P<y>\d{4}|\d{2})\b",
        ),
    ];
}

/// Reading order for numeric dates whose parts could be either day or month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateLocale {
    /// `MM/DD/YYYY`, used in North America.
    #[default]
    MonthFirst,
    /// `DD/MM/YYYY`.
    DayFirst,
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn year(caps: &Captures<'_>) -> Option<i32> {
    let raw = caps.name("y")?.as_str();
    let value: i32 = raw.parse().ok()?;
    let value = if raw.len() == 2 { 2000 + value } else { value };
    YEAR_RANGE.contains(&value).then_some(value)
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

/// Date generator.
pub struct DateGenerator {
    locale: Option<DateLocale>,
}

impl DateGenerator {
    pub fn new() -> Self {
        Self { locale: None }
    }

    /// Read ambiguous numeric dates in `locale` instead of the detected one.
    pub fn with_locale(mut self, locale: DateLocale) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Resolve a match into a date and the pattern name to report.
    fn resolve(&self, spec: &PatternSpec, caps: &Captures<'_>, locale: DateLocale) -> Option<(NaiveDate, &'static str)> {
        let y = year(caps)?;
        match spec.name {
            "iso" => NaiveDate::from_ymd_opt(y, number(caps, "m")?, number(caps, "d")?).map(|d| (d, "iso")),
            "month_name" | "day_month_name" => {
                let month = month_number(caps.name("mon")?.as_str())?;
                NaiveDate::from_ymd_opt(y, month, number(caps, "d")?).map(|d| (d, spec.name))
            }
            _ => {
                let a = number(caps, "a")?;
                let b = number(caps, "b")?;
                let (month, day, name) = if a > 12 {
                    (b, a, "numeric_dmy")
                } else if b > 12 || a == b {
                    (a, b, "numeric_mdy")
                } else {
                    match locale {
                        DateLocale::MonthFirst => (a, b, "numeric_ambiguous"),
                        DateLocale::DayFirst => (b, a, "numeric_ambiguous"),
                    }
                };
                NaiveDate::from_ymd_opt(y, month, day).map(|d| (d, name))
            }
        }
    }
}

impl Default for DateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator for DateGenerator {
    type Output = NaiveDate;

    fn field(&self) -> Field {
        Field::Date
    }

    fn generate(&self, doc: &DocumentContext<'_>) -> Vec<Candidate<NaiveDate>> {
        let locale = self.locale.unwrap_or(doc.signals.locale);
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut candidates = Vec::new();

        for spec in DATE_PATTERNS.iter() {
            for line in &doc.doc.lines {
                for caps in spec.regex.captures_iter(&line.text) {
                    let Some(whole) = caps.get(0) else {
                        continue;
                    };
                    let span = (line.offset + whole.start(), line.offset + whole.end());
                    if taken.iter().any(|t| t.0 < span.1 && span.0 < t.1) {
                        continue;
                    }
                    let Some((date, name)) = self.resolve(spec, &caps, locale) else {
                        continue;
                    };
                    taken.push(span);
                    candidates.push(Candidate::new(
                        date,
                        RawSpan::text(span.0, span.1),
                        line.index,
                        CandidateSource::BodyPattern,
                        name,
                        spec.priority,
                        whole.as_str(),
                    ));
                }
            }
        }

        candidates.sort_by_key(|c| c.span.start());
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::ParseContext;
    use crate::receipt::rules::with_document;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dates(text: &str) -> Vec<(NaiveDate, String)> {
        with_document(text, &ParseContext::default(), |doc| {
            DateGenerator::new()
                .generate(doc)
                .into_iter()
                .map(|c| (c.value, c.pattern))
                .collect()
        })
    }

    #[test]
    fn test_iso_and_month_names() {
        assert_eq!(dates("Date: 2024-01-15"), vec![(ymd(2024, 1, 15), "iso".to_string())]);
        assert_eq!(dates("Jan 15, 2024"), vec![(ymd(2024, 1, 15), "month_name".to_string())]);
        assert_eq!(dates("April 9/2025"), vec![(ymd(2025, 4, 9), "month_name".to_string())]);
        assert_eq!(dates("Sept. 3rd 2023"), vec![(ymd(2023, 9, 3), "month_name".to_string())]);
    }

    #[test]
    fn test_day_month_name_with_ordinal() {
        assert_eq!(
            dates("Issued on 23rd November 2025"),
            vec![(ymd(2025, 11, 23), "day_month_name".to_string())]
        );
        assert_eq!(
            dates("Date: Mon, 15 Jan 2024 10:02:11 -0500"),
            vec![(ymd(2024, 1, 15), "day_month_name".to_string())]
        );
        assert_eq!(dates("1st of March, 2024"), vec![(ymd(2024, 3, 1), "day_month_name".to_string())]);
    }

    #[test]
    fn test_numeric_disambiguation() {
        assert_eq!(dates("25/12/2024"), vec![(ymd(2024, 12, 25), "numeric_dmy".to_string())]);
        assert_eq!(dates("12/25/2024"), vec![(ymd(2024, 12, 25), "numeric_mdy".to_string())]);
        assert_eq!(dates("05/05/24"), vec![(ymd(2024, 5, 5), "numeric_mdy".to_string())]);
        assert_eq!(dates("03/04/2024"), vec![(ymd(2024, 3, 4), "numeric_ambiguous".to_string())]);
    }

    #[test]
    fn test_locale_decides_ambiguous_dates() {
        // VAT marks the document as day-first.
        assert_eq!(
            dates("VAT 20.00\n03/04/2024"),
            vec![(ymd(2024, 4, 3), "numeric_ambiguous".to_string())]
        );

        let forced = with_document("03/04/2024", &ParseContext::default(), |doc| {
            DateGenerator::new().with_locale(DateLocale::DayFirst).generate(doc)[0].value
        });
        assert_eq!(forced, ymd(2024, 4, 3));
    }

    #[test]
    fn test_rejects_invalid_and_out_of_range() {
        assert!(dates("02/30/2024").is_empty());
        assert!(dates("2024-13-01").is_empty());
        assert!(dates("Jan 5, 1850").is_empty());
        assert!(dates("Call 12-34-5678").is_empty());
    }

    #[test]
    fn test_candidates_in_document_order() {
        let found = dates("Order date: Mar 3, 2024\nShipped 2024-03-05");
        assert_eq!(
            found,
            vec![
                (ymd(2024, 3, 3), "month_name".to_string()),
                (ymd(2024, 3, 5), "iso".to_string()),
            ]
        );
    }
}
