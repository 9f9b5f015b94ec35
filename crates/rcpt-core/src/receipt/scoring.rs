//! Candidate scoring.
//!
//! Every scorer is a pure function of the candidate and the document. Scores
//! start from a base derived from the pattern priority or candidate source,
//! receive fixed additive adjustments, and are clamped to [0, 1].

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::rules::currency::{explicit_occurrences, is_explicit};
use super::rules::patterns::{
    has_disqualifying_qualifier, DATE_PREFIX, STRONG_TOTAL_PREFIX, SUBTOTAL_CONTEXT, TOTAL_KEYWORD,
};
use super::rules::{CompiledLexicon, DocumentContext};
use crate::models::receipt::{Candidate, CandidateSource, Currency};

/// Everything a scorer may consult.
pub type ScoringContext<'a> = DocumentContext<'a>;

/// How far back (in bytes) a total keyword still lends support to an amount.
const KEYWORD_WINDOW: usize = 100;

/// `1 / (1 + log10(priority))`: 1.0 for priority 1, decreasing slowly.
pub fn priority_base(priority: u8) -> f32 {
    1.0 / (1.0 + f32::from(priority.max(1)).log10())
}

fn clamp(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// Largest char boundary at or below `index`.
fn floor_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

pub fn score_amount(candidate: &Candidate<Decimal>, ctx: &ScoringContext<'_>) -> f32 {
    let mut score = priority_base(candidate.priority);
    let start = candidate.span.start();
    let before = ctx.text_before(candidate.line, start);

    if let Some(m) = STRONG_TOTAL_PREFIX.find_iter(before).last() {
        if !has_disqualifying_qualifier(&before[..m.start()]) {
            score += 0.3;
        }
    }

    let window_start = floor_boundary(&ctx.doc.text, start.saturating_sub(KEYWORD_WINDOW));
    let window = ctx.doc.slice(window_start, start);
    if let Some(m) = TOTAL_KEYWORD.find_iter(window).last() {
        let distance = (window.len() - m.end()) as f32;
        score += 0.2 * (1.0 - distance / KEYWORD_WINDOW as f32).max(0.0);
    }

    if let Some(line) = ctx.line(candidate.line) {
        if SUBTOTAL_CONTEXT.is_match(&line.text) {
            score -= 0.4;
        }
        if ctx.lexicon.blacklist.is_match(&line.text) {
            score -= 0.5;
        }
    }

    clamp(score)
}

/// Whether the candidate's label opens its line.
fn label_at_line_start<T>(candidate: &Candidate<T>, ctx: &ScoringContext<'_>) -> bool {
    let Some(line) = ctx.line(candidate.line) else {
        return false;
    };
    let Some(label) = candidate.raw.split_whitespace().next() else {
        return false;
    };
    line.text
        .trim_start_matches(['*', '|', ' '])
        .to_lowercase()
        .starts_with(&label.to_lowercase())
}

pub fn score_subtotal(candidate: &Candidate<Decimal>, ctx: &ScoringContext<'_>) -> f32 {
    let mut score = priority_base(candidate.priority);
    if label_at_line_start(candidate, ctx) {
        score += 0.1;
    }
    clamp(score)
}

pub fn score_tax(candidate: &Candidate<Decimal>, ctx: &ScoringContext<'_>) -> f32 {
    score_subtotal(candidate, ctx)
}

pub fn score_date(candidate: &Candidate<NaiveDate>, ctx: &ScoringContext<'_>) -> f32 {
    let mut score = priority_base(candidate.priority);

    if DATE_PREFIX.is_match(ctx.text_before(candidate.line, candidate.span.start())) {
        score += 0.3;
    }

    let rank = ctx.doc.content_rank(candidate.line).min(20) as f32;
    score += 0.2 * (1.0 - rank / 20.0);

    if candidate.pattern == "numeric_ambiguous" {
        score -= 0.2;
    }

    clamp(score)
}

pub fn score_currency(candidate: &Candidate<Currency>, ctx: &ScoringContext<'_>) -> f32 {
    let score = if is_explicit(&candidate.pattern) {
        let extra = explicit_occurrences(ctx, candidate.value).saturating_sub(1) as f32;
        0.9 + (0.05 * extra).min(0.3)
    } else {
        match candidate.source {
            CandidateSource::Inferred => 0.7,
            _ if candidate.pattern == "symbol" => 0.8,
            _ => 0.6,
        }
    };
    clamp(score)
}

fn vendor_base(pattern: &str) -> f32 {
    match pattern {
        "from_header" => 0.9,
        "sender_name" | "payable_to" => 0.85,
        "known_vendor" | "processor_prefix" | "statement_descriptor" => 0.8,
        "company_suffix" => 0.7,
        _ => 0.5,
    }
}

fn is_title_case(name: &str) -> bool {
    name.chars().any(|c| c.is_lowercase())
        && name
            .split_whitespace()
            .all(|w| w.chars().next().is_some_and(|c| !c.is_lowercase()))
}

/// Two or three capitalized alphabetic words with no business vocabulary.
pub fn is_person_name(name: &str, lexicon: &CompiledLexicon) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    if !(2..=3).contains(&words.len()) || lexicon.business_indicator.is_match(name) {
        return false;
    }
    words.iter().all(|w| {
        w.chars().next().is_some_and(|c| c.is_uppercase())
            && w.chars().count() <= 15
            && w.chars().any(|c| c.is_lowercase())
            && w.chars().all(|c| c.is_alphabetic() || c == '-' || c == '\'')
    })
}

/// Lowercase alphanumeric form used to compare names.
pub fn name_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn matches_own_sender(name: &str, ctx: &ScoringContext<'_>) -> bool {
    let Some(own) = ctx.signals.own_sender.as_deref() else {
        return false;
    };
    let (a, b) = (name_key(name), name_key(own));
    !a.is_empty() && !b.is_empty() && (a == b || a.contains(&b) || b.contains(&a))
}

pub fn score_vendor(candidate: &Candidate<String>, ctx: &ScoringContext<'_>) -> f32 {
    let name = candidate.value.as_str();
    let mut score = vendor_base(&candidate.pattern);

    if ctx.lexicon.company_suffix_end.is_match(name) {
        score += 0.1;
    }
    if is_title_case(name) {
        score += 0.1;
    }

    if candidate.source.is_body() {
        if ctx.lexicon.retail_keyword.is_match(name) {
            score += 0.15;
        }
        score += match ctx.doc.content_rank(candidate.line) {
            0 => 0.25,
            1 => 0.15,
            2 => 0.10,
            rank => -((rank - 2) as f32 * 0.02).min(0.4),
        };
    }

    if name.split_whitespace().count() > 5 {
        score -= 0.1;
    }

    let from_metadata = matches!(candidate.source, CandidateSource::EmailHeader | CandidateSource::SenderName);
    if from_metadata && is_person_name(name, ctx.lexicon) {
        score -= 0.6;
    }

    // A forwarded receipt carries the forwarder's name, not the merchant's.
    if ctx.signals.forwarded && matches_own_sender(name, ctx) {
        score -= 0.3;
    }

    clamp(score)
}
