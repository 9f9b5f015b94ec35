//! Text normalization ahead of candidate generation.
//!
//! Collapses OCR letter spacing, joins business names wrapped across lines,
//! and drops lines that never carry a receipt field. Every normalized line
//! keeps the raw text and source position it came from.

use regex::Captures;
use tracing::debug;

use crate::receipt::rules::lexicon::CompiledLexicon;
use crate::receipt::rules::patterns::{FORWARD_DELIMITER, HEADER_LINE, SKIP_LINE, SPACED_LETTERS, WHITESPACE_RUN};

/// One normalized line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Position among normalized lines.
    pub index: usize,
    /// Normalized text.
    pub text: String,
    /// Source text; joined lines are separated by `\n`.
    pub raw: String,
    /// Zero-based source line number of the first raw line.
    pub raw_line: usize,
    /// Byte offset of the first raw line in the input.
    pub raw_offset: usize,
    /// Byte offset of this line in [`NormalizedDocument::text`].
    pub offset: usize,
    /// `From:`, `Subject:` or `Date:` email header.
    pub header: bool,
    /// Comes after a forwarded-message delimiter.
    pub quoted: bool,
}

impl Line {
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Normalized text plus per-line audit data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDocument {
    /// Lines joined with `\n`.
    pub text: String,
    pub lines: Vec<Line>,
    /// Number of non-empty source lines removed by skip patterns.
    pub dropped_lines: usize,
    /// A forwarded-message delimiter was seen (and dropped).
    pub forward_marker: bool,
}

impl NormalizedDocument {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the line containing byte `offset` of the normalized text.
    pub fn line_at(&self, offset: usize) -> usize {
        self.lines
            .partition_point(|line| line.offset <= offset)
            .saturating_sub(1)
    }

    /// Number of non-header lines before `line`.
    pub fn content_rank(&self, line: usize) -> usize {
        self.lines
            .iter()
            .take(line)
            .filter(|l| !l.header)
            .count()
    }

    pub fn content_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|l| !l.header)
    }

    /// The normalized text between two offsets.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.text.get(start..end).unwrap_or("")
    }
}

struct PendingLine {
    text: String,
    raw: String,
    raw_line: usize,
    raw_offset: usize,
    quoted: bool,
}

/// Receipt text normalizer.
pub struct Normalizer<'a> {
    lexicon: &'a CompiledLexicon,
}

impl<'a> Normalizer<'a> {
    pub fn new(lexicon: &'a CompiledLexicon) -> Self {
        Self { lexicon }
    }

    pub fn normalize(&self, input: &str) -> NormalizedDocument {
        let mut kept = Vec::new();
        let mut dropped_lines = 0;
        let mut forward_marker = false;
        let mut offset = 0;

        for (n, raw) in input.split('\n').enumerate() {
            let raw_offset = offset;
            offset += raw.len() + 1;

            let raw = raw.trim_end_matches('\r');
            let text = clean_line(raw);
            if text.is_empty() {
                continue;
            }
            if FORWARD_DELIMITER.is_match(&text) {
                forward_marker = true;
                dropped_lines += 1;
                continue;
            }
            if SKIP_LINE.is_match(&text) {
                dropped_lines += 1;
                continue;
            }

            kept.push(PendingLine {
                text,
                raw: raw.to_string(),
                raw_line: n,
                raw_offset,
                quoted: forward_marker,
            });
        }

        let mut merged: Vec<PendingLine> = Vec::with_capacity(kept.len());
        let mut iter = kept.into_iter().peekable();
        while let Some(mut current) = iter.next() {
            while let Some(next) = iter.next_if(|next| self.join(&current.text, &next.text).is_some()) {
                if let Some(joined) = self.join(&current.text, &next.text) {
                    debug!("Joined wrapped line {:?} + {:?}", current.text, next.text);
                    current.text = joined;
                }
                current.raw.push('\n');
                current.raw.push_str(&next.raw);
            }
            merged.push(current);
        }

        let mut text = String::new();
        let mut lines = Vec::with_capacity(merged.len());
        for (index, pending) in merged.into_iter().enumerate() {
            if index > 0 {
                text.push('\n');
            }
            let line_offset = text.len();
            text.push_str(&pending.text);
            lines.push(Line {
                index,
                header: HEADER_LINE.is_match(&pending.text),
                text: pending.text,
                raw: pending.raw,
                raw_line: pending.raw_line,
                raw_offset: pending.raw_offset,
                offset: line_offset,
                quoted: pending.quoted,
            });
        }

        NormalizedDocument {
            text,
            lines,
            dropped_lines,
            forward_marker,
        }
    }

    /// Join `current` and `next` when they look like one wrapped business name.
    fn join(&self, current: &str, next: &str) -> Option<String> {
        if !is_name_fragment(current) {
            return None;
        }
        let first = next.chars().next()?;

        if current.len() > 1 && current.ends_with('-') {
            if !first.is_alphabetic() || has_digit(next) || word_count(next) > 4 {
                return None;
            }
            return Some(if first.is_uppercase() {
                format!("{}{}", current, next)
            } else {
                format!("{}{}", current.trim_end_matches('-'), next)
            });
        }

        if !first.is_uppercase() || has_digit(next) || word_count(next) > 3 || next.ends_with(':') {
            return None;
        }

        let first_word = next.split_whitespace().next()?;
        if self.lexicon.is_continuation_word(first_word)
            || (self.lexicon.is_wrap_prefix(current) && word_count(next) <= 2)
        {
            return Some(format!("{} {}", current, next));
        }

        None
    }
}

fn clean_line(raw: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(raw.trim(), " ");
    let unspaced = SPACED_LETTERS.replace_all(&collapsed, |caps: &Captures| caps[0].replace(' ', ""));
    unspaced.trim().to_string()
}

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// A short, label-free line that could be the first half of a name.
fn is_name_fragment(line: &str) -> bool {
    !has_digit(line)
        && word_count(line) <= 4
        && !line.ends_with(':')
        && !line.contains(['|', '@', '$', '*'])
        && !HEADER_LINE.is_match(line)
}
