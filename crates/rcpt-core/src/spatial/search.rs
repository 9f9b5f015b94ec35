//! Label-to-value search over word bounding boxes.

use rust_decimal::Decimal;
use tracing::debug;

use super::Layout;
use crate::models::config::SpatialConfig;
use crate::models::document::Word;
use crate::models::receipt::{Candidate, CandidateSource, RawSpan};
use crate::receipt::rules::parse_amount;
use crate::receipt::rules::patterns::MONEY_WORD;
use crate::receipt::rules::CompiledLexicon;

/// Fields located by bounding-box search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialLabel {
    Amount,
    Subtotal,
    Tax,
}

/// Score of a value `distance` away from its label.
pub fn spatial_score(config: &SpatialConfig, distance: f32, below: bool) -> f32 {
    let scale = config.distance_scale;
    let mut score = config.base_score * scale / (scale + distance.max(0.0));
    if below {
        score *= config.below_factor;
    }
    score.clamp(0.0, 1.0)
}

fn key(word: &Word) -> String {
    let text = word.text.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    match text.split_once('/') {
        Some((head, _)) => head.to_string(),
        None => text,
    }
}

/// Bounding-box search for amount, subtotal and tax values.
pub struct SpatialSearch<'a> {
    config: &'a SpatialConfig,
    lexicon: &'a CompiledLexicon,
    max_amount: Decimal,
}

impl<'a> SpatialSearch<'a> {
    pub fn new(config: &'a SpatialConfig, lexicon: &'a CompiledLexicon) -> Self {
        Self {
            config,
            lexicon,
            max_amount: Decimal::from(10_000),
        }
    }

    /// Set the largest value a label may be paired with.
    pub fn with_max_amount(mut self, max: Decimal) -> Self {
        self.max_amount = max;
        self
    }

    fn word_key(&self, words: &[Word], index: Option<usize>) -> String {
        index.map(|i| key(&words[i])).unwrap_or_default()
    }

    /// Whether the word at `index` labels `label`.
    fn is_label(&self, words: &[Word], layout: &Layout, index: usize, label: SpatialLabel) -> bool {
        let word = key(&words[index]);
        let prev = self.word_key(words, layout.neighbor(index, -1));
        let next = self.word_key(words, layout.neighbor(index, 1));

        match label {
            SpatialLabel::Amount => {
                matches!(word.as_str(), "total" | "amount" | "paid" | "due" | "balance")
                    && !matches!(prev.as_str(), "sub" | "tax")
            }
            SpatialLabel::Subtotal => {
                matches!(word.as_str(), "subtotal" | "sub-total" | "fare") || (word == "total" && prev == "sub")
            }
            SpatialLabel::Tax => {
                matches!(word.as_str(), "hst" | "gst" | "pst" | "qst" | "tax" | "vat")
                    && !matches!(next.as_str(), "total" | "breakdown")
            }
        }
    }

    /// Nearest money word to the right on the same line, else below.
    fn nearest_value(&self, words: &[Word], layout: &Layout, label: usize) -> Option<(usize, Decimal, f32, bool)> {
        let l = &words[label];
        let (lcx, lcy) = l.center();
        let mut right: Option<(usize, Decimal, f32)> = None;
        let mut below: Option<(usize, Decimal, f32)> = None;

        for line in &layout.lines {
            for &i in &line.words {
                if i == label {
                    continue;
                }
                let w = &words[i];
                let Some(value) = MONEY_WORD
                    .captures(w.text.trim())
                    .and_then(|caps| caps.name("amt").and_then(|m| parse_amount(m.as_str())))
                else {
                    continue;
                };
                let (cx, cy) = w.center();

                if (cy - lcy).abs() <= self.config.line_tolerance && w.x >= l.x {
                    let dx = (w.x - l.right()).max(0.0);
                    if dx <= self.config.max_dx && right.as_ref().is_none_or(|r| dx < r.2) {
                        right = Some((i, value, dx));
                    }
                } else if cy > lcy + self.config.line_tolerance {
                    let dy = (w.y - l.bottom()).max(0.0);
                    if dy <= self.config.max_dy && (cx - lcx).abs() <= self.config.max_dx {
                        let dist = ((cx - lcx).powi(2) + (cy - lcy).powi(2)).sqrt();
                        if below.as_ref().is_none_or(|b| dist < b.2) {
                            below = Some((i, value, dist));
                        }
                    }
                }
            }
        }

        right
            .map(|(i, v, d)| (i, v, d, false))
            .or_else(|| below.map(|(i, v, d)| (i, v, d, true)))
    }

    /// Candidates for `label`, one per label word that has a value nearby.
    pub fn find(&self, words: &[Word], layout: &Layout, label: SpatialLabel) -> Vec<Candidate<Decimal>> {
        let mut candidates: Vec<Candidate<Decimal>> = Vec::new();

        for line in &layout.lines {
            for &index in &line.words {
                if !self.is_label(words, layout, index, label) {
                    continue;
                }
                let Some((value_index, value, distance, below)) = self.nearest_value(words, layout, index) else {
                    continue;
                };
                if value <= Decimal::ZERO {
                    continue;
                }
                if value > self.max_amount {
                    debug!("Discarding spatial {:?} value {} above {}", label, value, self.max_amount);
                    continue;
                }
                let value_line = layout.line_of(value_index).unwrap_or(0);
                if label == SpatialLabel::Amount && self.lexicon.blacklist.is_match(&layout.lines[value_line].text) {
                    debug!("Discarding spatial amount {} on blacklisted line", value);
                    continue;
                }
                if candidates.iter().any(|c| matches!(c.span, RawSpan::Region { word, .. } if word == value_index)) {
                    continue;
                }

                let score = spatial_score(self.config, distance, below);
                candidates.push(
                    Candidate::new(
                        value,
                        RawSpan::Region {
                            word: value_index,
                            value_box: words[value_index].bbox(),
                            label_box: words[index].bbox(),
                        },
                        value_line,
                        CandidateSource::Spatial,
                        if below { "spatial_below" } else { "spatial_right" },
                        2,
                        format!("{} {}", words[index].text, words[value_index].text),
                    )
                    .scored(score),
                );
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::reconstruct_lines;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn find(words: &[Word], label: SpatialLabel) -> Vec<(Decimal, String, f32)> {
        let config = SpatialConfig::default();
        let lexicon = CompiledLexicon::default();
        let layout = reconstruct_lines(words, config.line_tolerance);
        SpatialSearch::new(&config, &lexicon)
            .find(words, &layout, label)
            .into_iter()
            .map(|c| (c.value, c.pattern, c.score))
            .collect()
    }

    fn receipt() -> Vec<Word> {
        vec![
            Word::new("Uber", 10.0, 10.0, 60.0, 20.0),
            Word::new("Trip", 10.0, 60.0, 40.0, 20.0),
            Word::new("fare", 55.0, 60.0, 40.0, 20.0),
            Word::new("$6.40", 300.0, 60.0, 50.0, 20.0),
            Word::new("HST", 10.0, 90.0, 40.0, 20.0),
            Word::new("$1.09", 300.0, 90.0, 50.0, 20.0),
            Word::new("Total", 10.0, 120.0, 60.0, 20.0),
            Word::new("$6.55", 300.0, 120.0, 50.0, 20.0),
        ]
    }

    #[test]
    fn test_spatial_score() {
        let config = SpatialConfig::default();
        assert!((spatial_score(&config, 0.0, false) - 0.9).abs() < 1e-6);
        assert!((spatial_score(&config, 100.0, false) - 0.45).abs() < 1e-6);
        assert!((spatial_score(&config, 0.0, true) - 0.72).abs() < 1e-6);
    }

    #[test]
    fn test_value_to_the_right() {
        let found = find(&receipt(), SpatialLabel::Amount);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, dec("6.55"));
        assert_eq!(found[0].1, "spatial_right");
        // 230 px gap from the label's right edge.
        assert!((found[0].2 - 0.9 * 100.0 / 330.0).abs() < 1e-6);

        assert_eq!(find(&receipt(), SpatialLabel::Tax)[0].0, dec("1.09"));
        assert_eq!(find(&receipt(), SpatialLabel::Subtotal)[0].0, dec("6.40"));
    }

    #[test]
    fn test_value_below() {
        let words = vec![
            Word::new("Amount", 10.0, 10.0, 70.0, 20.0),
            Word::new("Due", 85.0, 10.0, 40.0, 20.0),
            Word::new("$42.00", 20.0, 40.0, 60.0, 20.0),
        ];
        let found = find(&words, SpatialLabel::Amount);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, dec("42.00"));
        assert_eq!(found[0].1, "spatial_below");
    }

    #[test]
    fn test_qualified_labels_are_skipped() {
        let words = vec![
            Word::new("Sub", 10.0, 10.0, 30.0, 20.0),
            Word::new("Total", 45.0, 10.0, 50.0, 20.0),
            Word::new("$50.00", 300.0, 10.0, 60.0, 20.0),
            Word::new("Tax", 10.0, 40.0, 30.0, 20.0),
            Word::new("total", 45.0, 40.0, 50.0, 20.0),
            Word::new("$6.50", 300.0, 40.0, 60.0, 20.0),
        ];
        assert!(find(&words, SpatialLabel::Amount).is_empty());
        assert!(find(&words, SpatialLabel::Tax).is_empty());
        assert_eq!(find(&words, SpatialLabel::Subtotal)[0].0, dec("50.00"));
    }

    #[test]
    fn test_blacklisted_value_line() {
        let words = vec![
            Word::new("Liability", 10.0, 10.0, 80.0, 20.0),
            Word::new("total", 95.0, 10.0, 50.0, 20.0),
            Word::new("$75.00", 300.0, 10.0, 60.0, 20.0),
        ];
        assert!(find(&words, SpatialLabel::Amount).is_empty());
    }

    #[test]
    fn test_oversized_value_is_discarded() {
        let words = vec![
            Word::new("Balance", 10.0, 10.0, 70.0, 20.0),
            Word::new("25,000.00", 300.0, 10.0, 90.0, 20.0),
        ];
        assert!(find(&words, SpatialLabel::Amount).is_empty());

        let config = SpatialConfig::default();
        let lexicon = CompiledLexicon::default();
        let layout = reconstruct_lines(&words, config.line_tolerance);
        let found = SpatialSearch::new(&config, &lexicon)
            .with_max_amount(Decimal::from(50_000))
            .find(&words, &layout, SpatialLabel::Amount);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, dec("25000.00"));
    }
}
