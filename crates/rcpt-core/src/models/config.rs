//! Configuration structures for the extraction engine.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RcptError, Result};
use crate::receipt::rules::lexicon::Lexicon;

/// Main configuration for the rcpt engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// Candidate generation and scoring.
    pub extraction: ExtractionConfig,

    /// Review gate thresholds.
    pub review: ReviewConfig,

    /// Bounding-box search.
    pub spatial: SpatialConfig,

    /// Export rendering.
    pub export: ExportConfig,

    /// Vocabulary used by the normalizer, generators and scorers.
    pub lexicon: Lexicon,
}

/// Field extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Generic and symbol-only amounts above this are discarded.
    pub max_generic_amount: Decimal,

    /// Absolute tolerance for subtotal + tax = total.
    pub consistency_tolerance: Decimal,

    /// Subtracted from overall confidence when totals disagree.
    pub inconsistency_penalty: f32,

    /// Two tax matches whose amount spans overlap by at least this fraction
    /// of the shorter span are the same line.
    pub tax_overlap_ratio: f32,

    /// Number of content lines scanned by the vendor line heuristic.
    pub vendor_scan_lines: usize,

    /// Top-two score gap below which a field is reported as ambiguous.
    pub ambiguity_margin: f32,

    /// Field weights for overall confidence.
    pub weights: ConfidenceWeights,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_generic_amount: Decimal::from(10_000),
            consistency_tolerance: Decimal::new(2, 2),
            inconsistency_penalty: 0.10,
            tax_overlap_ratio: 0.5,
            vendor_scan_lines: 20,
            ambiguity_margin: 0.05,
            weights: ConfidenceWeights::default(),
        }
    }
}

/// Per-field weights of the overall confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub vendor: f32,
    pub amount: f32,
    pub date: f32,
    pub tax: f32,
    pub currency: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            vendor: 0.30,
            amount: 0.35,
            date: 0.20,
            tax: 0.10,
            currency: 0.05,
        }
    }
}

/// Review gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub min_overall_confidence: f32,
    pub min_vendor_confidence: f32,
    pub min_amount_confidence: f32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            min_overall_confidence: 0.7,
            min_vendor_confidence: 0.7,
            min_amount_confidence: 0.7,
        }
    }
}

/// Bounding-box search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Maximum vertical distance between word centers on the same line.
    pub line_tolerance: f32,

    /// Maximum horizontal gap between a label and a value to its right.
    pub max_dx: f32,

    /// Maximum vertical gap between a label and a value below it.
    pub max_dy: f32,

    /// Distance at which the score halves.
    pub distance_scale: f32,

    /// Score of a value directly adjacent to its label.
    pub base_score: f32,

    /// Multiplier for values found below rather than to the right.
    pub below_factor: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 10.0,
            max_dx: 400.0,
            max_dy: 100.0,
            distance_scale: 100.0,
            base_score: 0.9,
            below_factor: 0.8,
        }
    }
}

/// Export rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Currency written when none was detected.
    pub fallback_currency: String,

    /// Text written for missing fields.
    pub missing_placeholder: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fallback_currency: "USD".to_string(),
            missing_placeholder: "N/A".to_string(),
        }
    }
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let e = &self.extraction;
        if !(0.0..=1.0).contains(&e.tax_overlap_ratio) || e.tax_overlap_ratio == 0.0 {
            return Err(RcptError::Config(format!(
                "extraction.tax_overlap_ratio must be in (0, 1], got {}",
                e.tax_overlap_ratio
            )));
        }
        if e.consistency_tolerance.is_sign_negative() {
            return Err(RcptError::Config(
                "extraction.consistency_tolerance must not be negative".to_string(),
            ));
        }
        if self.spatial.distance_scale <= 0.0 {
            return Err(RcptError::Config("spatial.distance_scale must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RcptConfig =
            serde_json::from_str(r#"{"review": {"min_overall_confidence": 0.5}}"#).unwrap();
        assert_eq!(config.review.min_overall_confidence, 0.5);
        assert_eq!(config.review.min_vendor_confidence, 0.7);
        assert_eq!(config.extraction, ExtractionConfig::default());
        assert_eq!(config.export.fallback_currency, "USD");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = RcptConfig::default();
        config.extraction.max_generic_amount = Decimal::from(500);
        config.save(&path).unwrap();

        let loaded = RcptConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_overlap_ratio() {
        let mut config = RcptConfig::default();
        config.extraction.tax_overlap_ratio = 0.0;
        assert!(matches!(config.validate(), Err(RcptError::Config(_))));
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ConfidenceWeights::default();
        let sum = w.vendor + w.amount + w.date + w.tax + w.currency;
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
