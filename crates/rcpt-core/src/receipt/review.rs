//! Review gating.

use crate::models::config::ReviewConfig;
use crate::models::receipt::ParseResult;

/// Every reason the result needs a human look, in a fixed order.
pub fn review_reasons(result: &ParseResult, config: &ReviewConfig) -> Vec<String> {
    let mut reasons = Vec::new();

    if result.overall_confidence < config.min_overall_confidence {
        reasons.push(format!(
            "overall confidence {:.2} below {:.2}",
            result.overall_confidence, config.min_overall_confidence
        ));
    }
    if result.vendor.confidence < config.min_vendor_confidence {
        reasons.push(format!(
            "vendor confidence {:.2} below {:.2}",
            result.vendor.confidence, config.min_vendor_confidence
        ));
    }
    if result.amount.confidence < config.min_amount_confidence {
        reasons.push(format!(
            "amount confidence {:.2} below {:.2}",
            result.amount.confidence, config.min_amount_confidence
        ));
    }
    if !result.vendor.is_found() {
        reasons.push("vendor missing".to_string());
    }
    if !result.amount.is_found() {
        reasons.push("amount missing".to_string());
    }
    if !result.validation.consistent {
        reasons.push("subtotal + tax does not match total".to_string());
    }

    reasons
}

/// Set `needs_review` and `review_reason` on a finished result.
pub fn apply(result: &mut ParseResult, config: &ReviewConfig) {
    result.review_reason = review_reasons(result, config);
    result.needs_review = !result.review_reason.is_empty();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::InputKind;
    use crate::models::receipt::{Candidate, CandidateSource, FieldResult, RawSpan};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn found<T>(value: T, score: f32) -> FieldResult<T>
    where
        T: Clone,
    {
        let c = Candidate::new(value, RawSpan::text(0, 1), 0, CandidateSource::BodyPattern, "p", 1, "x").scored(score);
        FieldResult {
            best: Some(c.clone()),
            alternatives: vec![c],
            confidence: score,
        }
    }

    #[test]
    fn test_confident_result_passes() {
        let mut result = ParseResult::empty(InputKind::Text);
        result.vendor = found("Uber".to_string(), 0.9);
        result.amount = found(Decimal::new(655, 2), 0.95);
        result.overall_confidence = 0.8;

        apply(&mut result, &ReviewConfig::default());
        assert!(!result.needs_review);
        assert!(result.review_reason.is_empty());
    }

    #[test]
    fn test_missing_fields_list_every_reason() {
        let mut result = ParseResult::empty(InputKind::Text);
        apply(&mut result, &ReviewConfig::default());
        assert!(result.needs_review);
        assert_eq!(result.review_reason.len(), 5);
        assert_eq!(result.review_reason[3], "vendor missing");
        assert_eq!(result.review_reason[4], "amount missing");
    }

    #[test]
    fn test_inconsistent_totals_need_review() {
        let mut result = ParseResult::empty(InputKind::Text);
        result.vendor = found("Uber".to_string(), 0.9);
        result.amount = found(Decimal::new(655, 2), 0.95);
        result.overall_confidence = 0.8;
        result.validation.checked = true;
        result.validation.consistent = false;

        apply(&mut result, &ReviewConfig::default());
        assert_eq!(result.review_reason, vec!["subtotal + tax does not match total".to_string()]);
    }

    #[test]
    fn test_low_vendor_confidence() {
        let mut result = ParseResult::empty(InputKind::Text);
        result.vendor = found("Corner".to_string(), 0.5);
        result.amount = found(Decimal::new(655, 2), 0.95);
        result.overall_confidence = 0.75;

        apply(&mut result, &ReviewConfig::default());
        assert_eq!(result.review_reason, vec!["vendor confidence 0.50 below 0.70".to_string()]);
    }
}
