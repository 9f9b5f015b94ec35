//! Top-N candidate selection.

use rust_decimal::Decimal;

use crate::models::receipt::{Candidate, FieldResult, MAX_ALTERNATIVES};
use crate::receipt::scoring::name_key;

/// Rank scored candidates and keep the best distinct values.
///
/// Order is score descending, then priority ascending, then span start
/// ascending. Candidates whose `key` equals an earlier one are dropped.
pub fn select<T, K, F>(mut candidates: Vec<Candidate<T>>, key: F) -> FieldResult<T>
where
    T: Clone,
    K: PartialEq,
    F: Fn(&T) -> K,
{
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.priority.cmp(&b.priority))
            .then(a.span.start().cmp(&b.span.start()))
    });

    let mut seen: Vec<K> = Vec::with_capacity(MAX_ALTERNATIVES);
    let mut alternatives = Vec::with_capacity(MAX_ALTERNATIVES);
    for candidate in candidates {
        let k = key(&candidate.value);
        if seen.contains(&k) {
            continue;
        }
        seen.push(k);
        alternatives.push(candidate);
        if alternatives.len() == MAX_ALTERNATIVES {
            break;
        }
    }

    let best = alternatives.first().cloned();
    let confidence = best.as_ref().map(|c| c.score).unwrap_or(0.0);
    FieldResult {
        best,
        alternatives,
        confidence,
    }
}

/// Vendors compare by their lowercase alphanumerics.
pub fn vendor_key(value: &String) -> String {
    name_key(value)
}

/// Amounts compare by value, ignoring trailing zeros.
pub fn decimal_key(value: &Decimal) -> Decimal {
    value.normalize()
}

/// Number of alternatives scoring within `margin` of the best.
pub fn contenders<T>(result: &FieldResult<T>, margin: f32) -> usize {
    let Some(best) = result.best.as_ref() else {
        return 0;
    };
    result
        .alternatives
        .iter()
        .filter(|c| best.score - c.score < margin)
        .count()
}
