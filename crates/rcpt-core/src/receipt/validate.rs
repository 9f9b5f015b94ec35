//! Subtotal + tax = total cross-validation.

use rust_decimal::Decimal;

use crate::models::receipt::Validation;

/// Check that `subtotal + tax` matches `amount` within `tolerance`.
///
/// The check only runs when all three values are present; otherwise the
/// result is unchecked and consistent. A sum that overflows is reported as
/// inconsistent. The amount is never changed.
pub fn check_consistency(
    amount: Option<Decimal>,
    subtotal: Option<Decimal>,
    tax: Option<Decimal>,
    tolerance: Decimal,
) -> Validation {
    let (Some(amount), Some(subtotal), Some(tax)) = (amount, subtotal, tax) else {
        return Validation {
            amount,
            subtotal,
            tax,
            ..Validation::unchecked()
        };
    };

    let Some((expected, difference)) = subtotal
        .checked_add(tax)
        .and_then(|expected| expected.checked_sub(amount).map(|difference| (expected, difference)))
    else {
        return Validation {
            checked: true,
            consistent: false,
            subtotal: Some(subtotal),
            tax: Some(tax),
            expected_total: None,
            amount: Some(amount),
            difference: None,
            detail: Some(format!("subtotal {} + tax {} is out of range", subtotal, tax)),
        };
    };
    let consistent = difference.abs() <= tolerance;
    let detail = (!consistent).then(|| {
        format!(
            "subtotal {} + tax {} = {} does not match total {} (difference {})",
            subtotal, tax, expected, amount, difference
        )
    });

    Validation {
        checked: true,
        consistent,
        subtotal: Some(subtotal),
        tax: Some(tax),
        expected_total: Some(expected),
        amount: Some(amount),
        difference: Some(difference),
        detail,
    }
}
