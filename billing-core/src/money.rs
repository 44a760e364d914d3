//! Money helpers. Amounts are `Decimal` end to end; display truncates to
//! two places instead of rounding.

use crate::error::AmountError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parse a user-entered amount.
///
/// Accepts optional thousands separators (`"1,250.50"`). Blank input,
/// non-numeric input and negative values are rejected rather than coerced
/// to zero.
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(AmountError::Empty);
    }

    let amount =
        Decimal::from_str(&cleaned).map_err(|_| AmountError::NotANumber(raw.trim().to_string()))?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative(amount));
    }

    Ok(amount)
}

/// Floor at zero.
pub fn clamp_non_negative(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}

/// Truncate to two decimal places.
pub fn truncate_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Render an amount with two decimals and Indian digit grouping
/// (`1234567.891` becomes `12,34,567.89`).
pub fn format_money(amount: Decimal) -> String {
    let truncated = truncate_cents(amount);
    let rendered = format!("{:.2}", truncated.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((&rendered, "00"));

    let grouped = group_indian(int_part);
    if truncated.is_sign_negative() && !truncated.is_zero() {
        format!("-{}.{}", grouped, frac_part)
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, last_three) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();

    format!("{},{}", groups.join(","), last_three)
}
