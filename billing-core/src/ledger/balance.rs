use crate::models::Installment;
use crate::money::clamp_non_negative;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Totals derived from an opening balance and the payments made against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub opening: Decimal,
    pub total_paid: Decimal,
    /// Never negative.
    pub remaining: Decimal,
    /// How far payments exceed the opening balance, zero otherwise.
    pub overpaid_by: Decimal,
}

impl BalanceSummary {
    pub fn is_settled(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn is_overpaid(&self) -> bool {
        self.overpaid_by > Decimal::ZERO
    }
}

/// Balance left after applying one payment, floored at zero.
pub fn running_balance(previous: Decimal, paid: Decimal) -> Decimal {
    clamp_non_negative(previous - paid)
}

/// Sum the installments and derive what is still owed.
pub fn compute_balance(opening: Decimal, installments: &[Installment]) -> BalanceSummary {
    let total_paid: Decimal = installments.iter().map(|i| i.amount_paid).sum();

    BalanceSummary {
        opening,
        total_paid,
        remaining: clamp_non_negative(opening - total_paid),
        overpaid_by: clamp_non_negative(total_paid - opening),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn paid(amounts: &[Decimal]) -> Vec<Installment> {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        amounts
            .iter()
            .map(|a| Installment::pending(*a, date))
            .collect()
    }

    #[test]
    fn remaining_is_opening_minus_sum_when_within_balance() {
        let amounts = [dec!(10000), dec!(15000.50), dec!(4999.50)];
        let summary = compute_balance(dec!(50000), &paid(&amounts));

        assert_eq!(summary.total_paid, dec!(30000));
        assert_eq!(summary.remaining, dec!(20000));
        assert!(!summary.is_overpaid());

        // No prefix ever goes negative.
        let installments = paid(&amounts);
        for n in 0..=installments.len() {
            let prefix = compute_balance(dec!(50000), &installments[..n]);
            assert!(prefix.remaining >= Decimal::ZERO);
        }
    }

    #[test]
    fn overpayment_clamps_to_zero() {
        let summary = compute_balance(dec!(50000), &paid(&[dec!(30000), dec!(25000)]));

        assert_eq!(summary.remaining, Decimal::ZERO);
        assert_eq!(summary.overpaid_by, dec!(5000));
        assert!(summary.is_settled());
        assert!(summary.is_overpaid());
    }

    #[test]
    fn exact_payment_settles_without_overpaying() {
        let summary = compute_balance(dec!(1200), &paid(&[dec!(1200)]));
        assert!(summary.is_settled());
        assert!(!summary.is_overpaid());
    }

    #[test]
    fn calculator_is_idempotent() {
        let installments = paid(&[dec!(100), dec!(250)]);
        let first = compute_balance(dec!(1000), &installments);
        let second = compute_balance(dec!(1000), &installments);
        assert_eq!(first, second);
    }

    #[test]
    fn running_balance_never_negative() {
        assert_eq!(running_balance(dec!(20000), dec!(25000)), Decimal::ZERO);
        assert_eq!(running_balance(dec!(50000), dec!(30000)), dec!(20000));
    }
}
