use super::balance::{compute_balance, BalanceSummary};
use crate::error::LedgerError;
use crate::models::{Installment, InstallmentState, PendingReason};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Non-fatal conditions reported when the ledger changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceWarning {
    /// Payments now exceed the opening balance; the balance is floored at
    /// zero.
    Overpaid { by: Decimal },
}

/// Result of appending an installment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub index: usize,
    pub balance: BalanceSummary,
    pub warning: Option<BalanceWarning>,
}

/// Ordered installments of one debit note together with the balance they
/// are paid against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentLedger {
    opening_balance: Decimal,
    entries: Vec<Installment>,
}

impl InstallmentLedger {
    pub fn new(opening_balance: Decimal) -> Self {
        Self {
            opening_balance,
            entries: Vec::new(),
        }
    }

    /// Rebuild a ledger from stored entries.
    pub fn from_entries(opening_balance: Decimal, entries: Vec<Installment>) -> Self {
        Self {
            opening_balance,
            entries,
        }
    }

    pub fn opening_balance(&self) -> Decimal {
        self.opening_balance
    }

    pub fn entries(&self) -> &[Installment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_paid(&self) -> Decimal {
        self.entries.iter().map(|i| i.amount_paid).sum()
    }

    pub fn balance(&self) -> BalanceSummary {
        compute_balance(self.opening_balance, &self.entries)
    }

    /// Append an unsaved installment.
    ///
    /// Overpaying is allowed: the balance floors at zero and the outcome
    /// carries a warning.
    pub fn add_installment(
        &mut self,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<AddOutcome, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }

        self.entries.push(Installment::pending(amount, date));
        let balance = self.balance();
        let warning = balance
            .is_overpaid()
            .then_some(BalanceWarning::Overpaid {
                by: balance.overpaid_by,
            });

        Ok(AddOutcome {
            index: self.entries.len() - 1,
            balance,
            warning,
        })
    }

    /// Drop the entry at `index`, whatever its state.
    pub fn remove_installment(&mut self, index: usize) -> Result<Installment, LedgerError> {
        self.check_index(index)?;
        Ok(self.entries.remove(index))
    }

    /// Record that the entry at `index` reached the backend.
    pub fn mark_saved(&mut self, index: usize) -> Result<(), LedgerError> {
        self.check_index(index)?;
        self.entries[index].state = InstallmentState::Persisted;
        Ok(())
    }

    /// Mark every entry as saved, returning how many changed state.
    pub fn mark_all_saved(&mut self) -> usize {
        let mut flushed = 0;
        for entry in self.entries.iter_mut().filter(|e| !e.is_saved()) {
            entry.state = InstallmentState::Persisted;
            flushed += 1;
        }
        flushed
    }

    /// Record why the still-pending entries have not been saved. Persisted
    /// entries are left alone.
    pub fn mark_pending(&mut self, reason: PendingReason) -> usize {
        let mut touched = 0;
        for entry in self.entries.iter_mut().filter(|e| !e.is_saved()) {
            entry.state = InstallmentState::Pending(reason);
            touched += 1;
        }
        touched
    }

    pub fn pending(&self) -> impl Iterator<Item = &Installment> {
        self.entries.iter().filter(|e| !e.is_saved())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| !e.is_saved())
    }

    /// Sum of entries the backend already holds.
    pub fn persisted_total(&self) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.is_saved())
            .map(|e| e.amount_paid)
            .sum()
    }

    fn check_index(&self, index: usize) -> Result<(), LedgerError> {
        if index >= self.entries.len() {
            return Err(LedgerError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    #[test]
    fn installments_reduce_balance_and_warn_on_overpayment() {
        let mut ledger = InstallmentLedger::new(dec!(50000));

        let first = ledger.add_installment(dec!(30000), day(1)).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.balance.remaining, dec!(20000));
        assert_eq!(first.warning, None);

        let second = ledger.add_installment(dec!(25000), day(2)).unwrap();
        assert_eq!(second.balance.remaining, Decimal::ZERO);
        assert_eq!(
            second.warning,
            Some(BalanceWarning::Overpaid { by: dec!(5000) })
        );
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut ledger = InstallmentLedger::new(dec!(100));
        assert_eq!(
            ledger.add_installment(Decimal::ZERO, day(1)),
            Err(LedgerError::NonPositiveAmount(Decimal::ZERO))
        );
        assert_eq!(
            ledger.add_installment(dec!(-10), day(1)),
            Err(LedgerError::NonPositiveAmount(dec!(-10)))
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn removal_leaves_no_residue() {
        let mut with_removed = InstallmentLedger::new(dec!(9000));
        with_removed.add_installment(dec!(1000), day(1)).unwrap();
        with_removed.add_installment(dec!(2500), day(2)).unwrap();
        with_removed.add_installment(dec!(700), day(3)).unwrap();
        let removed = with_removed.remove_installment(1).unwrap();
        assert_eq!(removed.amount_paid, dec!(2500));

        let mut never_added = InstallmentLedger::new(dec!(9000));
        never_added.add_installment(dec!(1000), day(1)).unwrap();
        never_added.add_installment(dec!(700), day(3)).unwrap();

        assert_eq!(with_removed.balance(), never_added.balance());
        assert_eq!(with_removed.len(), 2);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut ledger = InstallmentLedger::new(dec!(100));
        assert_eq!(
            ledger.remove_installment(0),
            Err(LedgerError::IndexOutOfRange { index: 0, len: 0 })
        );
        assert_eq!(
            ledger.mark_saved(3),
            Err(LedgerError::IndexOutOfRange { index: 3, len: 0 })
        );
    }

    #[test]
    fn saved_state_is_one_way() {
        let mut ledger = InstallmentLedger::new(dec!(500));
        ledger.add_installment(dec!(100), day(1)).unwrap();
        ledger.add_installment(dec!(50), day(2)).unwrap();
        ledger.mark_saved(0).unwrap();

        assert_eq!(ledger.mark_pending(PendingReason::PersistFailed), 1);
        assert!(ledger.entries()[0].is_saved());
        assert_eq!(
            ledger.entries()[1].state,
            InstallmentState::Pending(PendingReason::PersistFailed)
        );
        assert_eq!(ledger.pending_count(), 1);
        assert_eq!(ledger.persisted_total(), dec!(100));

        assert_eq!(ledger.mark_all_saved(), 1);
        assert!(!ledger.has_pending());
    }
}
