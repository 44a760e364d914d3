//! Debit note model.

use super::credit_bill::CreditBill;
use super::installment::Installment;
use crate::error::LedgerError;
use crate::ledger::balance::{compute_balance, BalanceSummary};
use crate::ledger::installments::InstallmentLedger;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Placeholder shown until the backend assigns an invoice number.
pub const DRAFT_NUMBER: &str = "DRAFT";

/// Derived totals of a debit note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitNoteTotals {
    pub total_amount: Decimal,
    pub remaining_amount_to_pay: Decimal,
}

/// A document recording installment payments against a credit bill.
///
/// The note references its credit bill by id only; the installments are
/// owned by the note's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitNote {
    pub id: Option<String>,
    pub invoice_number: Option<String>,
    pub customer_id: String,
    pub credit_bill_id: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub ledger: InstallmentLedger,
    pub cancelled: bool,
}

impl DebitNote {
    /// Open a new draft against `credit_bill`.
    ///
    /// `opening_balance` is what is still owed on the bill after earlier
    /// debit notes; a bill with nothing owed cannot be opened.
    pub fn open(
        credit_bill: &CreditBill,
        opening_balance: Decimal,
        date: NaiveDate,
        payment_terms_days: u64,
    ) -> Result<Self, LedgerError> {
        if opening_balance <= Decimal::ZERO {
            return Err(LedgerError::NoOutstandingBalance(
                credit_bill.invoice_number.clone(),
            ));
        }

        let due_date = date
            .checked_add_days(Days::new(payment_terms_days))
            .unwrap_or(date);

        Ok(Self {
            id: None,
            invoice_number: None,
            customer_id: credit_bill.customer_id.clone(),
            credit_bill_id: credit_bill.id.clone(),
            date,
            due_date,
            ledger: InstallmentLedger::new(opening_balance),
            cancelled: false,
        })
    }

    pub fn installments(&self) -> &[Installment] {
        self.ledger.entries()
    }

    pub fn balance(&self) -> BalanceSummary {
        compute_balance(self.ledger.opening_balance(), self.ledger.entries())
    }

    pub fn totals(&self) -> DebitNoteTotals {
        let balance = self.balance();
        DebitNoteTotals {
            total_amount: balance.total_paid,
            remaining_amount_to_pay: balance.remaining,
        }
    }

    pub fn total_paid(&self) -> Decimal {
        self.ledger.total_paid()
    }

    /// Whether the backend knows about this note.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn display_number(&self) -> &str {
        self.invoice_number.as_deref().unwrap_or(DRAFT_NUMBER)
    }

    /// Canonical request body sent to the backend on create and update.
    ///
    /// Carries every installment, saved or not, since updates replace the
    /// stored list.
    pub fn payload(&self) -> DebitNotePayload {
        let totals = self.totals();
        DebitNotePayload {
            invoice_number: self.invoice_number.clone(),
            customer_id: self.customer_id.clone(),
            credit_bill_id: self.credit_bill_id.clone(),
            date: self.date,
            due_date: self.due_date,
            opening_balance: self.ledger.opening_balance(),
            installments: self
                .installments()
                .iter()
                .map(|i| InstallmentPayload {
                    amount_paid: i.amount_paid,
                    date: i.date,
                })
                .collect(),
            total_amount: totals.total_amount,
            remaining_amount_to_pay: totals.remaining_amount_to_pay,
            cancelled: self.cancelled,
        }
    }
}

/// Installment as sent to the backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPayload {
    pub amount_paid: Decimal,
    pub date: NaiveDate,
}

/// Debit note as sent to the backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitNotePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub customer_id: String,
    pub credit_bill_id: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub opening_balance: Decimal,
    pub installments: Vec<InstallmentPayload>,
    pub total_amount: Decimal,
    pub remaining_amount_to_pay: Decimal,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bill(balance: Decimal) -> CreditBill {
        CreditBill {
            id: "cb-1".to_string(),
            invoice_number: "CB-0042".to_string(),
            customer_id: "cust-7".to_string(),
            customer_name: Some("Wayanad Traders".to_string()),
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            grand_total: dec!(80000),
            amount_paid: dec!(30000),
            balance_amount: balance,
            items: vec![],
        }
    }

    #[test]
    fn open_sets_due_date_from_payment_terms() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let note = DebitNote::open(&bill(dec!(50000)), dec!(50000), date, 30).unwrap();

        assert_eq!(note.due_date, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert_eq!(note.credit_bill_id, "cb-1");
        assert_eq!(note.customer_id, "cust-7");
        assert!(note.installments().is_empty());
        assert_eq!(note.display_number(), DRAFT_NUMBER);
        assert!(!note.is_persisted());
    }

    #[test]
    fn open_refuses_settled_bill() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let err = DebitNote::open(&bill(dec!(0)), dec!(0), date, 30).unwrap_err();
        assert_eq!(err, LedgerError::NoOutstandingBalance("CB-0042".to_string()));
    }

    #[test]
    fn payload_carries_all_installments_and_totals() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let mut note = DebitNote::open(&bill(dec!(50000)), dec!(50000), date, 30).unwrap();
        note.ledger.add_installment(dec!(30000), date).unwrap();
        note.ledger.mark_saved(0).unwrap();
        note.ledger.add_installment(dec!(5000), date).unwrap();

        let payload = note.payload();
        assert_eq!(payload.installments.len(), 2);
        assert_eq!(payload.total_amount, dec!(35000));
        assert_eq!(payload.remaining_amount_to_pay, dec!(15000));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["creditBillId"], "cb-1");
        assert_eq!(json["dueDate"], "2026-03-03");
        assert!(json.get("invoiceNumber").is_none());
    }
}
