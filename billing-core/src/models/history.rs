//! Payment history entries. Derived on every load, never persisted.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which document an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    CreditBill,
    DebitNote,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::CreditBill => "Credit Bill",
            BillType::DebitNote => "Debit Note",
        }
    }
}

/// One row of the chronological payment ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistoryEntry {
    pub invoice_number: String,
    pub bill_type: BillType,
    pub paid_amount: Decimal,
    /// Running balance after this entry's payment.
    pub remaining_balance: Decimal,
    pub date: NaiveDate,
    pub description: String,
    /// Set for installments of the current session not yet saved.
    pub pending: bool,
}
