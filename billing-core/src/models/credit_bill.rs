//! Credit bill model. Credit bills are issued by a separate workflow and are
//! read-only here.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A line on a credit bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillItem {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// An invoice issued with deferred payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBill {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub date: NaiveDate,
    pub grand_total: Decimal,
    pub amount_paid: Decimal,
    /// Outstanding amount when the bill was issued, before any debit note.
    pub balance_amount: Decimal,
    pub items: Vec<BillItem>,
}

impl CreditBill {
    pub fn has_outstanding_balance(&self) -> bool {
        self.balance_amount > Decimal::ZERO
    }
}
