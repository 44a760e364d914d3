//! The debit note being worked on, and the operations that change it.

use crate::error::AppError;
use crate::notice::Notice;
use crate::scope::RequestScope;
use crate::services::backend_client::BackendClient;
use crate::services::metrics::record_installment;
use billing_core::ledger::{assemble_history, outstanding_balance, BalanceWarning};
use billing_core::models::{CreditBill, DebitNote, PaymentHistoryEntry};
use billing_core::money::{format_money, parse_amount};
use billing_core::LedgerError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The permission request covering a staff user's unsaved installments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTicket {
    pub request_id: String,
    /// Pending installments the request was filed for.
    pub installments_covered: usize,
}

/// Working copy of one debit note and its credit bill, one per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebitNoteDraft {
    pub note: DebitNote,
    pub credit_bill: CreditBill,
    /// A saved installment was removed; the stored note is out of date.
    #[serde(default)]
    pub dirty: bool,
    #[serde(default)]
    pub approval: Option<ApprovalTicket>,
}

impl DebitNoteDraft {
    pub fn new(note: DebitNote, credit_bill: CreditBill) -> Self {
        Self {
            note,
            credit_bill,
            dirty: false,
            approval: None,
        }
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty || self.note.ledger.has_pending()
    }

    pub fn pending_count(&self) -> usize {
        self.note.ledger.pending_count()
    }
}

/// Result of choosing a credit bill to record payments against.
#[derive(Debug)]
pub enum Selection {
    Opened(DebitNoteDraft),
    NothingOwed(Notice),
}

/// Start a new debit note for `credit_bill_id`.
///
/// The bill and its stored notes are fetched in parallel; the new note
/// opens with what is still owed. A settled bill yields a warning and no
/// draft. No installment is added automatically.
pub async fn open_for_bill(
    backend: &BackendClient,
    scope: &RequestScope,
    token: &str,
    credit_bill_id: &str,
    today: NaiveDate,
    payment_terms_days: u64,
) -> Result<Selection, AppError> {
    let (credit_bill, stored) = tokio::try_join!(
        scope.run(backend.credit_bill(token, credit_bill_id)),
        scope.run(backend.debit_notes_for(token, credit_bill_id)),
    )?;

    let opening = outstanding_balance(&credit_bill, &stored);
    match DebitNote::open(&credit_bill, opening, today, payment_terms_days) {
        Ok(note) => {
            tracing::info!(
                credit_bill_id = %credit_bill.id,
                opening_balance = %opening,
                "Debit note draft opened"
            );
            Ok(Selection::Opened(DebitNoteDraft::new(note, credit_bill)))
        }
        Err(LedgerError::NoOutstandingBalance(invoice)) => Ok(Selection::NothingOwed(
            Notice::warning(format!(
                "Credit bill {} has no outstanding balance. Nothing to record.",
                invoice
            )),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Load a stored debit note for further installments.
pub async fn open_existing(
    backend: &BackendClient,
    scope: &RequestScope,
    token: &str,
    debit_note_id: &str,
) -> Result<DebitNoteDraft, AppError> {
    let note = scope.run(backend.debit_note(token, debit_note_id)).await?;
    if note.cancelled {
        return Err(LedgerError::Cancelled.into());
    }
    let credit_bill = scope
        .run(backend.credit_bill(token, &note.credit_bill_id))
        .await?;
    Ok(DebitNoteDraft::new(note, credit_bill))
}

/// Parse `raw_amount` and append it as an unsaved installment.
///
/// Returns the notices to show: a confirmation, plus a warning when the
/// payments now exceed the balance.
pub fn add_installment(
    draft: &mut DebitNoteDraft,
    raw_amount: &str,
    date: NaiveDate,
) -> Result<Vec<Notice>, AppError> {
    if draft.note.cancelled {
        return Err(LedgerError::Cancelled.into());
    }
    // History opens at the bill date; nothing may sort ahead of it.
    if date < draft.credit_bill.date {
        record_installment("rejected");
        return Err(LedgerError::DateBeforeBill {
            date,
            bill_date: draft.credit_bill.date,
        }
        .into());
    }

    let amount = parse_amount(raw_amount).map_err(|e| {
        record_installment("rejected");
        AppError::from(e)
    })?;
    let outcome = draft.note.ledger.add_installment(amount, date).map_err(|e| {
        record_installment("rejected");
        AppError::from(e)
    })?;
    record_installment("added");

    let mut notices = vec![Notice::success(format!(
        "Installment of {} added. Save to record it.",
        format_money(amount)
    ))];
    if let Some(BalanceWarning::Overpaid { by }) = outcome.warning {
        notices.push(Notice::warning(format!(
            "Payments exceed the balance by {}. The remaining balance is shown as 0.00.",
            format_money(by)
        )));
    }
    Ok(notices)
}

pub fn remove_installment(draft: &mut DebitNoteDraft, index: usize) -> Result<Notice, AppError> {
    if draft.note.cancelled {
        return Err(LedgerError::Cancelled.into());
    }

    let removed = draft.note.ledger.remove_installment(index)?;
    record_installment("removed");

    if removed.is_saved() {
        draft.dirty = true;
        Ok(Notice::warning(format!(
            "Saved installment of {} removed. Save to update the stored debit note.",
            format_money(removed.amount_paid)
        )))
    } else {
        Ok(Notice::info(format!(
            "Installment of {} removed.",
            format_money(removed.amount_paid)
        )))
    }
}

/// The credit bill's payment ledger with the draft's unsaved installments.
pub async fn history(
    backend: &BackendClient,
    scope: &RequestScope,
    token: &str,
    draft: &DebitNoteDraft,
) -> Result<Vec<PaymentHistoryEntry>, AppError> {
    let stored = scope
        .run(backend.debit_notes_for(token, &draft.credit_bill.id))
        .await?;
    Ok(assemble_history(&draft.credit_bill, &stored, Some(&draft.note)))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use billing_core::Decimal;

    pub fn draft(balance: Decimal) -> DebitNoteDraft {
        let bill = CreditBill {
            id: "cb-1".to_string(),
            invoice_number: "CB-0001".to_string(),
            customer_id: "c-1".to_string(),
            customer_name: Some("Kerala Spices".to_string()),
            date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            grand_total: balance,
            amount_paid: Decimal::ZERO,
            balance_amount: balance,
            items: Vec::new(),
        };
        let note = DebitNote::open(&bill, balance, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(), 30).unwrap();
        DebitNoteDraft::new(note, bill)
    }
}
