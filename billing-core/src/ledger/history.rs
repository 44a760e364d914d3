use super::balance::running_balance;
use crate::models::{BillType, CreditBill, DebitNote, InstallmentState, PaymentHistoryEntry};
use crate::money::format_money;
use rust_decimal::Decimal;

/// Notes that count towards a bill's balance: stored, not cancelled, and
/// pointing at this bill.
fn applicable_notes<'a>(
    credit_bill: &'a CreditBill,
    persisted_notes: &'a [DebitNote],
) -> impl Iterator<Item = &'a DebitNote> + 'a {
    persisted_notes
        .iter()
        .filter(move |n| n.credit_bill_id == credit_bill.id && n.is_persisted() && !n.cancelled)
}

/// What is still owed on `credit_bill` after every stored debit note.
///
/// This is the balance a new debit note opens with.
pub fn outstanding_balance(credit_bill: &CreditBill, persisted_notes: &[DebitNote]) -> Decimal {
    applicable_notes(credit_bill, persisted_notes).fold(credit_bill.balance_amount, |balance, n| {
        running_balance(balance, n.ledger.persisted_total())
    })
}

/// Build the chronological payment ledger of a credit bill.
///
/// The first entry is always the bill's opening balance. Stored debit notes
/// follow, one entry each, then the unsaved installments of `current`.
/// Everything after the opening entry is ordered by date; on equal dates
/// stored entries come before unsaved ones and input order is kept.
/// When `current` is itself stored, its in-memory copy replaces the one in
/// `persisted_notes`.
pub fn assemble_history(
    credit_bill: &CreditBill,
    persisted_notes: &[DebitNote],
    current: Option<&DebitNote>,
) -> Vec<PaymentHistoryEntry> {
    let mut entries = vec![PaymentHistoryEntry {
        invoice_number: credit_bill.invoice_number.clone(),
        bill_type: BillType::CreditBill,
        paid_amount: credit_bill.amount_paid,
        remaining_balance: credit_bill.balance_amount,
        date: credit_bill.date,
        description: format!(
            "Credit bill of {} issued, {} paid at billing",
            format_money(credit_bill.grand_total),
            format_money(credit_bill.amount_paid)
        ),
        pending: false,
    }];

    let current_id = current.and_then(|c| c.id.as_deref());
    let mut stored: Vec<&DebitNote> = applicable_notes(credit_bill, persisted_notes)
        .filter(|n| current_id.is_none() || n.id.as_deref() != current_id)
        .collect();
    if let Some(note) = current.filter(|c| {
        c.is_persisted() && !c.cancelled && c.credit_bill_id == credit_bill.id
    }) {
        stored.push(note);
    }

    let mut movements: Vec<PaymentHistoryEntry> = stored
        .into_iter()
        .map(|n| {
            let saved = n.installments().iter().filter(|i| i.is_saved()).count();
            PaymentHistoryEntry {
                invoice_number: n.display_number().to_string(),
                bill_type: BillType::DebitNote,
                paid_amount: n.ledger.persisted_total(),
                remaining_balance: Decimal::ZERO,
                date: n.date,
                description: match saved {
                    1 => "Debit note payment (1 installment)".to_string(),
                    count => format!("Debit note payment ({} installments)", count),
                },
                pending: false,
            }
        })
        .collect();

    if let Some(note) = current.filter(|c| !c.cancelled) {
        movements.extend(note.ledger.pending().map(|i| PaymentHistoryEntry {
            invoice_number: note.display_number().to_string(),
            bill_type: BillType::DebitNote,
            paid_amount: i.amount_paid,
            remaining_balance: Decimal::ZERO,
            date: i.date,
            description: match i.state {
                InstallmentState::Pending(reason) => format!("Installment ({})", reason.as_str()),
                InstallmentState::Persisted => "Installment".to_string(),
            },
            pending: true,
        }));
    }

    // Stable sort keeps input order within a date, stored before pending.
    movements.sort_by_key(|e| (e.date, e.pending));

    let mut balance = credit_bill.balance_amount;
    for entry in movements.iter_mut() {
        balance = running_balance(balance, entry.paid_amount);
        entry.remaining_balance = balance;
    }

    entries.extend(movements);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::installments::InstallmentLedger;
    use crate::models::Installment;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn bill() -> CreditBill {
        CreditBill {
            id: "cb-9".to_string(),
            invoice_number: "CB-0009".to_string(),
            customer_id: "cust-1".to_string(),
            customer_name: None,
            date: day(1, 10),
            grand_total: dec!(60000),
            amount_paid: dec!(10000),
            balance_amount: dec!(50000),
            items: vec![],
        }
    }

    fn stored_note(id: &str, bill_id: &str, date: NaiveDate, amounts: &[Decimal]) -> DebitNote {
        let entries = amounts
            .iter()
            .map(|a| Installment::persisted(*a, date))
            .collect();
        DebitNote {
            id: Some(id.to_string()),
            invoice_number: Some(format!("DN-{}", id)),
            customer_id: "cust-1".to_string(),
            credit_bill_id: bill_id.to_string(),
            date,
            due_date: date,
            ledger: InstallmentLedger::from_entries(dec!(50000), entries),
            cancelled: false,
        }
    }

    #[test]
    fn opening_entry_comes_first_even_without_notes() {
        let history = assemble_history(&bill(), &[], None);

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].bill_type, BillType::CreditBill);
        assert_eq!(history[0].remaining_balance, dec!(50000));
        assert_eq!(history[0].paid_amount, dec!(10000));
    }

    #[test]
    fn stored_notes_are_filtered_sorted_and_chained() {
        let mut cancelled = stored_note("4", "cb-9", day(2, 1), &[dec!(1000)]);
        cancelled.cancelled = true;
        let notes = vec![
            stored_note("2", "cb-9", day(3, 15), &[dec!(5000)]),
            stored_note("1", "cb-9", day(2, 20), &[dec!(10000), dec!(2000)]),
            stored_note("3", "other", day(2, 25), &[dec!(9999)]),
            cancelled,
        ];

        let history = assemble_history(&bill(), &notes, None);

        let numbers: Vec<&str> = history.iter().map(|e| e.invoice_number.as_str()).collect();
        assert_eq!(numbers, vec!["CB-0009", "DN-1", "DN-2"]);
        assert_eq!(history[1].paid_amount, dec!(12000));
        assert_eq!(history[1].remaining_balance, dec!(38000));
        assert_eq!(history[2].remaining_balance, dec!(33000));
        assert!(history.windows(2).skip(1).all(|w| w[0].date <= w[1].date));

        assert_eq!(outstanding_balance(&bill(), &notes), dec!(33000));
    }

    #[test]
    fn pending_installments_follow_with_clamped_balance() {
        let mut draft = DebitNote::open(&bill(), dec!(50000), day(4, 1), 30).unwrap();
        draft.ledger.add_installment(dec!(30000), day(4, 1)).unwrap();
        draft.ledger.add_installment(dec!(25000), day(4, 2)).unwrap();

        let history = assemble_history(&bill(), &[], Some(&draft));

        assert_eq!(history.len(), 3);
        assert!(history[1].pending);
        assert_eq!(history[1].remaining_balance, dec!(20000));
        assert_eq!(history[2].remaining_balance, Decimal::ZERO);
        assert_eq!(history[2].description, "Installment (unsaved)");
    }

    #[test]
    fn current_stored_note_replaces_fetched_copy() {
        let fetched = stored_note("1", "cb-9", day(2, 20), &[dec!(10000)]);
        let mut current = fetched.clone();
        current.ledger.add_installment(dec!(500), day(2, 21)).unwrap();

        let history = assemble_history(&bill(), &[fetched], Some(&current));

        assert_eq!(history.len(), 3);
        assert_eq!(history[1].paid_amount, dec!(10000));
        assert!(!history[1].pending);
        assert_eq!(history[2].paid_amount, dec!(500));
        assert_eq!(history[2].remaining_balance, dec!(39500));
    }

    #[test]
    fn assembling_twice_gives_the_same_ledger() {
        let notes = vec![stored_note("1", "cb-9", day(2, 20), &[dec!(10000)])];
        assert_eq!(
            assemble_history(&bill(), &notes, None),
            assemble_history(&bill(), &notes, None)
        );
    }
}
