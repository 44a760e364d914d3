//! Display rows for templates. Amounts and dates arrive pre-formatted so the
//! templates stay free of logic.

use billing_core::ledger::BalanceSummary;
use billing_core::models::{
    CreditBill, Customer, DebitNote, Installment, InstallmentState, PaymentHistoryEntry,
    PermissionRequest, RequestStatus,
};
use billing_core::money::format_money;
use billing_core::roles::Panel;
use chrono::NaiveDate;

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[derive(Debug, Clone)]
pub struct NavLink {
    pub title: &'static str,
    pub path: &'static str,
}

impl From<Panel> for NavLink {
    fn from(panel: Panel) -> Self {
        Self {
            title: panel.title(),
            path: panel.path(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstallmentRow {
    pub index: usize,
    pub date: String,
    pub amount: String,
    pub status: &'static str,
    pub pending: bool,
}

impl InstallmentRow {
    pub fn new(index: usize, installment: &Installment) -> Self {
        Self {
            index,
            date: format_date(installment.date),
            amount: format_money(installment.amount_paid),
            status: match installment.state {
                InstallmentState::Persisted => "saved",
                InstallmentState::Pending(reason) => reason.as_str(),
            },
            pending: !installment.is_saved(),
        }
    }

    pub fn rows(installments: &[Installment]) -> Vec<Self> {
        installments
            .iter()
            .enumerate()
            .map(|(i, installment)| Self::new(i, installment))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub invoice_number: String,
    pub bill_type: &'static str,
    pub date: String,
    pub paid: String,
    pub remaining: String,
    pub description: String,
    pub pending: bool,
}

impl From<&PaymentHistoryEntry> for HistoryRow {
    fn from(entry: &PaymentHistoryEntry) -> Self {
        Self {
            invoice_number: entry.invoice_number.clone(),
            bill_type: entry.bill_type.as_str(),
            date: format_date(entry.date),
            paid: format_money(entry.paid_amount),
            remaining: format_money(entry.remaining_balance),
            description: entry.description.clone(),
            pending: entry.pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BalanceView {
    pub opening: String,
    pub paid: String,
    pub remaining: String,
    pub overpaid_by: Option<String>,
}

impl From<BalanceSummary> for BalanceView {
    fn from(summary: BalanceSummary) -> Self {
        Self {
            opening: format_money(summary.opening),
            paid: format_money(summary.total_paid),
            remaining: format_money(summary.remaining),
            overpaid_by: summary
                .is_overpaid()
                .then(|| format_money(summary.overpaid_by)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreditBillRow {
    pub id: String,
    pub invoice_number: String,
    pub customer: String,
    pub date: String,
    pub total: String,
    pub paid: String,
    pub balance: String,
    pub outstanding: bool,
}

impl CreditBillRow {
    /// `customers` resolves the display name when the bill only carries an
    /// id.
    pub fn new(bill: &CreditBill, customers: &[Customer]) -> Self {
        let customer = bill
            .customer_name
            .clone()
            .or_else(|| {
                customers
                    .iter()
                    .find(|c| c.id == bill.customer_id)
                    .map(|c| c.name.clone())
            })
            .unwrap_or_else(|| bill.customer_id.clone());

        Self {
            id: bill.id.clone(),
            invoice_number: bill.invoice_number.clone(),
            customer,
            date: format_date(bill.date),
            total: format_money(bill.grand_total),
            paid: format_money(bill.amount_paid),
            balance: format_money(bill.balance_amount),
            outstanding: bill.has_outstanding_balance(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CustomerRow {
    pub name: String,
    pub gstin: String,
    pub email: String,
    pub phone: String,
    pub state: String,
}

impl From<&Customer> for CustomerRow {
    fn from(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            gstin: customer.gstin.clone().unwrap_or_else(|| "-".to_string()),
            email: customer.email.clone().unwrap_or_default(),
            phone: customer.phone.clone().unwrap_or_default(),
            state: customer.state.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PermissionRow {
    pub id: String,
    pub action: &'static str,
    pub resource: String,
    pub resource_id: String,
    pub requested_by: String,
    pub department: String,
    pub status: &'static str,
    pub pending: bool,
}

impl From<&PermissionRequest> for PermissionRow {
    fn from(request: &PermissionRequest) -> Self {
        Self {
            id: request.id.clone().unwrap_or_default(),
            action: request.action.as_str(),
            resource: request.resource.clone(),
            resource_id: request.resource_id.clone().unwrap_or_else(|| "new".to_string()),
            requested_by: request.requested_by.clone(),
            department: request.department.clone(),
            status: request.status.as_str(),
            pending: request.status == RequestStatus::Pending && request.id.is_some(),
        }
    }
}

/// A stored debit note as listed under its credit bill.
#[derive(Debug, Clone)]
pub struct DebitNoteRow {
    pub id: String,
    pub number: String,
    pub date: String,
    pub paid: String,
    pub installments: usize,
    pub cancelled: bool,
}

impl From<&DebitNote> for DebitNoteRow {
    fn from(note: &DebitNote) -> Self {
        Self {
            id: note.id.clone().unwrap_or_default(),
            number: note.display_number().to_string(),
            date: format_date(note.date),
            paid: format_money(note.total_paid()),
            installments: note.installments().len(),
            cancelled: note.cancelled,
        }
    }
}
