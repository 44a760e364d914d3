//! Domain models for the billing desk.

mod bank;
mod credit_bill;
mod customer;
mod debit_note;
mod history;
mod installment;
mod permission;

pub use bank::BankDetails;
pub use credit_bill::{BillItem, CreditBill};
pub use customer::Customer;
pub use debit_note::{
    DebitNote, DebitNotePayload, DebitNoteTotals, InstallmentPayload, DRAFT_NUMBER,
};
pub use history::{BillType, PaymentHistoryEntry};
pub use installment::{Installment, InstallmentState, PendingReason};
pub use permission::{PermissionAction, PermissionRequest, RequestStatus};
