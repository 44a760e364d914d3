pub mod views;

pub use views::{
    format_date, BalanceView, CreditBillRow, CustomerRow, DebitNoteRow, HistoryRow,
    InstallmentRow, NavLink, PermissionRow,
};
