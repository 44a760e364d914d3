use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while mutating an installment ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Installment amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("No installment at position {index} (ledger holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Credit bill {0} has no outstanding balance")]
    NoOutstandingBalance(String),

    #[error("Debit note has been cancelled")]
    Cancelled,

    #[error("Installment date {date} is before the credit bill date {bill_date}")]
    DateBeforeBill { date: NaiveDate, bill_date: NaiveDate },
}

/// Errors raised while parsing a user-entered amount.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount is required")]
    Empty,

    #[error("'{0}' is not a valid amount")]
    NotANumber(String),

    #[error("Amount cannot be negative, got {0}")]
    Negative(Decimal),
}

/// Errors raised at the normalization boundary when backend JSON cannot be
/// mapped onto a strict internal type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{entity}: expected a JSON object")]
    NotAnObject { entity: &'static str },

    #[error("{entity}: expected a JSON array")]
    NotAnArray { entity: &'static str },

    #[error("{entity}: missing field '{field}'")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity}: field '{field}' is invalid: {reason}")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
        reason: String,
    },
}
