//! Installment model.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an installment has not reached the backend yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingReason {
    /// Added in this session, no save attempted.
    Unsaved,
    /// A save was attempted and the backend rejected or never answered it.
    PersistFailed,
    /// Held behind a permission request until an admin approves it.
    AwaitingApproval,
}

impl PendingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingReason::Unsaved => "unsaved",
            PendingReason::PersistFailed => "save failed",
            PendingReason::AwaitingApproval => "awaiting approval",
        }
    }
}

/// Persistence state of one installment. Transitions only go from
/// `Pending` to `Persisted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum InstallmentState {
    Pending(PendingReason),
    Persisted,
}

impl InstallmentState {
    pub fn is_persisted(&self) -> bool {
        matches!(self, InstallmentState::Persisted)
    }
}

/// A single partial payment recorded against a debit note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub local_id: Uuid,
    pub amount_paid: Decimal,
    pub date: NaiveDate,
    pub state: InstallmentState,
}

impl Installment {
    /// A fresh, unsaved entry.
    pub fn pending(amount_paid: Decimal, date: NaiveDate) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            amount_paid,
            date,
            state: InstallmentState::Pending(PendingReason::Unsaved),
        }
    }

    /// An entry loaded from the backend.
    pub fn persisted(amount_paid: Decimal, date: NaiveDate) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            amount_paid,
            date,
            state: InstallmentState::Persisted,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.state.is_persisted()
    }
}
