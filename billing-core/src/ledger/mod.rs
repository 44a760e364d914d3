//! Installment bookkeeping for debit notes: the balance calculator, the
//! per-note installment ledger and the payment-history assembler.

pub mod balance;
pub mod history;
pub mod installments;

pub use balance::{compute_balance, running_balance, BalanceSummary};
pub use history::{assemble_history, outstanding_balance};
pub use installments::{AddOutcome, BalanceWarning, InstallmentLedger};
