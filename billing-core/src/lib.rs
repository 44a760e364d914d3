//! billing-core: domain model and ledger arithmetic for the billing desk.
//!
//! Everything in here is synchronous and free of I/O except the shared
//! observability setup and the request-id middleware used by the web layer.
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod money;
pub mod normalize;
pub mod observability;
pub mod roles;
pub mod validation;

pub use error::{AmountError, LedgerError, NormalizeError};
pub use rust_decimal;
pub use rust_decimal::Decimal;
pub use validator;
