pub mod auth_client;
pub mod backend_client;
pub mod debit_notes;
pub mod mailer;
pub mod metrics;
pub mod permissions;
pub mod reconciliation;
pub mod renderer;
