pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notice;
pub mod scope;
pub mod services;
pub mod session;
pub mod startup;
pub mod utils;

use config::Settings;
use services::{auth_client::AuthClient, backend_client::BackendClient, mailer::Mailer};
use session::DraftStore;
use std::sync::Arc;

/// Shared application state: configuration, the outbound clients and the
/// open debit note drafts.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub backend: Arc<BackendClient>,
    pub auth: Arc<AuthClient>,
    pub mailer: Arc<dyn Mailer>,
    pub drafts: Arc<DraftStore>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        backend: BackendClient,
        auth: AuthClient,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            backend: Arc::new(backend),
            auth: Arc::new(auth),
            mailer,
            drafts: Arc::new(DraftStore::new()),
        }
    }
}
