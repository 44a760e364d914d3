use crate::config::Settings;
use crate::error::AppError;
use crate::handlers::{
    app::{health_check, index},
    auth::{login_handler, login_page, logout_handler},
    credit_bills::{list_credit_bills, show_credit_bill},
    customers::{create_customer, list_customers},
    dashboard::{dashboard_handler, panel_handler},
    debit_notes::{
        add_installment, cancel_debit_note, discard_draft, edit_debit_note, remove_installment,
        save_draft, select_credit_bill, show_draft,
    },
    documents::{download_pdf, email, preview, print},
    permissions::{approve_request, list_requests, reject_request},
    PageChrome,
};
use crate::services::{
    auth_client::AuthClient,
    backend_client::BackendClient,
    mailer::{Mailer, SmtpMailer},
    metrics::metrics_middleware,
};
use crate::AppState;
use askama::Template;
use axum::{
    http::StatusCode,
    middleware::from_fn,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use billing_core::middleware::{request_id_middleware, REQUEST_ID_HEADER};
use std::any::Any;
use std::future::IntoFuture;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPageTemplate {
    pub chrome: PageChrome,
    pub message: &'static str,
}

/// Last-resort boundary: a panicking handler still yields a page.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");

    let body = ErrorPageTemplate {
        chrome: PageChrome::anonymous("Something went wrong"),
        message: "Something went wrong. Please go back and try again.",
    }
    .render()
    .unwrap_or_else(|_| "Something went wrong.".to_string());

    (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
}

pub fn build_router(state: AppState) -> Router {
    let server = &state.settings.server;
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(server.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(server.session_idle_hours)));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(crate::handlers::metrics::metrics))
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/panels/:name", get(panel_handler))
        .route("/customers", get(list_customers).post(create_customer))
        .route("/credit-bills", get(list_credit_bills))
        .route("/credit-bills/:id", get(show_credit_bill))
        .route("/debit-notes/draft", get(show_draft).post(select_credit_bill))
        .route("/debit-notes/draft/installments", post(add_installment))
        .route(
            "/debit-notes/draft/installments/:index/delete",
            post(remove_installment),
        )
        .route("/debit-notes/draft/save", post(save_draft))
        .route("/debit-notes/draft/discard", post(discard_draft))
        .route("/debit-notes/draft/preview", get(preview))
        .route("/debit-notes/draft/pdf", get(download_pdf))
        .route("/debit-notes/draft/email", post(email))
        .route("/debit-notes/:id/edit", post(edit_debit_note))
        .route("/debit-notes/:id/cancel", post(cancel_debit_note))
        .route("/debit-notes/:id/print", get(print))
        .route("/permission-requests", get(list_requests))
        .route("/permission-requests/:id/approve", post(approve_request))
        .route("/permission-requests/:id/reject", post(reject_request))
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(settings.smtp.clone())?);
        Self::build_with_mailer(settings, mailer).await
    }

    /// Build with a caller-supplied mailer; tests pass a recording one.
    pub async fn build_with_mailer(
        settings: Settings,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, AppError> {
        let backend = BackendClient::new(settings.backend.clone())?;
        let auth = AuthClient::new(settings.auth.clone())?;
        let address = format!("{}:{}", settings.server.host, settings.server.port);

        let state = AppState::new(settings, backend, auth, mailer);
        let app = build_router(state);

        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::Internal(e.into())
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| AppError::Internal(e.into()))?
            .port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_render_the_fallback_page() {
        let res = handle_panic(Box::new("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
