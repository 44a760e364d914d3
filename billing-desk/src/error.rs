use crate::notice::Notice;
use askama::Template;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use billing_core::{AmountError, LedgerError, NormalizeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("Unexpected backend response: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Upstream(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Document error: {0}")]
    Render(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(billing_core::validation::describe(&err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AppError::Session(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Email(err.to_string())
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        AppError::Render(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Amount(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Ledger(LedgerError::Cancelled) => StatusCode::CONFLICT,
            AppError::Ledger(LedgerError::NoOutstandingBalance(_)) => StatusCode::CONFLICT,
            AppError::Ledger(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) | AppError::Normalize(_) | AppError::Email(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Render(_)
            | AppError::Session(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The banner shown for this error. Internal details stay in the logs.
    pub fn notice(&self) -> Notice {
        match self {
            AppError::Validation(lines) => {
                Notice::error("Please correct the highlighted fields.").with_details(lines.clone())
            }
            AppError::Ledger(err) => Notice::error(err.to_string()),
            AppError::Amount(err) => Notice::error(err.to_string()),
            AppError::Unauthorized(_) => {
                Notice::error("Your session has expired. Please sign in again.")
            }
            AppError::Forbidden(_) => {
                Notice::error("You do not have permission to perform this action.")
            }
            AppError::NotFound(what) => Notice::error(format!("{} was not found.", what)),
            AppError::Upstream(_) | AppError::Normalize(_) => {
                Notice::error("The billing service could not complete the request.").retryable()
            }
            AppError::Timeout { operation, seconds } => Notice::error(format!(
                "{} did not finish within {} seconds.",
                operation, seconds
            ))
            .retryable(),
            AppError::Cancelled => Notice::info("The request was cancelled."),
            AppError::Render(_) => Notice::error("The document could not be generated.").retryable(),
            AppError::Email(_) => Notice::error("The email could not be sent.").retryable(),
            AppError::Session(_) | AppError::Config(_) | AppError::Internal(_) => {
                Notice::error("Something went wrong. Please try again.").retryable()
            }
        }
    }
}

#[derive(Template)]
#[template(path = "fragments/notices.html")]
pub struct NoticesFragment {
    pub notices: Vec<Notice>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::warn!(error = %self, status = %status, "Request rejected");
        }

        // Error banners always land in the notice area, whatever the
        // triggering element targeted.
        crate::handlers::notices_response(status, vec![self.notice()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::Decimal;

    #[test]
    fn ledger_and_amount_errors_are_client_errors() {
        assert_eq!(
            AppError::from(LedgerError::NonPositiveAmount(Decimal::ZERO)).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(AmountError::Empty).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn backend_failures_offer_a_retry() {
        let notice = AppError::Upstream("connection refused".to_string()).notice();
        assert!(notice.retryable);
        assert!(!notice.message.contains("connection refused"));
    }

    #[test]
    fn validation_lists_every_field() {
        let err = AppError::Validation(vec![
            "email: Invalid email format".to_string(),
            "gstin: Invalid GSTIN format".to_string(),
        ]);
        assert_eq!(err.notice().details.len(), 2);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn error_response_targets_notice_area() {
        let res = AppError::Timeout {
            operation: "PDF generation",
            seconds: 30,
        }
        .into_response();
        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(res.headers()["HX-Retarget"], "#notices");
    }
}
