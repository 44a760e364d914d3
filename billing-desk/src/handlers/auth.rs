use crate::error::AppError;
use crate::handlers::{hx_redirect, notices_response, PageChrome};
use crate::notice::Notice;
use crate::session::StaffSession;
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub chrome: PageChrome,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login_page() -> impl IntoResponse {
    LoginTemplate {
        chrome: PageChrome::anonymous("Sign in"),
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(payload): Form<LoginRequest>,
) -> Result<Response, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Ok(notices_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec![Notice::error("Email and password are required.")],
        ));
    }

    match state.auth.login(payload.email.trim(), &payload.password).await {
        Ok(staff) => {
            StaffSession::begin(&session, &staff).await?;
            Ok(hx_redirect("/dashboard"))
        }
        Err(AppError::Unauthorized(_)) => Ok(notices_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec![Notice::error("Invalid email or password.")],
        )),
        Err(e) => Err(e),
    }
}

/// Revoke the token and drop the session, draft included.
pub async fn logout_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Redirect, AppError> {
    if let Some(staff) = StaffSession::current(&session).await? {
        state.auth.logout(&staff.id_token).await;
        state.drafts.forget(&staff.user_id);
        tracing::info!(user_id = %staff.user_id, "User logged out");
    }

    StaffSession::end(&session).await?;
    Ok(Redirect::to("/login"))
}
