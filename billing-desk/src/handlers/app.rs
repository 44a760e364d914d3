use crate::session::StaffSession;
use axum::response::{IntoResponse, Redirect};
use tower_sessions::Session;

pub async fn index(session: Session) -> impl IntoResponse {
    match StaffSession::current(&session).await {
        Ok(Some(_)) => Redirect::to("/dashboard"),
        _ => Redirect::to("/login"),
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}
