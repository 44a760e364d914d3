use crate::error::AppError;
use crate::handlers::{notices_response, PageChrome};
use crate::models::PermissionRow;
use crate::notice::Notice;
use crate::scope::RequestScope;
use crate::services::permissions;
use crate::session::StaffSession;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "permission_requests.html")]
pub struct PermissionRequestsTemplate {
    pub chrome: PageChrome,
    pub requests: Vec<PermissionRow>,
}

fn require_reviewer(staff: &StaffSession) -> Result<(), AppError> {
    if staff.role.can_review_requests() {
        Ok(())
    } else {
        Err(AppError::Forbidden("permission requests".to_string()))
    }
}

pub async fn list_requests(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
) -> Result<impl IntoResponse, AppError> {
    require_reviewer(&staff)?;
    let token = state.auth.token_for(&session, &mut staff).await?;
    let requests = scope.run(state.backend.permission_requests(&token)).await?;

    Ok(PermissionRequestsTemplate {
        chrome: PageChrome::for_staff("Permission Requests", &staff),
        requests: requests.iter().map(PermissionRow::from).collect(),
    })
}

pub async fn approve_request(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    require_reviewer(&staff)?;
    let token = state.auth.token_for(&session, &mut staff).await?;
    let request = permissions::approve(state.backend.as_ref(), &token, &id).await?;

    tracing::info!(request_id = %id, reviewer = %staff.user_id, "Request approved");
    Ok(notices_response(
        StatusCode::OK,
        vec![Notice::success(format!(
            "Approved: {} {}.",
            request.action.as_str(),
            request.resource
        ))],
    ))
}

pub async fn reject_request(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    require_reviewer(&staff)?;
    let token = state.auth.token_for(&session, &mut staff).await?;
    permissions::reject(state.backend.as_ref(), &token, &id).await?;

    tracing::info!(request_id = %id, reviewer = %staff.user_id, "Request rejected");
    Ok(notices_response(
        StatusCode::OK,
        vec![Notice::info("Request rejected.")],
    ))
}
