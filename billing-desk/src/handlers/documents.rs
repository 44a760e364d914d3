use crate::error::AppError;
use crate::handlers::notices_response;
use crate::notice::Notice;
use crate::scope::RequestScope;
use crate::services::debit_notes::{self, DebitNoteDraft};
use crate::services::mailer::{EmailAttachment, OutgoingEmail};
use crate::services::metrics::record_document;
use crate::services::renderer::{render_html, render_pdf_scoped, CompanyHeader, DebitNoteDocument};
use crate::session::StaffSession;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct EmailForm {
    #[validate(email(message = "Invalid email address"))]
    pub to: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Gather customer, bank and history for the draft's document.
async fn build_document(
    state: &AppState,
    scope: &RequestScope,
    token: &str,
    draft: &DebitNoteDraft,
) -> Result<DebitNoteDocument, AppError> {
    let customer_id = draft.credit_bill.customer_id.as_str();
    let (customer, bank, history) = tokio::try_join!(
        scope.run(async { Ok(state.backend.customer(token, customer_id).await.ok()) }),
        scope.run(state.backend.bank_details(token)),
        debit_notes::history(&state.backend, scope, token, draft),
    )?;

    Ok(DebitNoteDocument::build(
        CompanyHeader::from(&state.settings.documents),
        draft,
        customer.as_ref(),
        bank,
        &history,
    ))
}

fn pdf_response(bytes: Vec<u8>, filename: &str, disposition: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("{}; filename=\"{}\"", disposition, filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub async fn preview(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
) -> Result<Html<String>, AppError> {
    let draft = state.drafts.current(&staff.user_id).await?;
    let token = state.auth.token_for(&session, &mut staff).await?;
    let doc = build_document(&state, &scope, &token, &draft).await?;
    Ok(Html(render_html(&doc)?))
}

pub async fn download_pdf(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
) -> Result<Response, AppError> {
    let draft = state.drafts.current(&staff.user_id).await?;
    let token = state.auth.token_for(&session, &mut staff).await?;
    let doc = build_document(&state, &scope, &token, &draft).await?;

    let filename = doc.filename();
    let bytes = render_pdf_scoped(&scope, doc, state.settings.documents.generation_timeout()).await?;
    tracing::info!(user_id = %staff.user_id, filename = %filename, size = bytes.len(), "Debit note PDF generated");
    Ok(pdf_response(bytes, &filename, "attachment"))
}

/// The backend's own rendition of a stored note, opened inline for
/// printing.
pub async fn print(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let token = state.auth.token_for(&session, &mut staff).await?;
    let result = scope
        .run_with_timeout(
            "Printing",
            state.settings.documents.generation_timeout(),
            state.backend.print_pdf(&token, &id),
        )
        .await;
    record_document("print", if result.is_ok() { "ok" } else { "failed" });

    Ok(pdf_response(result?, &format!("DebitNote-{}.pdf", id), "inline"))
}

pub async fn email(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
    Form(mut form): Form<EmailForm>,
) -> Result<Response, AppError> {
    form.to = form.to.trim().to_string();
    form.validate()?;
    let draft = state.drafts.current(&staff.user_id).await?;
    let token = state.auth.token_for(&session, &mut staff).await?;
    let doc = build_document(&state, &scope, &token, &draft).await?;

    let to = form.to;
    let subject = doc.email_subject();
    let body_text = doc.email_body(form.message.as_deref());
    let filename = doc.filename();
    let bytes = render_pdf_scoped(&scope, doc, state.settings.documents.generation_timeout()).await?;

    let email = OutgoingEmail {
        to: to.clone(),
        subject,
        body_text,
        attachment: Some(EmailAttachment {
            filename,
            content_type: "application/pdf".to_string(),
            bytes,
        }),
    };

    let result = scope
        .run_with_timeout(
            "Sending email",
            state.settings.documents.email_timeout(),
            state.mailer.send(&email),
        )
        .await;
    record_document("email", if result.is_ok() { "ok" } else { "failed" });
    result?;

    tracing::info!(user_id = %staff.user_id, to = %to, "Debit note emailed");
    Ok(notices_response(
        StatusCode::OK,
        vec![Notice::success(format!("Debit note sent to {}.", to))],
    ))
}
