//! The debit note workspace: choosing a credit bill, recording
//! installments, saving and cancelling.

use crate::error::AppError;
use crate::handlers::{hx_redirect, notices_response, today, PageChrome};
use crate::models::{format_date, BalanceView, HistoryRow, InstallmentRow};
use crate::notice::Notice;
use crate::scope::RequestScope;
use crate::services::backend_client::Resource;
use crate::services::debit_notes::{self, DebitNoteDraft, Selection};
use crate::services::permissions::{submit, WriteIntent, WriteOutcome};
use crate::services::reconciliation::reconcile;
use crate::session::{require_draft, StaffSession};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use billing_core::ledger::assemble_history;
use billing_core::models::PaymentHistoryEntry;
use billing_core::normalize::parse_date;
use serde::Deserialize;
use tower_sessions::Session;

/// The installment table, payment history and balance of a draft.
#[derive(Debug, Clone)]
pub struct LedgerView {
    pub installments: Vec<InstallmentRow>,
    pub history: Vec<HistoryRow>,
    pub balance: BalanceView,
    pub pending: usize,
    pub unsaved: bool,
    pub cancelled: bool,
    pub approval_request: Option<String>,
}

impl LedgerView {
    fn new(draft: &DebitNoteDraft, history: &[PaymentHistoryEntry]) -> Self {
        Self {
            installments: InstallmentRow::rows(draft.note.installments()),
            history: history.iter().map(HistoryRow::from).collect(),
            balance: draft.note.balance().into(),
            pending: draft.pending_count(),
            unsaved: draft.has_unsaved_changes(),
            cancelled: draft.note.cancelled,
            approval_request: draft.approval.as_ref().map(|t| t.request_id.clone()),
        }
    }
}

#[derive(Template)]
#[template(path = "debit_note.html")]
pub struct DebitNoteTemplate {
    pub chrome: PageChrome,
    pub number: String,
    pub credit_bill_id: String,
    pub credit_bill_number: String,
    pub customer_name: String,
    pub date: String,
    pub due_date: String,
    pub today: String,
    pub persisted_id: Option<String>,
    pub can_write: bool,
    pub ledger: LedgerView,
}

/// The ledger panel re-rendered after a change, with notices swapped into
/// the notice area out of band.
#[derive(Template)]
#[template(path = "fragments/ledger_update.html")]
pub struct LedgerUpdate {
    pub ledger: LedgerView,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Deserialize)]
pub struct SelectBillForm {
    pub credit_bill_id: String,
    #[serde(default)]
    pub discard: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscardForm {
    #[serde(default)]
    pub discard: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InstallmentForm {
    pub amount: String,
    #[serde(default)]
    pub date: Option<String>,
}

fn wants_discard(flag: Option<&str>) -> bool {
    matches!(flag, Some("on" | "true" | "1"))
}

/// A warning when switching away from `current` would lose work.
fn unsaved_guard(current: Option<&DebitNoteDraft>, discard: bool) -> Option<Response> {
    let draft = current.filter(|d| d.has_unsaved_changes())?;
    if discard {
        tracing::info!(
            credit_bill_id = %draft.credit_bill.id,
            pending = draft.pending_count(),
            "Discarding unsaved debit note draft"
        );
        return None;
    }

    Some(notices_response(
        StatusCode::CONFLICT,
        vec![Notice::warning(format!(
            "Debit note {} for credit bill {} has unsaved changes. Save it first, or choose again with discard selected.",
            draft.note.display_number(),
            draft.credit_bill.invoice_number
        ))],
    ))
}

/// Choose a credit bill and open a new debit note against it.
pub async fn select_credit_bill(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
    Form(form): Form<SelectBillForm>,
) -> Result<Response, AppError> {
    let mut slot = state.drafts.lock(&staff.user_id).await;
    if let Some(warning) = unsaved_guard((*slot).as_ref(), wants_discard(form.discard.as_deref())) {
        return Ok(warning);
    }

    let token = state.auth.token_for(&session, &mut staff).await?;
    let selection = debit_notes::open_for_bill(
        &state.backend,
        &scope,
        &token,
        form.credit_bill_id.trim(),
        today(),
        state.settings.documents.payment_terms_days,
    )
    .await?;

    match selection {
        Selection::Opened(draft) => {
            *slot = Some(draft);
            Ok(hx_redirect("/debit-notes/draft"))
        }
        Selection::NothingOwed(notice) => Ok(notices_response(StatusCode::OK, vec![notice])),
    }
}

/// Load a stored debit note into the workspace for more installments.
pub async fn edit_debit_note(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
    Path(id): Path<String>,
    Form(form): Form<DiscardForm>,
) -> Result<Response, AppError> {
    let mut slot = state.drafts.lock(&staff.user_id).await;
    let same_note = (*slot)
        .as_ref()
        .is_some_and(|d| d.note.id.as_deref() == Some(id.as_str()));
    if !same_note {
        if let Some(warning) =
            unsaved_guard((*slot).as_ref(), wants_discard(form.discard.as_deref()))
        {
            return Ok(warning);
        }
        let token = state.auth.token_for(&session, &mut staff).await?;
        let draft = debit_notes::open_existing(&state.backend, &scope, &token, &id).await?;
        *slot = Some(draft);
    }

    Ok(hx_redirect("/debit-notes/draft"))
}

pub async fn show_draft(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
) -> Result<Response, AppError> {
    let Some(draft) = state.drafts.snapshot(&staff.user_id).await else {
        return Ok(Redirect::to("/credit-bills").into_response());
    };
    let token = state.auth.token_for(&session, &mut staff).await?;

    let customer_id = draft.credit_bill.customer_id.clone();
    let (customer, history) = tokio::try_join!(
        scope.run(async {
            // The bill carries a name to fall back on.
            Ok(state.backend.customer(&token, &customer_id).await.ok())
        }),
        debit_notes::history(&state.backend, &scope, &token, &draft),
    )?;

    let customer_name = customer
        .map(|c| c.name)
        .or_else(|| draft.credit_bill.customer_name.clone())
        .unwrap_or_else(|| customer_id.clone());

    Ok(DebitNoteTemplate {
        chrome: PageChrome::for_staff(format!("Debit Note {}", draft.note.display_number()), &staff),
        number: draft.note.display_number().to_string(),
        credit_bill_id: draft.credit_bill.id.clone(),
        credit_bill_number: draft.credit_bill.invoice_number.clone(),
        customer_name,
        date: format_date(draft.note.date),
        due_date: format_date(draft.note.due_date),
        today: today().format("%Y-%m-%d").to_string(),
        persisted_id: draft.note.id.clone(),
        can_write: staff.can_write(),
        ledger: LedgerView::new(&draft, &history),
    }
    .into_response())
}

/// Re-render the ledger panel. A failed history fetch degrades to the
/// draft's own entries with a warning.
async fn ledger_update(
    state: &AppState,
    scope: &RequestScope,
    token: &str,
    draft: &DebitNoteDraft,
    mut notices: Vec<Notice>,
) -> LedgerUpdate {
    let history = match debit_notes::history(&state.backend, scope, token, draft).await {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(credit_bill_id = %draft.credit_bill.id, "History refresh failed: {}", e);
            notices.push(Notice::warning(
                "Payment history could not be refreshed. Showing this debit note only.",
            ));
            assemble_history(&draft.credit_bill, &[], Some(&draft.note))
        }
    };

    if draft.pending_count() > 0 {
        notices.push(
            Notice::warning(format!(
                "{} installment(s) not yet saved.",
                draft.pending_count()
            ))
            .durable(),
        );
    }

    LedgerUpdate {
        ledger: LedgerView::new(draft, &history),
        notices,
    }
}

pub async fn add_installment(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
    Form(form): Form<InstallmentForm>,
) -> Result<LedgerUpdate, AppError> {
    let date = match form.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => parse_date(raw)
            .ok_or_else(|| AppError::Validation(vec![format!("date: '{}' is not a valid date", raw)]))?,
        None => today(),
    };

    let mut slot = state.drafts.lock(&staff.user_id).await;
    let notices = debit_notes::add_installment(require_draft(&mut slot)?, &form.amount, date)?;
    let draft = require_draft(&mut slot)?.clone();
    drop(slot);

    let token = state.auth.token_for(&session, &mut staff).await?;
    Ok(ledger_update(&state, &scope, &token, &draft, notices).await)
}

pub async fn remove_installment(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
    Path(index): Path<usize>,
) -> Result<LedgerUpdate, AppError> {
    let mut slot = state.drafts.lock(&staff.user_id).await;
    let notice = debit_notes::remove_installment(require_draft(&mut slot)?, index)?;
    let draft = require_draft(&mut slot)?.clone();
    drop(slot);

    let token = state.auth.token_for(&session, &mut staff).await?;
    Ok(ledger_update(&state, &scope, &token, &draft, vec![notice]).await)
}

/// Flush the draft's unsaved installments, or request approval to.
///
/// The draft stays locked until the backend has answered, so a second save
/// finds the first one's result and an installment added meanwhile lands
/// on the saved note.
pub async fn save_draft(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
) -> Result<LedgerUpdate, AppError> {
    let mut slot = state.drafts.lock(&staff.user_id).await;
    let draft = require_draft(&mut slot)?;
    let token = state.auth.token_for(&session, &mut staff).await?;

    let outcome = scope
        .run(reconcile(state.backend.as_ref(), &token, &staff, draft))
        .await?;
    let draft = draft.clone();
    drop(slot);

    Ok(ledger_update(&state, &scope, &token, &draft, vec![outcome.notice()]).await)
}

pub async fn discard_draft(
    State(state): State<AppState>,
    staff: StaffSession,
) -> Result<Response, AppError> {
    let mut slot = state.drafts.lock(&staff.user_id).await;
    if let Some(draft) = slot.take() {
        tracing::info!(
            user_id = %staff.user_id,
            credit_bill_id = %draft.credit_bill.id,
            pending = draft.pending_count(),
            "Debit note draft discarded"
        );
    }
    Ok(hx_redirect("/credit-bills"))
}

/// Cancel a stored debit note. Staff file a permission request instead.
pub async fn cancel_debit_note(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let token = state.auth.token_for(&session, &mut staff).await?;
    let outcome = submit(
        state.backend.as_ref(),
        &token,
        &staff,
        WriteIntent::cancel(Resource::DebitNotes, id.as_str()),
    )
    .await?;

    let notice = match outcome {
        WriteOutcome::Applied(_) => {
            let mut slot = state.drafts.lock(&staff.user_id).await;
            if let Some(draft) = (*slot).as_mut() {
                if draft.note.id.as_deref() == Some(id.as_str()) {
                    draft.note.cancelled = true;
                }
            }
            tracing::info!(debit_note_id = %id, user_id = %staff.user_id, "Debit note cancelled");
            Notice::success("Debit note cancelled. Its payments no longer count towards the bill.")
        }
        WriteOutcome::AwaitingApproval { .. } => {
            Notice::info("Cancellation sent to an admin for approval.").durable()
        }
    };

    Ok(notices_response(StatusCode::OK, vec![notice]))
}
