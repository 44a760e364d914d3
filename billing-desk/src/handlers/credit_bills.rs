use crate::error::AppError;
use crate::handlers::PageChrome;
use crate::models::{CreditBillRow, DebitNoteRow, HistoryRow};
use crate::scope::RequestScope;
use crate::session::StaffSession;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use billing_core::ledger::{assemble_history, outstanding_balance};
use billing_core::money::format_money;
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "credit_bills.html")]
pub struct CreditBillsTemplate {
    pub chrome: PageChrome,
    pub bills: Vec<CreditBillRow>,
    pub outstanding_only: bool,
}

#[derive(Template)]
#[template(path = "credit_bill.html")]
pub struct CreditBillTemplate {
    pub chrome: PageChrome,
    pub bill: CreditBillRow,
    pub outstanding: String,
    pub notes: Vec<DebitNoteRow>,
    pub history: Vec<HistoryRow>,
    pub can_cancel: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillFilter {
    #[serde(default)]
    pub outstanding: Option<String>,
}

impl BillFilter {
    fn outstanding_only(&self) -> bool {
        matches!(self.outstanding.as_deref(), Some("on" | "true" | "1"))
    }
}

pub async fn list_credit_bills(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
    Query(filter): Query<BillFilter>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.auth.token_for(&session, &mut staff).await?;
    let (bills, customers) = tokio::try_join!(
        scope.run(state.backend.credit_bills(&token)),
        scope.run(state.backend.customers(&token)),
    )?;

    let outstanding_only = filter.outstanding_only();
    let bills = bills
        .iter()
        .filter(|b| !outstanding_only || b.has_outstanding_balance())
        .map(|b| CreditBillRow::new(b, &customers))
        .collect();

    Ok(CreditBillsTemplate {
        chrome: PageChrome::for_staff("Credit Bills", &staff),
        bills,
        outstanding_only,
    })
}

pub async fn show_credit_bill(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.auth.token_for(&session, &mut staff).await?;
    let (bill, notes) = tokio::try_join!(
        scope.run(state.backend.credit_bill(&token, &id)),
        scope.run(state.backend.debit_notes_for(&token, &id)),
    )?;

    let outstanding = format_money(outstanding_balance(&bill, &notes));
    let history = assemble_history(&bill, &notes, None);

    Ok(CreditBillTemplate {
        chrome: PageChrome::for_staff(format!("Credit Bill {}", bill.invoice_number), &staff),
        bill: CreditBillRow::new(&bill, &[]),
        outstanding,
        notes: notes.iter().map(DebitNoteRow::from).collect(),
        history: history.iter().map(HistoryRow::from).collect(),
        can_cancel: staff.can_write(),
    })
}
