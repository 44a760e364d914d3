use crate::error::AppError;
use crate::handlers::PageChrome;
use crate::session::StaffSession;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use billing_core::roles::{panels_for, Panel};

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub chrome: PageChrome,
    pub greeting: String,
    pub department: &'static str,
    pub open_draft: Option<String>,
}

#[derive(Template)]
#[template(path = "panel.html")]
pub struct PanelTemplate {
    pub chrome: PageChrome,
    pub heading: &'static str,
}

pub async fn dashboard_handler(
    State(state): State<AppState>,
    staff: StaffSession,
) -> Result<impl IntoResponse, AppError> {
    let open_draft = state.drafts.snapshot(&staff.user_id).await.map(|d| {
        format!(
            "{} against {} ({} unsaved)",
            d.note.display_number(),
            d.credit_bill.invoice_number,
            d.pending_count()
        )
    });

    Ok(DashboardTemplate {
        chrome: PageChrome::for_staff("Dashboard", &staff),
        greeting: format!("Welcome, {}", staff.display_name()),
        department: staff.department.as_str(),
        open_draft,
    })
}

/// Department panels. Only panels the user's role and department allow can
/// be opened.
pub async fn panel_handler(
    staff: StaffSession,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let panel = panels_for(staff.role, staff.department)
        .into_iter()
        .find(|p| p.path() == format!("/panels/{}", name))
        .ok_or_else(|| AppError::Forbidden(format!("panel '{}'", name)))?;

    Ok(PanelTemplate {
        chrome: PageChrome::for_staff(panel.title(), &staff),
        heading: panel_heading(panel),
    })
}

fn panel_heading(panel: Panel) -> &'static str {
    match panel {
        Panel::Accounts => "Ledgers, receivables and bank reconciliation",
        Panel::Hr => "Staff records and payroll",
        Panel::Marketing => "Campaigns and customer outreach",
        Panel::Purchase => "Suppliers and purchase orders",
        Panel::Settings => "Company profile and access control",
        _ => "",
    }
}
