pub mod app;
pub mod auth;
pub mod credit_bills;
pub mod customers;
pub mod dashboard;
pub mod debit_notes;
pub mod documents;
pub mod metrics;
pub mod permissions;

use crate::error::NoticesFragment;
use crate::models::NavLink;
use crate::notice::Notice;
use crate::session::StaffSession;
use askama::Template;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use billing_core::roles::panels_for;

/// Data every full page shares: title, navigation and who is signed in.
#[derive(Debug, Clone)]
pub struct PageChrome {
    pub title: String,
    pub nav: Vec<NavLink>,
    pub user_label: String,
    pub signed_in: bool,
}

impl PageChrome {
    pub fn for_staff(title: impl Into<String>, staff: &StaffSession) -> Self {
        Self {
            title: title.into(),
            nav: panels_for(staff.role, staff.department)
                .into_iter()
                .map(NavLink::from)
                .collect(),
            user_label: format!("{} ({})", staff.display_name(), staff.role.as_str()),
            signed_in: true,
        }
    }

    pub fn anonymous(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            nav: Vec::new(),
            user_label: String::new(),
            signed_in: false,
        }
    }
}

/// Render `notices` into the page's notice area.
pub fn notices_response(status: StatusCode, notices: Vec<Notice>) -> Response {
    let body = match (NoticesFragment { notices }).render() {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Failed to render notices: {}", e);
            String::new()
        }
    };

    let mut res = (status, Html(body)).into_response();
    res.headers_mut()
        .insert("HX-Retarget", HeaderValue::from_static("#notices"));
    res.headers_mut()
        .insert("HX-Reswap", HeaderValue::from_static("afterbegin"));
    res
}

/// Client-side navigation for htmx requests.
pub fn hx_redirect(path: &'static str) -> Response {
    let mut res = StatusCode::OK.into_response();
    res.headers_mut()
        .insert("HX-Redirect", HeaderValue::from_static(path));
    res
}

pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
