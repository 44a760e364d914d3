use crate::error::AppError;
use crate::handlers::{notices_response, PageChrome};
use crate::models::CustomerRow;
use crate::notice::Notice;
use crate::scope::RequestScope;
use crate::services::backend_client::Resource;
use crate::services::permissions::{submit, WriteIntent, WriteOutcome};
use crate::session::StaffSession;
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use billing_core::validation::NewCustomer;
use serde::Deserialize;
use tower_sessions::Session;
use validator::Validate;

#[derive(Template)]
#[template(path = "customers.html")]
pub struct CustomersTemplate {
    pub chrome: PageChrome,
    pub customers: Vec<CustomerRow>,
    pub can_write: bool,
}

#[derive(Debug, Deserialize)]
pub struct CustomerForm {
    pub name: String,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
}

impl CustomerForm {
    fn into_customer(self) -> NewCustomer {
        NewCustomer::from_form(
            &self.name,
            self.gstin.as_deref(),
            self.email.as_deref(),
            self.phone.as_deref(),
            self.address.as_deref(),
            self.state.as_deref(),
            self.pincode.as_deref(),
        )
    }
}

pub async fn list_customers(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    scope: RequestScope,
) -> Result<impl IntoResponse, AppError> {
    let token = state.auth.token_for(&session, &mut staff).await?;
    let customers = scope.run(state.backend.customers(&token)).await?;

    Ok(CustomersTemplate {
        chrome: PageChrome::for_staff("Customers", &staff),
        customers: customers.iter().map(CustomerRow::from).collect(),
        can_write: staff.can_write(),
    })
}

/// Validate and create a customer. An invalid form never reaches the
/// backend.
pub async fn create_customer(
    State(state): State<AppState>,
    session: Session,
    mut staff: StaffSession,
    Form(form): Form<CustomerForm>,
) -> Result<Response, AppError> {
    let customer = form.into_customer();
    if let Err(errors) = customer.validate() {
        tracing::debug!(user_id = %staff.user_id, "Customer form rejected");
        return Err(errors.into());
    }

    let token = state.auth.token_for(&session, &mut staff).await?;
    let payload = serde_json::to_value(&customer)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode customer: {}", e)))?;

    let notice = match submit(
        state.backend.as_ref(),
        &token,
        &staff,
        WriteIntent::create(Resource::Customers, payload),
    )
    .await?
    {
        WriteOutcome::Applied(_) => {
            tracing::info!(user_id = %staff.user_id, name = %customer.name, "Customer created");
            Notice::success(format!("Customer {} created.", customer.name))
        }
        WriteOutcome::AwaitingApproval { .. } => Notice::info(format!(
            "Customer {} sent to an admin for approval.",
            customer.name
        ))
        .durable(),
    };

    Ok(notices_response(StatusCode::CREATED, vec![notice]))
}
