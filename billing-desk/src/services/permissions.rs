//! Role-gated writes.
//!
//! Admins write straight to the backend. Everyone else files a permission
//! request carrying the body the write would have sent; an admin applies it
//! later from the review queue.

use crate::error::AppError;
use crate::services::backend_client::{BackendClient, Resource};
use crate::session::StaffSession;
use async_trait::async_trait;
use billing_core::models::{PermissionAction, PermissionRequest, RequestStatus};
use billing_core::normalize::{self, RecordRef};
use serde_json::{json, Value};

/// The verbs used by gated operations.
#[async_trait]
pub trait WriteGateway: Send + Sync {
    async fn fetch(&self, token: &str, resource: Resource, id: &str) -> Result<Value, AppError>;

    async fn create(&self, token: &str, resource: Resource, body: &Value) -> Result<Value, AppError>;

    async fn update(
        &self,
        token: &str,
        resource: Resource,
        id: &str,
        body: &Value,
    ) -> Result<Value, AppError>;

    async fn delete(&self, token: &str, resource: Resource, id: &str) -> Result<(), AppError>;
}

#[async_trait]
impl WriteGateway for BackendClient {
    async fn fetch(&self, token: &str, resource: Resource, id: &str) -> Result<Value, AppError> {
        BackendClient::get(self, token, resource, id).await
    }

    async fn create(&self, token: &str, resource: Resource, body: &Value) -> Result<Value, AppError> {
        BackendClient::create(self, token, resource, body).await
    }

    async fn update(
        &self,
        token: &str,
        resource: Resource,
        id: &str,
        body: &Value,
    ) -> Result<Value, AppError> {
        BackendClient::update(self, token, resource, id, body).await
    }

    async fn delete(&self, token: &str, resource: Resource, id: &str) -> Result<(), AppError> {
        BackendClient::delete(self, token, resource, id).await
    }
}

/// A write someone wants to make.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteIntent {
    pub action: PermissionAction,
    pub resource: Resource,
    pub resource_id: Option<String>,
    pub payload: Value,
}

impl WriteIntent {
    pub fn create(resource: Resource, payload: Value) -> Self {
        Self {
            action: PermissionAction::Create,
            resource,
            resource_id: None,
            payload,
        }
    }

    pub fn edit(resource: Resource, id: impl Into<String>, payload: Value) -> Self {
        Self {
            action: PermissionAction::Edit,
            resource,
            resource_id: Some(id.into()),
            payload,
        }
    }

    pub fn cancel(resource: Resource, id: impl Into<String>) -> Self {
        Self {
            action: PermissionAction::Cancel,
            resource,
            resource_id: Some(id.into()),
            payload: json!({ "cancelled": true, "status": "cancelled" }),
        }
    }

    fn target_id(&self) -> Result<&str, AppError> {
        self.resource_id.as_deref().ok_or_else(|| {
            AppError::Validation(vec![format!(
                "{} of {} needs a record id",
                self.action.as_str(),
                self.resource.as_str()
            )])
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The backend applied the write. Creates and edits report the record.
    Applied(Option<RecordRef>),
    /// A permission request was filed instead.
    AwaitingApproval { request_id: String },
}

/// Perform `intent` directly, or file a permission request when `staff`
/// may not write.
pub async fn submit(
    gateway: &dyn WriteGateway,
    token: &str,
    staff: &StaffSession,
    intent: WriteIntent,
) -> Result<WriteOutcome, AppError> {
    if staff.can_write() {
        return apply(gateway, token, &intent).await.map(WriteOutcome::Applied);
    }

    let request = PermissionRequest {
        id: None,
        action: intent.action,
        resource: intent.resource.as_str().to_string(),
        resource_id: intent.resource_id.clone(),
        requested_by: staff.user_id.clone(),
        department: staff.department.as_str().to_string(),
        payload: intent.payload,
        status: RequestStatus::Pending,
    };
    let body = serde_json::to_value(&request)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode permission request: {}", e)))?;

    let value = gateway
        .create(token, Resource::PermissionRequests, &body)
        .await?;
    let filed = normalize::record_ref(&value)?;

    tracing::info!(
        request_id = %filed.id,
        user_id = %staff.user_id,
        action = request.action.as_str(),
        resource = %request.resource,
        "Permission request filed"
    );

    Ok(WriteOutcome::AwaitingApproval {
        request_id: filed.id,
    })
}

/// Perform `intent` against the backend unconditionally.
pub async fn apply(
    gateway: &dyn WriteGateway,
    token: &str,
    intent: &WriteIntent,
) -> Result<Option<RecordRef>, AppError> {
    match intent.action {
        PermissionAction::Create => {
            let value = gateway.create(token, intent.resource, &intent.payload).await?;
            Ok(Some(normalize::record_ref(&value)?))
        }
        PermissionAction::Edit => {
            let id = intent.target_id()?;
            let value = gateway.update(token, intent.resource, id, &intent.payload).await?;
            // Updates may answer with an empty body; the id is already known.
            Ok(Some(normalize::record_ref(&value).unwrap_or_else(|_| RecordRef {
                id: id.to_string(),
                invoice_number: None,
            })))
        }
        PermissionAction::Cancel => {
            let id = intent.target_id()?;
            gateway.update(token, intent.resource, id, &intent.payload).await?;
            Ok(None)
        }
        PermissionAction::Delete => {
            let id = intent.target_id()?;
            gateway.delete(token, intent.resource, id).await?;
            Ok(None)
        }
    }
}

async fn load_request(
    gateway: &dyn WriteGateway,
    token: &str,
    request_id: &str,
) -> Result<PermissionRequest, AppError> {
    let value = gateway
        .fetch(token, Resource::PermissionRequests, request_id)
        .await?;
    Ok(normalize::permission_request(&value)?)
}

async fn set_status(
    gateway: &dyn WriteGateway,
    token: &str,
    request_id: &str,
    status: RequestStatus,
) -> Result<(), AppError> {
    gateway
        .update(
            token,
            Resource::PermissionRequests,
            request_id,
            &json!({ "status": status.as_str() }),
        )
        .await?;
    Ok(())
}

fn ensure_pending(request: &PermissionRequest, request_id: &str) -> Result<(), AppError> {
    if request.status == RequestStatus::Pending {
        return Ok(());
    }
    Err(AppError::Validation(vec![format!(
        "Request {} is already {}",
        request_id,
        request.status.as_str()
    )]))
}

/// Replace the payload of `request_id` if it is still pending.
///
/// Returns the status the request had; settled requests are left alone.
pub async fn revise(
    gateway: &dyn WriteGateway,
    token: &str,
    request_id: &str,
    payload: &Value,
) -> Result<RequestStatus, AppError> {
    let request = load_request(gateway, token, request_id).await?;
    if request.status == RequestStatus::Pending {
        gateway
            .update(
                token,
                Resource::PermissionRequests,
                request_id,
                &json!({ "payload": payload }),
            )
            .await?;
        tracing::info!(request_id = %request_id, "Permission request revised");
    }
    Ok(request.status)
}

/// Mark a pending request approved, then apply its write.
///
/// The request is claimed before the write so it cannot be applied twice.
/// If the write fails the request is put back to pending.
pub async fn approve(
    gateway: &dyn WriteGateway,
    token: &str,
    request_id: &str,
) -> Result<PermissionRequest, AppError> {
    let mut request = load_request(gateway, token, request_id).await?;
    ensure_pending(&request, request_id)?;

    let resource = Resource::from_string(&request.resource).ok_or_else(|| {
        AppError::Validation(vec![format!("Unknown resource '{}'", request.resource)])
    })?;
    let intent = WriteIntent {
        action: request.action,
        resource,
        resource_id: request.resource_id.clone(),
        payload: request.payload.clone(),
    };

    set_status(gateway, token, request_id, RequestStatus::Approved).await?;
    if let Err(error) = apply(gateway, token, &intent).await {
        tracing::warn!(request_id = %request_id, "Approved request could not be applied: {}", error);
        if let Err(reopen) = set_status(gateway, token, request_id, RequestStatus::Pending).await {
            tracing::error!(
                request_id = %request_id,
                "Failed to reopen permission request: {}",
                reopen
            );
        }
        return Err(error);
    }
    request.status = RequestStatus::Approved;

    tracing::info!(request_id = %request_id, "Permission request approved and applied");
    Ok(request)
}

pub async fn reject(gateway: &dyn WriteGateway, token: &str, request_id: &str) -> Result<(), AppError> {
    let request = load_request(gateway, token, request_id).await?;
    ensure_pending(&request, request_id)?;

    set_status(gateway, token, request_id, RequestStatus::Rejected).await?;
    tracing::info!(request_id = %request_id, "Permission request rejected");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::{staff, stored_request, RecordingGateway};
    use super::*;
    use billing_core::roles::Role;

    #[tokio::test]
    async fn admins_write_directly() {
        let gateway = RecordingGateway::answering(json!({ "id": "c-9" }));
        let outcome = submit(
            &gateway,
            "token",
            &staff(Role::Admin),
            WriteIntent::create(Resource::Customers, json!({ "name": "Malabar Mart" })),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            WriteOutcome::Applied(Some(RecordRef {
                id: "c-9".to_string(),
                invoice_number: None
            }))
        );
        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Resource::Customers);
    }

    #[tokio::test]
    async fn staff_writes_become_permission_requests() {
        let gateway = RecordingGateway::answering(json!({ "_id": "pr-1" }));
        let outcome = submit(
            &gateway,
            "token",
            &staff(Role::Staff),
            WriteIntent::cancel(Resource::DebitNotes, "dn-1"),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            WriteOutcome::AwaitingApproval {
                request_id: "pr-1".to_string()
            }
        );
        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Resource::PermissionRequests);
        assert_eq!(calls[0].2["action"], "cancel");
        assert_eq!(calls[0].2["resourceId"], "dn-1");
        assert_eq!(calls[0].2["requestedBy"], "u-7");
        assert_eq!(calls[0].2["status"], "pending");
    }

    #[tokio::test]
    async fn edits_without_an_id_are_rejected_before_any_call() {
        let gateway = RecordingGateway::answering(Value::Null);
        let intent = WriteIntent {
            action: PermissionAction::Edit,
            resource: Resource::DebitNotes,
            resource_id: None,
            payload: Value::Null,
        };

        let result = apply(&gateway, "token", &intent).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_update_response_keeps_the_known_id() {
        let gateway = RecordingGateway::answering(Value::Null);
        let saved = apply(
            &gateway,
            "token",
            &WriteIntent::edit(Resource::DebitNotes, "dn-4", json!({})),
        )
        .await
        .unwrap();
        assert_eq!(saved.map(|r| r.id).as_deref(), Some("dn-4"));
    }

    fn upstream() -> AppError {
        AppError::Upstream("backend returned 500".to_string())
    }

    #[tokio::test]
    async fn approval_claims_the_request_before_applying_it() {
        let gateway = RecordingGateway::answering(json!({ "id": "c-9" }))
            .storing(stored_request("pending", json!({ "name": "Malabar Mart" })));

        let request = approve(&gateway, "token", "pr-3").await.unwrap();
        assert_eq!(request.status, RequestStatus::Approved);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, Resource::PermissionRequests);
        assert_eq!(calls[0].2, json!({ "status": "approved" }));
        assert_eq!(calls[1].1, Resource::Customers);
        assert_eq!(calls[1].2["name"], "Malabar Mart");
    }

    #[tokio::test]
    async fn failed_status_update_applies_nothing() {
        let gateway = RecordingGateway::failing_on(Resource::PermissionRequests, upstream)
            .storing(stored_request("pending", json!({ "name": "Malabar Mart" })));

        let result = approve(&gateway, "token", "pr-3").await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert!(gateway
            .calls()
            .iter()
            .all(|(_, resource, _)| *resource == Resource::PermissionRequests));
    }

    #[tokio::test]
    async fn failed_apply_reopens_the_request() {
        let gateway = RecordingGateway::failing_on(Resource::Customers, upstream)
            .storing(stored_request("pending", json!({ "name": "Malabar Mart" })));

        let result = approve(&gateway, "token", "pr-3").await;
        assert!(matches!(result, Err(AppError::Upstream(_))));

        let statuses: Vec<Value> = gateway
            .calls()
            .into_iter()
            .filter(|(_, resource, _)| *resource == Resource::PermissionRequests)
            .map(|(_, _, body)| body["status"].clone())
            .collect();
        assert_eq!(statuses, vec![json!("approved"), json!("pending")]);
    }

    #[tokio::test]
    async fn settled_requests_cannot_be_rejected() {
        for status in ["approved", "rejected"] {
            let gateway = RecordingGateway::answering(Value::Null)
                .storing(stored_request(status, Value::Null));

            let result = reject(&gateway, "token", "pr-3").await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{status}");
            assert!(gateway.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn revising_replaces_a_pending_payload_only() {
        let gateway = RecordingGateway::answering(Value::Null);
        let status = revise(&gateway, "token", "pr-3", &json!({ "installments": [] }))
            .await
            .unwrap();
        assert_eq!(status, RequestStatus::Pending);
        assert_eq!(
            gateway.calls()[0].2,
            json!({ "payload": { "installments": [] } })
        );

        let gateway = RecordingGateway::answering(Value::Null)
            .storing(stored_request("approved", Value::Null));
        let status = revise(&gateway, "token", "pr-3", &json!({})).await.unwrap();
        assert_eq!(status, RequestStatus::Approved);
        assert!(gateway.calls().is_empty());
    }
}
