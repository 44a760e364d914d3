//! Permission requests: the pending-approval records posted when a user
//! without write access attempts a write.

use serde::{Deserialize, Serialize};

/// The write a user asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    Create,
    Edit,
    Delete,
    Cancel,
}

impl PermissionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::Create => "create",
            PermissionAction::Edit => "edit",
            PermissionAction::Delete => "delete",
            PermissionAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn from_string(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "approved" => RequestStatus::Approved,
            "rejected" | "denied" => RequestStatus::Rejected,
            _ => RequestStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

/// A request for an admin to approve a write on the requester's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action: PermissionAction,
    /// Backend resource the write targets, e.g. `debitnotes`.
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub requested_by: String,
    pub department: String,
    /// The body the write would have sent.
    pub payload: serde_json::Value,
    pub status: RequestStatus,
}
