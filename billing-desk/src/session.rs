//! Per-user state: who is signed in, held in the cookie session, and the
//! debit note they are working on, held in a [`DraftStore`].

use crate::error::AppError;
use crate::services::debit_notes::DebitNoteDraft;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use billing_core::roles::{Department, Role};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_sessions::Session;

const STAFF_KEY: &str = "staff";

/// The signed-in user, created at login and removed at logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSession {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub department: Department,
    pub id_token: String,
    pub refresh_token: Option<String>,
}

impl StaffSession {
    /// Store `staff` under a fresh session id.
    pub async fn begin(session: &Session, staff: &StaffSession) -> Result<(), AppError> {
        session.cycle_id().await?;
        session.insert(STAFF_KEY, staff).await?;
        Ok(())
    }

    /// Drop the cookie session. The caller forgets the user's draft.
    pub async fn end(session: &Session) -> Result<(), AppError> {
        session.flush().await?;
        Ok(())
    }

    pub async fn current(session: &Session) -> Result<Option<StaffSession>, AppError> {
        Ok(session.get::<StaffSession>(STAFF_KEY).await?)
    }

    /// Replace the stored ID token after a refresh.
    pub async fn update_token(&mut self, session: &Session, id_token: String) -> Result<(), AppError> {
        self.id_token = id_token;
        session.insert(STAFF_KEY, &*self).await?;
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or("User"))
    }

    pub fn can_write(&self) -> bool {
        self.role.can_write()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffSession
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract session",
                )
                    .into_response()
            })?;

        match StaffSession::current(&session).await {
            Ok(Some(staff)) => Ok(staff),
            Ok(None) => Err(Redirect::to("/login").into_response()),
            Err(e) => {
                tracing::error!("Failed to read session: {}", e);
                Err(Redirect::to("/login").into_response())
            }
        }
    }
}

/// Exclusive access to one user's draft, held until dropped.
pub type DraftSlot = OwnedMutexGuard<Option<DebitNoteDraft>>;

/// Debit note drafts, one per signed-in user.
///
/// A handler that changes a draft holds the user's slot from reading it to
/// writing it back, backend calls included. Overlapping requests from the
/// same user therefore apply one after another, each on top of the last.
#[derive(Default)]
pub struct DraftStore {
    slots: DashMap<String, Arc<Mutex<Option<DebitNoteDraft>>>>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the user's slot; concurrent holders queue in arrival order.
    pub async fn lock(&self, user_id: &str) -> DraftSlot {
        let slot = self
            .slots
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone();
        slot.lock_owned().await
    }

    /// A copy of the user's draft once no change to it is in progress.
    pub async fn snapshot(&self, user_id: &str) -> Option<DebitNoteDraft> {
        self.lock(user_id).await.clone()
    }

    /// Like [`snapshot`](Self::snapshot), but `NotFound` without a draft.
    pub async fn current(&self, user_id: &str) -> Result<DebitNoteDraft, AppError> {
        self.snapshot(user_id)
            .await
            .ok_or_else(|| AppError::NotFound("Open debit note".to_string()))
    }

    pub fn forget(&self, user_id: &str) {
        self.slots.remove(user_id);
    }
}

/// The slot's draft, or `NotFound` when no credit bill has been selected.
pub fn require_draft(slot: &mut DraftSlot) -> Result<&mut DebitNoteDraft, AppError> {
    Option::as_mut(&mut **slot).ok_or_else(|| AppError::NotFound("Open debit note".to_string()))
}
