//! Flushing a draft's unsaved installments to the backend.
//!
//! The note is written whole: its payload carries every installment, so a
//! retry after a failure replaces the stored list rather than appending to
//! it. Installments only become saved once the backend accepted the note.

use crate::error::AppError;
use crate::notice::Notice;
use crate::services::backend_client::Resource;
use crate::services::debit_notes::{ApprovalTicket, DebitNoteDraft};
use crate::services::metrics::record_reconciliation;
use crate::services::permissions::{revise, submit, WriteGateway, WriteIntent, WriteOutcome};
use crate::session::StaffSession;
use billing_core::models::{PendingReason, RequestStatus};
use billing_core::LedgerError;

#[derive(Debug)]
pub enum ReconcileOutcome {
    NothingToSave,
    Saved { flushed: usize },
    AwaitingApproval { request_id: String, pending: usize },
    /// An approval request for exactly these installments is already open.
    AlreadyRequested { pending: usize },
    /// The open approval request now carries the current installments.
    RequestRevised { request_id: String, pending: usize },
    Failed { error: AppError, pending: usize },
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::NothingToSave => "noop",
            ReconcileOutcome::Saved { .. } => "saved",
            ReconcileOutcome::AwaitingApproval { .. } => "requested",
            ReconcileOutcome::AlreadyRequested { .. } => "already_requested",
            ReconcileOutcome::RequestRevised { .. } => "revised",
            ReconcileOutcome::Failed { .. } => "failed",
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            ReconcileOutcome::NothingToSave => Notice::info("Nothing to save."),
            ReconcileOutcome::Saved { flushed } => Notice::success(match flushed {
                0 => "Debit note saved.".to_string(),
                1 => "Debit note saved with 1 new installment.".to_string(),
                n => format!("Debit note saved with {} new installments.", n),
            }),
            ReconcileOutcome::AwaitingApproval { pending, .. } => Notice::info(format!(
                "Sent for approval. {} installment(s) are awaiting approval.",
                pending
            ))
            .durable(),
            ReconcileOutcome::AlreadyRequested { pending } => Notice::info(format!(
                "Approval already requested for {} installment(s).",
                pending
            )),
            ReconcileOutcome::RequestRevised { pending, .. } => Notice::info(format!(
                "Approval request updated. {} installment(s) are awaiting approval.",
                pending
            ))
            .durable(),
            ReconcileOutcome::Failed { error, pending } => Notice::error(format!(
                "{} installment(s) could not be saved and remain pending. {}",
                pending,
                error.notice().message
            ))
            .retryable(),
        }
    }
}

/// Save the draft's debit note, or request approval to, depending on the
/// user's role.
///
/// On success every installment is marked saved. On failure the unsaved
/// ones stay pending with the reason recorded, ready for another attempt.
///
/// A user without write access who already has a request open gets that
/// request revised while it is pending, so one note never has two requests
/// creating it. A rejected request is replaced by a new one.
pub async fn reconcile(
    gateway: &dyn WriteGateway,
    token: &str,
    staff: &StaffSession,
    draft: &mut DebitNoteDraft,
) -> Result<ReconcileOutcome, AppError> {
    if draft.note.cancelled {
        return Err(LedgerError::Cancelled.into());
    }
    if !draft.has_unsaved_changes() {
        return Ok(ReconcileOutcome::NothingToSave);
    }

    let pending = draft.pending_count();
    let open_request = match &draft.approval {
        Some(ticket) if !staff.can_write() => {
            if !draft.dirty && ticket.installments_covered == pending {
                return Ok(ReconcileOutcome::AlreadyRequested { pending });
            }
            Some(ticket.request_id.clone())
        }
        _ => None,
    };

    let payload = serde_json::to_value(draft.note.payload())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode debit note: {}", e)))?;
    let intent = match draft.note.id.as_deref() {
        Some(id) => WriteIntent::edit(Resource::DebitNotes, id, payload),
        None => WriteIntent::create(Resource::DebitNotes, payload),
    };

    let mut revised = false;
    let result = match open_request {
        Some(request_id) => {
            let status = revise(gateway, token, &request_id, &intent.payload).await;
            match status {
                Ok(RequestStatus::Pending) => {
                    revised = true;
                    Ok(WriteOutcome::AwaitingApproval { request_id })
                }
                Ok(RequestStatus::Approved) => {
                    return Err(AppError::Validation(vec![format!(
                        "Approval request {} was already approved. Reopen the debit note from its credit bill to add installments.",
                        request_id
                    )]))
                }
                Ok(_) => {
                    tracing::info!(request_id = %request_id, "Earlier request was rejected, filing a new one");
                    submit(gateway, token, staff, intent).await
                }
                Err(error) => Err(error),
            }
        }
        None => submit(gateway, token, staff, intent).await,
    };

    let outcome = match result {
        Ok(WriteOutcome::Applied(saved)) => {
            if let Some(saved) = saved {
                draft.note.id = Some(saved.id);
                if saved.invoice_number.is_some() {
                    draft.note.invoice_number = saved.invoice_number;
                }
            }
            let flushed = draft.note.ledger.mark_all_saved();
            draft.dirty = false;
            draft.approval = None;
            ReconcileOutcome::Saved { flushed }
        }
        Ok(WriteOutcome::AwaitingApproval { request_id }) => {
            draft.note.ledger.mark_pending(PendingReason::AwaitingApproval);
            draft.approval = Some(ApprovalTicket {
                request_id: request_id.clone(),
                installments_covered: pending,
            });
            if revised {
                ReconcileOutcome::RequestRevised {
                    request_id,
                    pending,
                }
            } else {
                ReconcileOutcome::AwaitingApproval {
                    request_id,
                    pending,
                }
            }
        }
        Err(error) => {
            tracing::warn!(
                credit_bill_id = %draft.note.credit_bill_id,
                pending,
                "Debit note save failed: {}",
                error
            );
            draft.note.ledger.mark_pending(PendingReason::PersistFailed);
            ReconcileOutcome::Failed { error, pending }
        }
    };

    record_reconciliation(outcome.label());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::debit_notes::testing::draft;
    use crate::services::debit_notes::add_installment;
    use crate::services::backend_client::Resource;
    use crate::services::permissions::testing::{staff, stored_request, RecordingGateway};
    use billing_core::models::InstallmentState;
    use billing_core::roles::Role;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[tokio::test]
    async fn admin_save_flushes_every_pending_installment() {
        let gateway = RecordingGateway::answering(json!({ "id": "dn-1", "invoiceNumber": "DN-0001" }));
        let mut draft = draft(dec!(50000));
        add_installment(&mut draft, "30000", day(1)).unwrap();
        add_installment(&mut draft, "5000", day(2)).unwrap();

        let outcome = reconcile(&gateway, "t", &staff(Role::Admin), &mut draft)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Saved { flushed: 2 }));
        assert_eq!(draft.note.id.as_deref(), Some("dn-1"));
        assert_eq!(draft.note.display_number(), "DN-0001");
        assert_eq!(draft.pending_count(), 0);

        let calls = gateway.calls();
        assert_eq!(calls[0].0, "create");
        assert_eq!(calls[0].2["installments"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_save_updates_instead_of_creating() {
        let gateway = RecordingGateway::answering(json!({ "id": "dn-1" }));
        let mut draft = draft(dec!(50000));
        add_installment(&mut draft, "100", day(1)).unwrap();
        reconcile(&gateway, "t", &staff(Role::Admin), &mut draft).await.unwrap();

        add_installment(&mut draft, "200", day(2)).unwrap();
        let outcome = reconcile(&gateway, "t", &staff(Role::Admin), &mut draft)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Saved { flushed: 1 }));
        let calls = gateway.calls();
        assert_eq!(calls[1].0, "update");
        // Full list, earlier installment included once.
        assert_eq!(calls[1].2["installments"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_save_keeps_installments_pending() {
        let gateway = RecordingGateway::failing(|| AppError::Upstream("boom".to_string()));
        let mut draft = draft(dec!(1000));
        add_installment(&mut draft, "100", day(1)).unwrap();

        let outcome = reconcile(&gateway, "t", &staff(Role::Admin), &mut draft)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Failed { pending: 1, .. }));
        assert!(outcome.notice().retryable);
        assert!(draft.note.id.is_none());
        assert_eq!(
            draft.note.installments()[0].state,
            InstallmentState::Pending(PendingReason::PersistFailed)
        );
    }

    #[tokio::test]
    async fn staff_changes_revise_the_open_request() {
        let gateway = RecordingGateway::answering(json!({ "id": "pr-3" }));
        let mut draft = draft(dec!(1000));
        add_installment(&mut draft, "100", day(1)).unwrap();

        let first = reconcile(&gateway, "t", &staff(Role::Staff), &mut draft)
            .await
            .unwrap();
        assert!(matches!(first, ReconcileOutcome::AwaitingApproval { pending: 1, .. }));
        assert_eq!(
            draft.note.installments()[0].state,
            InstallmentState::Pending(PendingReason::AwaitingApproval)
        );

        let again = reconcile(&gateway, "t", &staff(Role::Staff), &mut draft)
            .await
            .unwrap();
        assert!(matches!(again, ReconcileOutcome::AlreadyRequested { pending: 1 }));
        assert_eq!(gateway.calls().len(), 1);

        add_installment(&mut draft, "50", day(2)).unwrap();
        let revised = reconcile(&gateway, "t", &staff(Role::Staff), &mut draft)
            .await
            .unwrap();
        assert!(matches!(revised, ReconcileOutcome::RequestRevised { pending: 2, .. }));

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, "update");
        assert_eq!(calls[1].1, Resource::PermissionRequests);
        assert_eq!(calls[1].2["payload"]["installments"].as_array().unwrap().len(), 2);

        let again = reconcile(&gateway, "t", &staff(Role::Staff), &mut draft)
            .await
            .unwrap();
        assert!(matches!(again, ReconcileOutcome::AlreadyRequested { pending: 2 }));
    }

    #[tokio::test]
    async fn rejected_requests_are_filed_again() {
        let gateway = RecordingGateway::answering(json!({ "id": "pr-3" }))
            .storing(stored_request("rejected", Value::Null));
        let mut draft = draft(dec!(1000));
        add_installment(&mut draft, "100", day(1)).unwrap();
        reconcile(&gateway, "t", &staff(Role::Staff), &mut draft).await.unwrap();

        add_installment(&mut draft, "50", day(2)).unwrap();
        let outcome = reconcile(&gateway, "t", &staff(Role::Staff), &mut draft)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::AwaitingApproval { pending: 2, .. }));
        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, "create");
        assert_eq!(calls[1].2["payload"]["installments"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn approved_requests_are_not_revised() {
        let gateway = RecordingGateway::answering(json!({ "id": "pr-3" }))
            .storing(stored_request("approved", Value::Null));
        let mut draft = draft(dec!(1000));
        add_installment(&mut draft, "100", day(1)).unwrap();
        reconcile(&gateway, "t", &staff(Role::Staff), &mut draft).await.unwrap();

        add_installment(&mut draft, "50", day(2)).unwrap();
        let result = reconcile(&gateway, "t", &staff(Role::Staff), &mut draft).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(gateway.calls().len(), 1);
        assert_eq!(draft.pending_count(), 2);
    }

    #[tokio::test]
    async fn nothing_pending_means_no_call() {
        let gateway = RecordingGateway::answering(json!({ "id": "dn-1" }));
        let mut draft = draft(dec!(1000));

        let outcome = reconcile(&gateway, "t", &staff(Role::Admin), &mut draft)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::NothingToSave));
        assert!(gateway.calls().is_empty());
    }
}
