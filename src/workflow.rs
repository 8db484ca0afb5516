//! Approval workflow shared by every record kind.
//!
//! A record is submitted into the pending collection, optionally verified,
//! then either approved (moved to confirmed) or rejected (moved to rejected
//! with remarks). Moves start with an atomic claim on the pending document,
//! so concurrent approve/reject calls on one id cannot both succeed.

use std::future::Future;

use chrono::Utc;

use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::notification_repository::NotificationRepository;
use crate::db::staged_repository::{ClaimGuard, StagedRepository};
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::models::record::{Record, RejectedRecord, Stage};

/// Store a notification; failures are logged, never propagated.
async fn notify(notifications: &dyn NotificationRepository, notification: Notification) {
    if let Err(e) = notifications.insert(&notification).await {
        tracing::warn!(
            record_id = %notification.record_id,
            "Failed to store notification: {e}"
        );
    }
}

async fn notify_roles<T: Record>(
    notifications: &dyn NotificationRepository,
    roles: &[Role],
    record: &T,
    message: &str,
) {
    for role in roles {
        notify(
            notifications,
            Notification::to_role(*role, T::KIND, record.id(), message.to_string()),
        )
        .await;
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Insert a new record into the pending collection and alert its reviewers.
pub async fn submit<T: Record>(
    repo: &dyn StagedRepository<T>,
    notifications: &dyn NotificationRepository,
    record: T,
) -> Result<T, AppError> {
    repo.insert_pending(&record).await?;

    tracing::info!(
        kind = %T::KIND,
        id = record.id(),
        submitted_by = %record.audit().submitted_by,
        "Record submitted"
    );

    let reviewers = if T::KIND.requires_verification() {
        T::KIND.verifier_roles()
    } else {
        T::KIND.approver_roles()
    };
    let message = format!(
        "New {} submitted by {}",
        record.describe(),
        record.audit().submitted_by
    );
    notify_roles(notifications, reviewers, &record, &message).await;

    Ok(record)
}

/// Mark a pending record as verified.
pub async fn verify<T: Record>(
    repo: &dyn StagedRepository<T>,
    notifications: &dyn NotificationRepository,
    id: &str,
    actor: &AuthenticatedUser,
) -> Result<T, AppError> {
    let kind = T::KIND;
    if !Stage::Pending.can_transition_to(Stage::Verified, kind.requires_verification()) {
        return Err(AppError::BadRequest(format!(
            "A {} does not go through verification",
            kind.label()
        )));
    }
    actor.require_any(kind.verifier_roles(), &format!("verify a {}", kind.label()))?;

    let record = match repo.mark_verified(id, &actor.username, Utc::now()).await? {
        Some(record) => record,
        None => {
            return match repo.find_pending(id).await? {
                Some(_) => Err(AppError::Conflict(format!(
                    "{} '{}' is already verified",
                    capitalize(kind.label()),
                    id
                ))),
                None => Err(AppError::NotFound(format!(
                    "Pending {} '{}' not found",
                    kind.label(),
                    id
                ))),
            };
        }
    };

    tracing::info!(kind = %kind, id, verified_by = %actor.username, "Record verified");

    let message = format!("{} verified by {}", capitalize(&record.describe()), actor.username);
    notify(
        notifications,
        Notification::to_user(&record.audit().submitted_by, kind, id, message.clone()),
    )
    .await;
    let message = format!("{}; awaiting approval", message);
    notify_roles(notifications, kind.approver_roles(), &record, &message).await;

    Ok(record)
}

/// Approve a pending record with no side effects.
pub async fn approve<T: Record>(
    repo: &dyn StagedRepository<T>,
    notifications: &dyn NotificationRepository,
    id: &str,
    actor: &AuthenticatedUser,
) -> Result<T, AppError> {
    approve_with(repo, notifications, id, actor, |_| async { Ok(()) }).await
}

/// Approve a pending record, running `effect` once the record is confirmed.
///
/// If `effect` fails the record is moved back to pending and the effect's
/// error is returned, so the effect must be a single atomic step.
pub async fn approve_with<T, F, Fut>(
    repo: &dyn StagedRepository<T>,
    notifications: &dyn NotificationRepository,
    id: &str,
    actor: &AuthenticatedUser,
    effect: F,
) -> Result<T, AppError>
where
    T: Record,
    F: FnOnce(T) -> Fut + Send,
    Fut: Future<Output = Result<(), AppError>> + Send,
{
    let kind = T::KIND;
    actor.require_any(kind.approver_roles(), &format!("approve a {}", kind.label()))?;

    let guard = if kind.requires_verification() {
        ClaimGuard::Verified
    } else {
        ClaimGuard::Any
    };

    let original = match repo.claim_pending(id, guard).await? {
        Some(record) => record,
        None => {
            return match repo.find_pending(id).await? {
                Some(current)
                    if !current
                        .pending_stage()
                        .can_transition_to(Stage::Confirmed, kind.requires_verification()) =>
                {
                    Err(AppError::BadRequest(format!(
                        "{} '{}' must be verified before approval",
                        capitalize(kind.label()),
                        id
                    )))
                }
                Some(_) => Err(AppError::Conflict(format!(
                    "{} '{}' changed while being approved, retry",
                    capitalize(kind.label()),
                    id
                ))),
                None => Err(AppError::NotFound(format!(
                    "Pending {} '{}' not found",
                    kind.label(),
                    id
                ))),
            };
        }
    };

    let mut record = original.clone();
    record.audit_mut().approved_by = Some(actor.username.clone());
    record.audit_mut().approved_at = Some(Utc::now());

    if let Err(e) = repo.upsert_confirmed(&record).await {
        restore(repo, &original).await;
        return Err(e);
    }

    if let Err(e) = effect(record.clone()).await {
        tracing::info!(kind = %kind, id, "Approval effect failed, reverting: {e}");
        if let Err(remove_err) = repo.remove_confirmed(id).await {
            tracing::error!(kind = %kind, id, "Failed to revert confirmed record: {remove_err}");
        }
        restore(repo, &original).await;
        return Err(e);
    }

    tracing::info!(kind = %kind, id, approved_by = %actor.username, "Record approved");

    let message = format!("{} approved by {}", capitalize(&record.describe()), actor.username);
    notify(
        notifications,
        Notification::to_user(&record.audit().submitted_by, kind, id, message),
    )
    .await;

    Ok(record)
}

/// Reject a pending (verified or not) record with mandatory remarks.
pub async fn reject<T: Record>(
    repo: &dyn StagedRepository<T>,
    notifications: &dyn NotificationRepository,
    id: &str,
    actor: &AuthenticatedUser,
    remarks: &str,
) -> Result<RejectedRecord<T>, AppError> {
    let kind = T::KIND;
    actor.require_any(&kind.reviewer_roles(), &format!("reject a {}", kind.label()))?;

    let remarks = remarks.trim();
    if remarks.is_empty() {
        return Err(AppError::BadRequest("Rejection remarks are required".into()));
    }

    let record = repo
        .claim_pending(id, ClaimGuard::Any)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pending {} '{}' not found", kind.label(), id)))?;

    let rejected = RejectedRecord {
        id: record.id().to_string(),
        record,
        remarks: remarks.to_string(),
        rejected_by: actor.username.clone(),
        rejected_at: Utc::now(),
    };

    if let Err(e) = repo.insert_rejected(&rejected).await {
        restore(repo, &rejected.record).await;
        return Err(e);
    }

    tracing::info!(kind = %kind, id, rejected_by = %actor.username, "Record rejected");

    let message = format!(
        "{} rejected by {}: {}",
        capitalize(&rejected.record.describe()),
        actor.username,
        remarks
    );
    notify(
        notifications,
        Notification::to_user(&rejected.record.audit().submitted_by, kind, id, message),
    )
    .await;

    Ok(rejected)
}

async fn restore<T: Record>(repo: &dyn StagedRepository<T>, record: &T) {
    if let Err(e) = repo.restore_pending(record).await {
        tracing::error!(
            kind = %T::KIND,
            id = record.id(),
            "Failed to restore claimed record to pending, record may be lost: {e}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryNotificationRepository, MemoryStagedRepository};
    use crate::models::asset::fixtures::{issue, purchase};
    use crate::models::asset::{AssetIssue, AssetPurchase};
    use crate::models::faculty::fixtures::faculty;
    use crate::models::faculty::Faculty;
    use std::sync::Arc;

    fn actor(username: &str, role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: format!("id-{username}"),
            username: username.to_string(),
            name: username.to_string(),
            role,
        }
    }

    fn principal() -> AuthenticatedUser {
        actor("principal", Role::Principal)
    }

    fn verifier() -> AuthenticatedUser {
        actor("verifier", Role::FacultyVerifier)
    }

    fn manager() -> AuthenticatedUser {
        actor("manager", Role::AssetManager)
    }

    async fn submitted_faculty(
        repo: &MemoryStagedRepository<Faculty>,
        notes: &MemoryNotificationRepository,
    ) -> Faculty {
        submit(repo, notes, faculty("Dr. Meena")).await.unwrap()
    }

    #[tokio::test]
    async fn test_submit_notifies_verifiers() {
        let repo = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();

        let record = submitted_faculty(&repo, &notes).await;

        assert_eq!(repo.pending.lock().unwrap().len(), 1);
        let stored = notes.notifications.lock().unwrap().clone();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|n| n.record_id == record.id));
        assert!(stored.iter().any(|n| n.recipient_role == Some(Role::FacultyVerifier)));
        assert!(stored.iter().any(|n| n.recipient_role == Some(Role::HeadOfOffice)));
    }

    #[tokio::test]
    async fn test_approve_verified_faculty_moves_to_confirmed() {
        let repo = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submitted_faculty(&repo, &notes).await;

        verify(&repo, &notes, &record.id, &verifier()).await.unwrap();
        let approved = approve(&repo, &notes, &record.id, &principal()).await.unwrap();

        assert!(repo.list_pending().await.unwrap().is_empty());
        let confirmed = repo.list_confirmed().await.unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, record.id);
        assert_eq!(approved.audit.approved_by.as_deref(), Some("principal"));
        assert_eq!(approved.audit.verified_by.as_deref(), Some("verifier"));
        assert!(notes
            .messages()
            .iter()
            .any(|m| m.contains("approved by principal")));
    }

    #[tokio::test]
    async fn test_approve_unverified_faculty_is_refused() {
        let repo = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submitted_faculty(&repo, &notes).await;

        match approve(&repo, &notes, &record.id, &principal()).await {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("must be verified")),
            other => panic!("Expected BadRequest, got: {:?}", other),
        }
        // Still pending, nothing confirmed.
        assert_eq!(repo.count_pending().await.unwrap(), 1);
        assert_eq!(repo.count_confirmed().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_verify_twice_conflicts() {
        let repo = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submitted_faculty(&repo, &notes).await;

        verify(&repo, &notes, &record.id, &verifier()).await.unwrap();
        let second = verify(&repo, &notes, &record.id, &verifier()).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_verify_unknown_id() {
        let repo: MemoryStagedRepository<Faculty> = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let result = verify(&repo, &notes, "missing", &verifier()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_verify_not_applicable_to_assets() {
        let repo: MemoryStagedRepository<AssetPurchase> = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submit(&repo, &notes, purchase(2)).await.unwrap();
        let result = verify(&repo, &notes, &record.id, &manager()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_wrong_role_forbidden() {
        let repo = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submitted_faculty(&repo, &notes).await;

        let keeper = actor("keeper", Role::Storekeeper);
        assert!(matches!(
            verify(&repo, &notes, &record.id, &keeper).await,
            Err(AppError::Forbidden(_))
        ));
        // A verifier cannot give final approval.
        verify(&repo, &notes, &record.id, &verifier()).await.unwrap();
        assert!(matches!(
            approve(&repo, &notes, &record.id, &verifier()).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_requires_remarks() {
        let repo = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submitted_faculty(&repo, &notes).await;

        let result = reject(&repo, &notes, &record.id, &principal(), "   ").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reject_moves_to_rejected_with_remarks() {
        let repo = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submitted_faculty(&repo, &notes).await;

        let rejected = reject(&repo, &notes, &record.id, &verifier(), "Missing photograph")
            .await
            .unwrap();

        assert_eq!(rejected.remarks, "Missing photograph");
        assert_eq!(rejected.rejected_by, "verifier");
        assert!(repo.list_pending().await.unwrap().is_empty());
        assert_eq!(repo.list_rejected().await.unwrap().len(), 1);
        assert!(notes
            .messages()
            .iter()
            .any(|m| m.ends_with("rejected by verifier: Missing photograph")));
    }

    #[tokio::test]
    async fn test_approve_after_reject_is_not_found() {
        let repo: MemoryStagedRepository<AssetPurchase> = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submit(&repo, &notes, purchase(1)).await.unwrap();

        reject(&repo, &notes, &record.id, &manager(), "Wrong bill").await.unwrap();
        let result = approve(&repo, &notes, &record.id, &manager()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(repo.count_confirmed().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_approve_and_reject_single_winner() {
        let repo: Arc<MemoryStagedRepository<AssetPurchase>> = Arc::new(MemoryStagedRepository::new());
        let notes = Arc::new(MemoryNotificationRepository::new());
        let record = submit(repo.as_ref(), notes.as_ref(), purchase(3)).await.unwrap();

        let reviewer = manager();
        let (a, b) = tokio::join!(
            approve(repo.as_ref(), notes.as_ref(), &record.id, &reviewer),
            reject(repo.as_ref(), notes.as_ref(), &record.id, &reviewer, "Duplicate entry"),
        );

        assert!(a.is_ok() ^ b.is_ok(), "exactly one of approve/reject must win");
        let confirmed = repo.count_confirmed().await.unwrap();
        let rejected = repo.list_rejected().await.unwrap().len() as u64;
        assert_eq!(confirmed + rejected, 1);
        assert_eq!(repo.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_effect_restores_pending() {
        let repo: MemoryStagedRepository<AssetIssue> = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submit(&repo, &notes, issue(5)).await.unwrap();

        let result = approve_with(&repo, &notes, &record.id, &manager(), |_| async {
            Err(AppError::Conflict("Insufficient stock".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        let pending = repo.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].audit.approved_by.is_none());
        assert_eq!(repo.count_confirmed().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_confirm_restores_pending() {
        let repo: MemoryStagedRepository<AssetPurchase> = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submit(&repo, &notes, purchase(2)).await.unwrap();
        *repo.fail_confirm.lock().unwrap() = true;

        let result = approve(&repo, &notes, &record.id, &manager()).await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_reject_insert_restores_pending() {
        let repo: MemoryStagedRepository<AssetPurchase> = MemoryStagedRepository::new();
        let notes = MemoryNotificationRepository::new();
        let record = submit(&repo, &notes, purchase(2)).await.unwrap();
        *repo.fail_reject.lock().unwrap() = true;

        let result = reject(&repo, &notes, &record.id, &manager(), "Wrong supplier").await;

        assert!(matches!(result, Err(AppError::Database(_))));
        let pending = repo.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, record.id);
        assert!(repo.list_rejected().await.unwrap().is_empty());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("faculty record"), "Faculty record");
        assert_eq!(capitalize(""), "");
    }
}
