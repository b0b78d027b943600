use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use vitrina_core::{AppError, ModerationDecision, ModerationStatus, UploadRecord, UploadStatus};
use vitrina_db::UploadRecordStore;

/// Records a reviewer's verdict on a confirmed upload.
pub struct ModerationService {
    store: Arc<dyn UploadRecordStore>,
}

impl ModerationService {
    pub fn new(store: Arc<dyn UploadRecordStore>) -> Self {
        Self { store }
    }

    pub async fn review(
        &self,
        record_id: Uuid,
        moderator_user_id: i64,
        decision: ModerationDecision,
    ) -> Result<UploadRecord, AppError> {
        self.review_at(record_id, moderator_user_id, decision, Utc::now())
            .await
    }

    #[tracing::instrument(skip(self), fields(record_id = %record_id))]
    pub async fn review_at(
        &self,
        record_id: Uuid,
        moderator_user_id: i64,
        decision: ModerationDecision,
        now: DateTime<Utc>,
    ) -> Result<UploadRecord, AppError> {
        let record = self
            .store
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", record_id)))?;
        if record.status != UploadStatus::Confirmed {
            return Err(AppError::InvalidState(format!(
                "Document {} is {}, only confirmed documents can be reviewed",
                record.id, record.status
            )));
        }

        let status = ModerationStatus::from(decision);
        let reviewed = self
            .store
            .set_moderation(record.id, status, moderator_user_id, now)
            .await?
            .ok_or_else(|| {
                AppError::InvalidState(format!("Document {} is no longer reviewable", record.id))
            })?;

        tracing::info!(
            moderator_user_id,
            moderation_status = ?reviewed.moderation_status,
            "Document reviewed"
        );
        Ok(reviewed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{intent, UploadHarness};

    #[tokio::test]
    async fn test_review_confirmed_document() {
        let harness = UploadHarness::new();
        let record = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        assert_eq!(record.moderation_status, ModerationStatus::Unreviewed);

        let reviewed = harness
            .moderation
            .review(record.id, 99, ModerationDecision::Rejected)
            .await
            .unwrap();
        assert_eq!(reviewed.moderation_status, ModerationStatus::Rejected);
        assert_eq!(reviewed.verified_by_user_id, Some(99));
        assert!(reviewed.verified_at.is_some());
        // Moderation never touches the lifecycle status
        assert_eq!(reviewed.status, UploadStatus::Confirmed);

        let approved = harness
            .moderation
            .review(record.id, 100, ModerationDecision::Approved)
            .await
            .unwrap();
        assert_eq!(approved.moderation_status, ModerationStatus::Approved);
        assert_eq!(approved.verified_by_user_id, Some(100));
    }

    #[tokio::test]
    async fn test_pending_upload_cannot_be_reviewed() {
        let harness = UploadHarness::new();
        let pending = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "a.pdf", "application/pdf", 100))
            .await
            .unwrap()
            .record;

        let err = harness
            .moderation
            .review(pending.id, 99, ModerationDecision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = harness
            .moderation
            .review(Uuid::new_v4(), 99, ModerationDecision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
