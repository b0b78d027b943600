use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use vitrina_core::{AppError, DocumentSlot, UploadRecord, UploadStatus};
use vitrina_db::{ReplacementLink, UploadRecordStore};

/// Links confirmed uploads into per-slot version chains.
///
/// The successor claim on the old record is a conditional update, so two concurrent
/// replacements of the same record cannot both win.
pub struct VersionChain {
    store: Arc<dyn UploadRecordStore>,
}

impl VersionChain {
    pub fn new(store: Arc<dyn UploadRecordStore>) -> Self {
        Self { store }
    }

    pub async fn replace(
        &self,
        old_record_id: Uuid,
        new_upload_token: &str,
    ) -> Result<UploadRecord, AppError> {
        self.replace_at(old_record_id, new_upload_token, Utc::now())
            .await
    }

    #[tracing::instrument(skip(self, new_upload_token), fields(old_id = %old_record_id))]
    pub async fn replace_at(
        &self,
        old_record_id: Uuid,
        new_upload_token: &str,
        now: DateTime<Utc>,
    ) -> Result<UploadRecord, AppError> {
        let old = self
            .store
            .find_by_id(old_record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", old_record_id)))?;
        let new = self
            .store
            .find_by_token(new_upload_token)
            .await?
            .ok_or_else(|| AppError::NotFound("Upload token not found".to_string()))?;

        // Retry of a replacement that already went through
        if new.replacement_of_id == Some(old.id) {
            return Ok(new);
        }

        check_replaceable(&old, &new)?;

        let link = ReplacementLink {
            old_id: old.id,
            new_id: new.id,
            version_of_id: old.chain_root_id(),
            version_number: old.version_number + 1,
        };

        match self.store.link_replacement(&link, now).await? {
            Some(linked) => {
                tracing::info!(
                    new_id = %linked.id,
                    version_of_id = %link.version_of_id,
                    version_number = linked.version_number,
                    "Document version linked"
                );
                Ok(linked)
            }
            None => {
                // The same link may have been written by a concurrent identical request
                let reread = self.store.find_by_id(new.id).await?;
                if let Some(reread) = reread.filter(|r| r.replacement_of_id == Some(old.id)) {
                    return Ok(reread);
                }
                tracing::debug!(new_id = %new.id, "Replacement claim lost");
                Err(AppError::VersionConflict(format!(
                    "Document {} was already replaced",
                    old.id
                )))
            }
        }
    }

    /// The live document of a slot.
    pub async fn current(&self, slot: &DocumentSlot) -> Result<UploadRecord, AppError> {
        self.store.current_for_slot(slot).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "No confirmed {} for {}",
                slot.document_type, slot.owner
            ))
        })
    }

    /// Every version of the chain `record_id` belongs to, oldest first.
    pub async fn history(&self, record_id: Uuid) -> Result<Vec<UploadRecord>, AppError> {
        let record = self
            .store
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", record_id)))?;
        self.store.chain(record.chain_root_id()).await
    }
}

fn check_replaceable(old: &UploadRecord, new: &UploadRecord) -> Result<(), AppError> {
    if old.id == new.id {
        return Err(AppError::InvalidState(
            "A document cannot replace itself".to_string(),
        ));
    }
    if old.status != UploadStatus::Confirmed {
        return Err(AppError::InvalidState(format!(
            "Document {} is {}, only confirmed documents can be replaced",
            old.id, old.status
        )));
    }
    if new.status != UploadStatus::Confirmed {
        return Err(AppError::InvalidState(format!(
            "Replacement upload is {}, confirm it before replacing",
            new.status
        )));
    }
    if old.slot() != new.slot() {
        return Err(AppError::InvalidState(
            "Replacement must have the same owner and document type".to_string(),
        ));
    }
    if new.replacement_of_id.is_some() || new.version_of_id.is_some() {
        return Err(AppError::InvalidState(
            "Replacement upload is already part of a version chain".to_string(),
        ));
    }
    if new.superseded_by_id.is_some() {
        return Err(AppError::InvalidState(
            "Replacement upload has already been superseded".to_string(),
        ));
    }
    if old.superseded_by_id.is_some() {
        return Err(AppError::VersionConflict(format!(
            "Document {} was already replaced",
            old.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{intent, UploadHarness};
    use vitrina_core::{DocumentType, OwnerEntityType, OwnerRef};

    #[tokio::test]
    async fn test_version_monotonicity() {
        let harness = UploadHarness::new();
        let r0 = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let r1 = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let r2 = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;

        let r1 = harness.versions.replace(r0.id, &r1.upload_token).await.unwrap();
        let r2 = harness.versions.replace(r1.id, &r2.upload_token).await.unwrap();

        assert_eq!(r1.version_number, 2);
        assert_eq!(r2.version_number, 3);
        assert_eq!(r1.version_of_id, Some(r0.id));
        assert_eq!(r2.version_of_id, Some(r0.id));
        assert_eq!(r1.replacement_of_id, Some(r0.id));
        assert_eq!(r2.replacement_of_id, Some(r1.id));

        let slot = DocumentSlot {
            owner: OwnerRef {
                entity_type: OwnerEntityType::Commerce,
                entity_id: 42,
            },
            document_type: DocumentType::IdCard,
        };
        assert_eq!(harness.versions.current(&slot).await.unwrap().id, r2.id);

        let history = harness.versions.history(r1.id).await.unwrap();
        let versions: Vec<i32> = history.iter().map(|r| r.version_number).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(history[0].id, r0.id);
    }

    #[tokio::test]
    async fn test_replace_is_idempotent() {
        let harness = UploadHarness::new();
        let r0 = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let r1 = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;

        let first = harness.versions.replace(r0.id, &r1.upload_token).await.unwrap();
        let again = harness.versions.replace(r0.id, &r1.upload_token).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.revision, again.revision);
    }

    #[tokio::test]
    async fn test_second_replacement_of_same_record_conflicts() {
        let harness = UploadHarness::new();
        let r0 = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let a = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let b = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;

        harness.versions.replace(r0.id, &a.upload_token).await.unwrap();
        let err = harness
            .versions
            .replace(r0.id, &b.upload_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::VersionConflict(_)));
    }

    #[tokio::test]
    async fn test_concurrent_replacements_one_winner() {
        let harness = UploadHarness::new();
        let r0 = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let a = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let b = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;

        let versions_a = harness.versions.clone();
        let versions_b = harness.versions.clone();
        let token_a = a.upload_token.clone();
        let token_b = b.upload_token.clone();
        let (res_a, res_b) = tokio::join!(
            async move { versions_a.replace(r0.id, &token_a).await },
            async move { versions_b.replace(r0.id, &token_b).await },
        );

        let outcomes = [res_a, res_b];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::VersionConflict(_))))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 1);
    }

    #[tokio::test]
    async fn test_replace_preconditions() {
        let harness = UploadHarness::new();
        let confirmed = harness.issue_and_confirm("commerce", 42, "ID_CARD").await;
        let other_type = harness.issue_and_confirm("commerce", 42, "TAX_REGISTRATION").await;
        let pending = harness
            .issuer
            .issue(intent("commerce", 42, "ID_CARD", "b.pdf", "application/pdf", 1024))
            .await
            .unwrap()
            .record;

        let err = harness
            .versions
            .replace(confirmed.id, &confirmed.upload_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = harness
            .versions
            .replace(confirmed.id, &pending.upload_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = harness
            .versions
            .replace(confirmed.id, &other_type.upload_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = harness
            .versions
            .replace(Uuid::new_v4(), &confirmed.upload_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_current_missing_slot() {
        let harness = UploadHarness::new();
        let slot = DocumentSlot {
            owner: OwnerRef {
                entity_type: OwnerEntityType::Product,
                entity_id: 5,
            },
            document_type: DocumentType::ProductPhoto,
        };
        assert!(matches!(
            harness.versions.current(&slot).await,
            Err(AppError::NotFound(_))
        ));
    }
}
