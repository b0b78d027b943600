//! In-memory `UploadRecordStore` with the same conditional-update semantics as Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use vitrina_core::models::{NewUploadRecord, VerifiedObject};
use vitrina_core::{
    AppError, DocumentSlot, ModerationStatus, UploadRecord, UploadStatus,
};
use vitrina_db::{attempt_ceiling, FailedAttempt, ReplacementLink, UploadRecordStore};

#[derive(Clone, Default)]
pub struct InMemoryUploadRecordStore {
    records: Arc<Mutex<HashMap<Uuid, UploadRecord>>>,
}

impl InMemoryUploadRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<UploadRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Overwrite a record directly, bypassing state checks.
    pub fn put(&self, record: UploadRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn all(&self) -> Vec<UploadRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    /// Apply `f` to the record when `guard` holds, bumping revision and `updated_at`.
    fn update_if<G, F>(&self, id: Uuid, now: DateTime<Utc>, guard: G, f: F) -> Option<UploadRecord>
    where
        G: FnOnce(&UploadRecord) -> bool,
        F: FnOnce(&mut UploadRecord),
    {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id)?;
        if !guard(record) {
            return None;
        }
        f(record);
        record.revision += 1;
        record.updated_at = now;
        Some(record.clone())
    }
}

#[async_trait]
impl UploadRecordStore for InMemoryUploadRecordStore {
    async fn insert(&self, new: NewUploadRecord) -> Result<UploadRecord, AppError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&new.id)
            || records.values().any(|r| {
                r.upload_token == new.upload_token || r.storage_key == new.storage_key
            })
        {
            return Err(AppError::Conflict(
                "Upload token or storage key already exists".to_string(),
            ));
        }
        let record = UploadRecord {
            id: new.id,
            owner_entity_type: new.owner.entity_type,
            owner_entity_id: new.owner.entity_id,
            document_type: new.document_type,
            upload_token: new.upload_token,
            storage_key: new.storage_key,
            original_file_name: new.original_file_name,
            status: UploadStatus::Pending,
            mime_type: new.mime_type,
            declared_size_bytes: new.declared_size_bytes,
            actual_size_bytes: None,
            etag: None,
            storage_last_modified_at: None,
            uploaded_at: None,
            replacement_of_id: None,
            version_of_id: None,
            version_number: 1,
            superseded_by_id: None,
            expires_at: new.expires_at,
            failed_attempts: 0,
            last_failure_fingerprint: None,
            last_failure_reason: None,
            revision: 0,
            uploaded_by_user_id: new.uploaded_by_user_id,
            moderation_status: ModerationStatus::Unreviewed,
            verified_by_user_id: None,
            verified_at: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_token(&self, upload_token: &str) -> Result<Option<UploadRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.upload_token == upload_token)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UploadRecord>, AppError> {
        Ok(self.get(id))
    }

    async fn mark_confirmed(
        &self,
        id: Uuid,
        expected_revision: i64,
        object: &VerifiedObject,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        Ok(self.update_if(
            id,
            now,
            |r| r.revision == expected_revision && r.status == UploadStatus::Pending,
            |r| {
                r.status = UploadStatus::Confirmed;
                r.actual_size_bytes = Some(object.size_bytes);
                r.etag = Some(object.etag.clone());
                r.storage_last_modified_at = object.last_modified;
                r.uploaded_at = Some(now);
            },
        ))
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        expected_revision: i64,
        failure: &FailedAttempt,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        let max = attempt_ceiling(max_attempts)?;
        Ok(self.update_if(
            id,
            now,
            |r| r.revision == expected_revision && r.status == UploadStatus::Pending,
            |r| {
                if r.failed_attempts + 1 >= max {
                    r.status = UploadStatus::Failed;
                }
                r.failed_attempts = (r.failed_attempts + 1).min(max);
                r.last_failure_fingerprint = Some(failure.fingerprint.clone());
                r.last_failure_reason = Some(failure.reason.clone());
            },
        ))
    }

    async fn mark_orphaned(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        Ok(self.update_if(
            id,
            now,
            |r| r.revision == expected_revision && r.status == UploadStatus::Pending,
            |r| r.status = UploadStatus::Orphaned,
        ))
    }

    async fn claim_expired(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<UploadRecord>, AppError> {
        let mut records = self.records.lock().unwrap();
        let mut expired: Vec<&mut UploadRecord> = records
            .values_mut()
            .filter(|r| r.status == UploadStatus::Pending && r.expires_at <= now)
            .collect();
        expired.sort_by_key(|r| r.expires_at);

        Ok(expired
            .into_iter()
            .take(limit as usize)
            .map(|r| {
                r.status = UploadStatus::Orphaned;
                r.revision += 1;
                r.updated_at = now;
                r.clone()
            })
            .collect())
    }

    async fn link_replacement(
        &self,
        link: &ReplacementLink,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        let mut records = self.records.lock().unwrap();

        let old_claimable = records.get(&link.old_id).is_some_and(|old| {
            old.status == UploadStatus::Confirmed && old.superseded_by_id.is_none()
        });
        let new_linkable = records.get(&link.new_id).is_some_and(|new| {
            new.status == UploadStatus::Confirmed
                && new.replacement_of_id.is_none()
                && new.version_of_id.is_none()
                && new.superseded_by_id.is_none()
        });
        let new_already_claimed = records
            .values()
            .any(|r| r.superseded_by_id == Some(link.new_id));
        if !old_claimable || !new_linkable || new_already_claimed {
            return Ok(None);
        }

        if let Some(old) = records.get_mut(&link.old_id) {
            old.superseded_by_id = Some(link.new_id);
            old.revision += 1;
            old.updated_at = now;
        }
        let new = records.get_mut(&link.new_id).map(|new| {
            new.replacement_of_id = Some(link.old_id);
            new.version_of_id = Some(link.version_of_id);
            new.version_number = link.version_number;
            new.revision += 1;
            new.updated_at = now;
            new.clone()
        });
        Ok(new)
    }

    async fn current_for_slot(
        &self,
        slot: &DocumentSlot,
    ) -> Result<Option<UploadRecord>, AppError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .values()
            .filter(|r| {
                r.slot() == *slot
                    && r.status == UploadStatus::Confirmed
                    && r.superseded_by_id.is_none()
            })
            .max_by(|a, b| {
                a.version_number
                    .cmp(&b.version_number)
                    .then(a.uploaded_at.cmp(&b.uploaded_at))
            })
            .cloned())
    }

    async fn chain(&self, root_id: Uuid) -> Result<Vec<UploadRecord>, AppError> {
        let records = self.records.lock().unwrap();
        let mut chain: Vec<UploadRecord> = records
            .values()
            .filter(|r| r.id == root_id || r.version_of_id == Some(root_id))
            .cloned()
            .collect();
        chain.sort_by(|a, b| {
            a.version_number
                .cmp(&b.version_number)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(chain)
    }

    async fn set_moderation(
        &self,
        id: Uuid,
        status: ModerationStatus,
        moderator_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        Ok(self.update_if(
            id,
            now,
            |r| r.status == UploadStatus::Confirmed,
            |r| {
                r.moderation_status = status;
                r.verified_by_user_id = Some(moderator_user_id);
                r.verified_at = Some(now);
            },
        ))
    }
}
