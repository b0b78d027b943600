use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use std::sync::Arc;
use uuid::Uuid;
use vitrina_core::models::{token_hint, NewUploadRecord};
use vitrina_core::validation::validate_upload_intent;
use vitrina_core::{AppError, OwnerRef, UploadPolicy, UploadRecord};
use vitrina_db::{OwnerDirectory, UploadRecordStore};
use vitrina_storage::{generate_storage_key, ObjectStorage};

use super::{bounded, storage_error};

const TOKEN_BYTES: usize = 32;

/// Client-declared upload intent
#[derive(Debug, Clone)]
pub struct IssueUploadIntent {
    pub owner_entity_type: String,
    pub owner_entity_id: i64,
    pub document_type: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub requested_by_user_id: i64,
}

/// A persisted `Pending` record plus the URL the client uploads to
#[derive(Debug, Clone)]
pub struct IssuedIntent {
    pub record: UploadRecord,
    pub presigned_url: String,
    pub upload_url_expires_at: DateTime<Utc>,
}

/// 256 random bits, hex encoded.
pub fn generate_upload_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn chrono_duration(duration: std::time::Duration) -> Result<ChronoDuration, AppError> {
    ChronoDuration::from_std(duration)
        .map_err(|e| AppError::Internal(format!("Invalid duration in upload policy: {}", e)))
}

/// Creates upload intents: validates, signs a PUT URL, persists a `Pending` record.
pub struct TokenIssuer {
    store: Arc<dyn UploadRecordStore>,
    storage: Arc<dyn ObjectStorage>,
    owners: Arc<dyn OwnerDirectory>,
    policy: UploadPolicy,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn UploadRecordStore>,
        storage: Arc<dyn ObjectStorage>,
        owners: Arc<dyn OwnerDirectory>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            storage,
            owners,
            policy,
        }
    }

    pub async fn issue(&self, intent: IssueUploadIntent) -> Result<IssuedIntent, AppError> {
        self.issue_at(intent, Utc::now()).await
    }

    #[tracing::instrument(
        skip(self, intent),
        fields(
            owner_type = %intent.owner_entity_type,
            owner_id = intent.owner_entity_id,
            document_type = %intent.document_type,
            size_bytes = intent.size_bytes
        )
    )]
    pub async fn issue_at(
        &self,
        intent: IssueUploadIntent,
        now: DateTime<Utc>,
    ) -> Result<IssuedIntent, AppError> {
        let validated = validate_upload_intent(
            &intent.owner_entity_type,
            &intent.document_type,
            &intent.mime_type,
            intent.size_bytes,
            &intent.file_name,
            &self.policy,
        )?;

        let owner = OwnerRef {
            entity_type: validated.owner_entity_type,
            entity_id: intent.owner_entity_id,
        };
        if !self.owners.exists(&owner).await? {
            return Err(AppError::OwnerEntityNotFound(format!(
                "{} {} does not exist",
                owner.entity_type, owner.entity_id
            )));
        }

        let declared_size_bytes = i64::try_from(validated.size_bytes).map_err(|_| {
            AppError::FileTooLarge {
                size: validated.size_bytes,
                max: self.policy.max_size_for(validated.document_type),
            }
        })?;

        let upload_token = generate_upload_token();
        let storage_key = generate_storage_key(&owner, validated.document_type, &upload_token)
            .map_err(storage_error)?;

        // Sign before persisting so a storage outage leaves nothing behind
        let presigned_url = bounded(
            self.policy.storage_timeout,
            "presign",
            self.storage.presigned_put_url(
                &storage_key,
                &validated.mime_type,
                self.policy.presigned_url_ttl,
            ),
        )
        .await?;

        let upload_url_expires_at = now + chrono_duration(self.policy.presigned_url_ttl)?;
        let expires_at = now + chrono_duration(self.policy.confirm_window)?;

        let record = self
            .store
            .insert(NewUploadRecord {
                id: Uuid::new_v4(),
                owner,
                document_type: validated.document_type,
                upload_token,
                storage_key,
                original_file_name: validated.file_name,
                mime_type: validated.mime_type,
                declared_size_bytes,
                uploaded_by_user_id: intent.requested_by_user_id,
                expires_at,
                created_at: now,
            })
            .await?;

        tracing::info!(
            record_id = %record.id,
            token = %token_hint(&record.upload_token),
            storage_key = %record.storage_key,
            expires_at = %record.expires_at,
            "Upload intent issued"
        );

        Ok(IssuedIntent {
            record,
            presigned_url,
            upload_url_expires_at,
        })
    }
}
