use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use vitrina_core::models::{NewUploadRecord, VerifiedObject};
use vitrina_core::{AppError, DocumentSlot, ModerationStatus, UploadRecord};

use super::transaction::TransactionGuard;

const RECORD_COLUMNS: &str = r#"
    id, owner_entity_type, owner_entity_id, document_type, upload_token, storage_key,
    original_file_name, status, mime_type, declared_size_bytes, actual_size_bytes, etag,
    storage_last_modified_at, uploaded_at, replacement_of_id, version_of_id, version_number,
    superseded_by_id, expires_at, failed_attempts, last_failure_fingerprint,
    last_failure_reason, revision, uploaded_by_user_id, moderation_status,
    verified_by_user_id, verified_at, created_at, updated_at
"#;

/// A verification failure to be counted against a pending record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    /// Digest of reported and observed object state; equal digests are the same attempt
    pub fingerprint: String,
    pub reason: String,
}

/// Link fields written when `new_id` becomes the successor of `old_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementLink {
    pub old_id: Uuid,
    pub new_id: Uuid,
    /// Chain root shared by every non-root member
    pub version_of_id: Uuid,
    pub version_number: i32,
}

/// `failed_attempts` is an INTEGER column; ceilings beyond `i32::MAX` cannot be stored.
pub fn attempt_ceiling(max_attempts: u32) -> Result<i32, AppError> {
    i32::try_from(max_attempts).map_err(|_| {
        AppError::Internal(format!(
            "Attempt ceiling {} exceeds the storable maximum {}",
            max_attempts,
            i32::MAX
        ))
    })
}

/// Persistence contract for upload records
///
/// Mutating methods are compare-and-swap operations: they return `Ok(None)` when the row
/// no longer matches the expected revision/state, and the caller re-reads and decides.
#[async_trait]
pub trait UploadRecordStore: Send + Sync {
    /// Persist a new `Pending` record. A token collision is a `Conflict`.
    async fn insert(&self, record: NewUploadRecord) -> Result<UploadRecord, AppError>;

    async fn find_by_token(&self, upload_token: &str) -> Result<Option<UploadRecord>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UploadRecord>, AppError>;

    /// `Pending` -> `Confirmed` with the verified object metadata.
    async fn mark_confirmed(
        &self,
        id: Uuid,
        expected_revision: i64,
        object: &VerifiedObject,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError>;

    /// Count one failed verification; the attempt that reaches `max_attempts` moves the
    /// record to `Failed`.
    async fn record_failed_attempt(
        &self,
        id: Uuid,
        expected_revision: i64,
        failure: &FailedAttempt,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError>;

    /// `Pending` -> `Orphaned` for a single expired record.
    async fn mark_orphaned(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError>;

    /// Claim up to `limit` expired `Pending` records, transitioning them to `Orphaned`.
    /// Concurrent callers receive disjoint sets.
    async fn claim_expired(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<UploadRecord>, AppError>;

    /// Claim `old_id`'s successor slot and write the link fields on `new_id`, atomically.
    /// Returns the updated new record, or `None` when the claim was lost.
    async fn link_replacement(
        &self,
        link: &ReplacementLink,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError>;

    /// The confirmed, unsuperseded record with the highest version in a slot.
    async fn current_for_slot(&self, slot: &DocumentSlot)
        -> Result<Option<UploadRecord>, AppError>;

    /// Every member of the chain rooted at `root_id`, ordered by version number.
    async fn chain(&self, root_id: Uuid) -> Result<Vec<UploadRecord>, AppError>;

    /// Record a moderation decision on a `Confirmed` record.
    async fn set_moderation(
        &self,
        id: Uuid,
        status: ModerationStatus,
        moderator_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError>;
}

/// Postgres repository for upload records
#[derive(Clone)]
pub struct PgUploadRecordRepository {
    pool: PgPool,
}

impl PgUploadRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl UploadRecordStore for PgUploadRecordRepository {
    #[tracing::instrument(skip(self, record), fields(owner = %record.owner, document_type = %record.document_type))]
    async fn insert(&self, record: NewUploadRecord) -> Result<UploadRecord, AppError> {
        let sql = format!(
            r#"
            INSERT INTO upload_records (
                id, owner_entity_type, owner_entity_id, document_type, upload_token,
                storage_key, original_file_name, status, mime_type, declared_size_bytes,
                version_number, expires_at, failed_attempts, revision, uploaded_by_user_id,
                moderation_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, 1, $10, 0, 0, $11,
                    'unreviewed', $12, $12)
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let result = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(record.id)
            .bind(record.owner.entity_type)
            .bind(record.owner.entity_id)
            .bind(record.document_type)
            .bind(&record.upload_token)
            .bind(&record.storage_key)
            .bind(&record.original_file_name)
            .bind(&record.mime_type)
            .bind(record.declared_size_bytes)
            .bind(record.expires_at)
            .bind(record.uploaded_by_user_id)
            .bind(record.created_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => Ok(row),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(
                "Upload token or storage key already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_token(&self, upload_token: &str) -> Result<Option<UploadRecord>, AppError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM upload_records WHERE upload_token = $1");
        let row = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(upload_token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UploadRecord>, AppError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM upload_records WHERE id = $1");
        let row = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self, object))]
    async fn mark_confirmed(
        &self,
        id: Uuid,
        expected_revision: i64,
        object: &VerifiedObject,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        let sql = format!(
            r#"
            UPDATE upload_records
            SET status = 'confirmed',
                actual_size_bytes = $3,
                etag = $4,
                storage_last_modified_at = $5,
                uploaded_at = $6,
                revision = revision + 1,
                updated_at = $6
            WHERE id = $1 AND revision = $2 AND status = 'pending'
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(id)
            .bind(expected_revision)
            .bind(object.size_bytes)
            .bind(&object.etag)
            .bind(object.last_modified)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self, failure))]
    async fn record_failed_attempt(
        &self,
        id: Uuid,
        expected_revision: i64,
        failure: &FailedAttempt,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        let ceiling = attempt_ceiling(max_attempts)?;
        let sql = format!(
            r#"
            UPDATE upload_records
            SET failed_attempts = LEAST(failed_attempts + 1, $3),
                status = CASE
                    WHEN failed_attempts + 1 >= $3 THEN 'failed'::upload_status
                    ELSE status
                END,
                last_failure_fingerprint = $4,
                last_failure_reason = $5,
                revision = revision + 1,
                updated_at = $6
            WHERE id = $1 AND revision = $2 AND status = 'pending'
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(id)
            .bind(expected_revision)
            .bind(ceiling)
            .bind(&failure.fingerprint)
            .bind(&failure.reason)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_orphaned(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        let sql = format!(
            r#"
            UPDATE upload_records
            SET status = 'orphaned', revision = revision + 1, updated_at = $3
            WHERE id = $1 AND revision = $2 AND status = 'pending'
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(id)
            .bind(expected_revision)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Uses FOR UPDATE SKIP LOCKED so concurrent reapers claim disjoint rows
    #[tracing::instrument(skip(self))]
    async fn claim_expired(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<UploadRecord>, AppError> {
        let sql = format!(
            r#"
            UPDATE upload_records
            SET status = 'orphaned', revision = revision + 1, updated_at = $1
            WHERE id IN (
                SELECT id FROM upload_records
                WHERE status = 'pending' AND expires_at <= $1
                ORDER BY expires_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            AND status = 'pending'
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let rows = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(old_id = %link.old_id, new_id = %link.new_id))]
    async fn link_replacement(
        &self,
        link: &ReplacementLink,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let claimed: Result<Option<(Uuid,)>, sqlx::Error> = sqlx::query_as(
            r#"
            UPDATE upload_records
            SET superseded_by_id = $2, revision = revision + 1, updated_at = $3
            WHERE id = $1 AND status = 'confirmed' AND superseded_by_id IS NULL
            RETURNING id
            "#,
        )
        .bind(link.old_id)
        .bind(link.new_id)
        .bind(now)
        .fetch_optional(tx.conn()?)
        .await;

        match claimed {
            Ok(Some(_)) => {}
            Ok(None) => {
                tx.rollback().await?;
                return Ok(None);
            }
            // The new record is already claimed as another record's successor
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let sql = format!(
            r#"
            UPDATE upload_records
            SET replacement_of_id = $2,
                version_of_id = $3,
                version_number = $4,
                revision = revision + 1,
                updated_at = $5
            WHERE id = $1
              AND status = 'confirmed'
              AND replacement_of_id IS NULL
              AND version_of_id IS NULL
              AND superseded_by_id IS NULL
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let linked = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(link.new_id)
            .bind(link.old_id)
            .bind(link.version_of_id)
            .bind(link.version_number)
            .bind(now)
            .fetch_optional(tx.conn()?)
            .await;

        match linked {
            Ok(Some(record)) => {
                tx.commit().await?;
                Ok(Some(record))
            }
            Ok(None) => {
                tx.rollback().await?;
                Ok(None)
            }
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn current_for_slot(
        &self,
        slot: &DocumentSlot,
    ) -> Result<Option<UploadRecord>, AppError> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM upload_records
            WHERE owner_entity_type = $1
              AND owner_entity_id = $2
              AND document_type = $3
              AND status = 'confirmed'
              AND superseded_by_id IS NULL
            ORDER BY version_number DESC, uploaded_at DESC NULLS LAST
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(slot.owner.entity_type)
            .bind(slot.owner.entity_id)
            .bind(slot.document_type)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn chain(&self, root_id: Uuid) -> Result<Vec<UploadRecord>, AppError> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM upload_records
            WHERE id = $1 OR version_of_id = $1
            ORDER BY version_number ASC, created_at ASC
            "#
        );
        let rows = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(root_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn set_moderation(
        &self,
        id: Uuid,
        status: ModerationStatus,
        moderator_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UploadRecord>, AppError> {
        let sql = format!(
            r#"
            UPDATE upload_records
            SET moderation_status = $2,
                verified_by_user_id = $3,
                verified_at = $4,
                revision = revision + 1,
                updated_at = $4
            WHERE id = $1 AND status = 'confirmed'
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UploadRecord>(&sql)
            .bind(id)
            .bind(status)
            .bind(moderator_user_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
