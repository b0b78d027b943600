use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::upload_record::{
    DocumentType, ModerationDecision, ModerationStatus, OwnerEntityType, UploadRecord,
    UploadStatus,
};

/// Request to open an upload intent and receive a presigned PUT URL
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct PresignDocumentRequest {
    /// Owner kind: commerce, commerce_branch or product
    #[validate(length(min = 1, max = 50, message = "Owner entity type is required"))]
    pub owner_entity_type: String,
    #[validate(range(min = 1, message = "Owner entity id must be positive"))]
    pub owner_entity_id: i64,
    /// Document type (ID_CARD, COMMERCE_CHAMBER, TAX_REGISTRATION, BRANCH_PHOTO, PRODUCT_PHOTO)
    #[validate(length(min = 1, max = 50, message = "Document type is required"))]
    pub document_type: String,
    /// Original filename
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub file_name: String,
    /// Content type (MIME type)
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub mime_type: String,
    /// File size in bytes
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub file_size_bytes: u64,
}

/// Upload intent handed back to the client
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PresignDocumentResponse {
    /// Token to present when confirming the upload
    pub upload_token: String,
    /// Presigned URL for a direct PUT to object storage
    pub presigned_url: String,
    /// Deadline for confirming the upload
    pub expires_at: DateTime<Utc>,
    /// Deadline for using the presigned URL
    pub upload_url_expires_at: DateTime<Utc>,
    pub storage_key: String,
}

/// Metadata the client observed from the object store after its PUT
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct ReportedObjectMetadata {
    #[validate(length(min = 1, max = 256, message = "ETag is required"))]
    pub etag: String,
    pub size: u64,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Request to confirm a finished upload
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ConfirmDocumentRequest {
    #[validate(length(min = 1, max = 128, message = "Upload token is required"))]
    pub upload_token: String,
    #[validate(nested)]
    pub s3_metadata: ReportedObjectMetadata,
}

/// Outcome of a confirm call
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmDocumentResponse {
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentResponse>,
}

/// Request to link a confirmed upload as the successor of an existing document
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ReplaceDocumentRequest {
    #[validate(length(min = 1, max = 128, message = "New upload token is required"))]
    pub new_upload_token: String,
}

/// Query selecting a document slot
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CurrentDocumentQuery {
    #[validate(length(min = 1, max = 50))]
    pub owner_entity_type: String,
    #[validate(range(min = 1))]
    pub owner_entity_id: i64,
    #[validate(length(min = 1, max = 50))]
    pub document_type: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ModerateDocumentRequest {
    pub decision: ModerationDecision,
}

/// Public view of an upload record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub owner_entity_type: OwnerEntityType,
    pub owner_entity_id: i64,
    pub document_type: DocumentType,
    pub status: UploadStatus,
    pub storage_key: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub declared_size_bytes: i64,
    pub actual_size_bytes: Option<i64>,
    pub etag: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub version_number: i32,
    pub version_of_id: Option<Uuid>,
    pub replacement_of_id: Option<Uuid>,
    pub superseded_by_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub failed_attempts: i32,
    pub uploaded_by_user_id: i64,
    pub moderation_status: ModerationStatus,
    pub verified_by_user_id: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UploadRecord> for DocumentResponse {
    fn from(record: UploadRecord) -> Self {
        Self {
            id: record.id,
            owner_entity_type: record.owner_entity_type,
            owner_entity_id: record.owner_entity_id,
            document_type: record.document_type,
            status: record.status,
            storage_key: record.storage_key,
            original_file_name: record.original_file_name,
            mime_type: record.mime_type,
            declared_size_bytes: record.declared_size_bytes,
            actual_size_bytes: record.actual_size_bytes,
            etag: record.etag,
            uploaded_at: record.uploaded_at,
            version_number: record.version_number,
            version_of_id: record.version_of_id,
            replacement_of_id: record.replacement_of_id,
            superseded_by_id: record.superseded_by_id,
            expires_at: record.expires_at,
            failed_attempts: record.failed_attempts,
            uploaded_by_user_id: record.uploaded_by_user_id,
            moderation_status: record.moderation_status,
            verified_by_user_id: record.verified_by_user_id,
            verified_at: record.verified_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
