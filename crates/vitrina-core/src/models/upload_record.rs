//! Upload record model shared by every owner kind (commerce, branch, product).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Kind of marketplace entity a document belongs to (matches database enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "owner_entity_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OwnerEntityType {
    Commerce,
    CommerceBranch,
    Product,
}

impl OwnerEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerEntityType::Commerce => "commerce",
            OwnerEntityType::CommerceBranch => "commerce_branch",
            OwnerEntityType::Product => "product",
        }
    }
}

impl FromStr for OwnerEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "commerce" => Ok(OwnerEntityType::Commerce),
            "commerce_branch" | "branch" => Ok(OwnerEntityType::CommerceBranch),
            "product" => Ok(OwnerEntityType::Product),
            _ => Err(format!("Invalid owner entity type: {}", s)),
        }
    }
}

impl Display for OwnerEntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Broad family of a document type; size ceilings and MIME allow-lists are set per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentCategory {
    /// Legal paperwork (scans or PDFs)
    Document,
    /// Catalogue and storefront pictures
    Photo,
}

/// Logical document kind stored in a slot (matches database enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "document_type", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    IdCard,
    CommerceChamber,
    TaxRegistration,
    BranchPhoto,
    ProductPhoto,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::IdCard => "id_card",
            DocumentType::CommerceChamber => "commerce_chamber",
            DocumentType::TaxRegistration => "tax_registration",
            DocumentType::BranchPhoto => "branch_photo",
            DocumentType::ProductPhoto => "product_photo",
        }
    }

    pub fn category(&self) -> DocumentCategory {
        match self {
            DocumentType::IdCard | DocumentType::CommerceChamber | DocumentType::TaxRegistration => {
                DocumentCategory::Document
            }
            DocumentType::BranchPhoto | DocumentType::ProductPhoto => DocumentCategory::Photo,
        }
    }

    /// The only owner kind allowed to hold this document type.
    pub fn owner_kind(&self) -> OwnerEntityType {
        match self {
            DocumentType::IdCard | DocumentType::CommerceChamber | DocumentType::TaxRegistration => {
                OwnerEntityType::Commerce
            }
            DocumentType::BranchPhoto => OwnerEntityType::CommerceBranch,
            DocumentType::ProductPhoto => OwnerEntityType::Product,
        }
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "id_card" => Ok(DocumentType::IdCard),
            "commerce_chamber" => Ok(DocumentType::CommerceChamber),
            "tax_registration" => Ok(DocumentType::TaxRegistration),
            "branch_photo" => Ok(DocumentType::BranchPhoto),
            "product_photo" => Ok(DocumentType::ProductPhoto),
            _ => Err(format!("Invalid document type: {}", s)),
        }
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Upload state machine (matches database enum)
///
/// `Pending` is the only non-terminal state. `Confirmed`, `Failed` and `Orphaned` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "upload_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Confirmed,
    Failed,
    Orphaned,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Confirmed => "confirmed",
            UploadStatus::Failed => "failed",
            UploadStatus::Orphaned => "orphaned",
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Human moderation status layered on top of a confirmed upload (matches database enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "moderation_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Unreviewed,
    Approved,
    Rejected,
}

/// Outcome a moderator can record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModerationDecision {
    Approved,
    Rejected,
}

impl From<ModerationDecision> for ModerationStatus {
    fn from(decision: ModerationDecision) -> Self {
        match decision {
            ModerationDecision::Approved => ModerationStatus::Approved,
            ModerationDecision::Rejected => ModerationStatus::Rejected,
        }
    }
}

/// Polymorphic reference to the entity owning a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub entity_type: OwnerEntityType,
    pub entity_id: i64,
}

impl Display for OwnerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// A logical document slot: one owner, one document type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentSlot {
    pub owner: OwnerRef,
    pub document_type: DocumentType,
}

/// Upload record (database representation)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct UploadRecord {
    pub id: Uuid,
    pub owner_entity_type: OwnerEntityType,
    pub owner_entity_id: i64,
    pub document_type: DocumentType,
    /// Opaque confirm handle; never exposed after issuance except to the uploader
    #[serde(skip_serializing)]
    pub upload_token: String,
    pub storage_key: String,
    pub original_file_name: String,
    pub status: UploadStatus,
    pub mime_type: String,
    pub declared_size_bytes: i64,
    pub actual_size_bytes: Option<i64>,
    pub etag: Option<String>,
    pub storage_last_modified_at: Option<DateTime<Utc>>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub replacement_of_id: Option<Uuid>,
    pub version_of_id: Option<Uuid>,
    pub version_number: i32,
    pub superseded_by_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub failed_attempts: i32,
    #[serde(skip_serializing)]
    pub last_failure_fingerprint: Option<String>,
    pub last_failure_reason: Option<String>,
    pub revision: i64,
    pub uploaded_by_user_id: i64,
    pub moderation_status: ModerationStatus,
    pub verified_by_user_id: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn owner(&self) -> OwnerRef {
        OwnerRef {
            entity_type: self.owner_entity_type,
            entity_id: self.owner_entity_id,
        }
    }

    pub fn slot(&self) -> DocumentSlot {
        DocumentSlot {
            owner: self.owner(),
            document_type: self.document_type,
        }
    }

    /// Id of the first record of this record's version chain.
    pub fn chain_root_id(&self) -> Uuid {
        self.version_of_id.unwrap_or(self.id)
    }

    /// Confirm attempts left before the record is forced into `Failed`.
    pub fn attempts_remaining(&self, max_attempts: u32) -> u32 {
        max_attempts.saturating_sub(self.failed_attempts.max(0) as u32)
    }

    /// Short, non-secret token prefix for log fields.
    pub fn token_hint(&self) -> &str {
        token_hint(&self.upload_token)
    }
}

/// Fields required to persist a new `Pending` record
#[derive(Debug, Clone)]
pub struct NewUploadRecord {
    pub id: Uuid,
    pub owner: OwnerRef,
    pub document_type: DocumentType,
    pub upload_token: String,
    pub storage_key: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub declared_size_bytes: i64,
    pub uploaded_by_user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Object metadata that passed verification and is persisted on confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedObject {
    pub size_bytes: i64,
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Short prefix of an upload token, safe to log.
pub fn token_hint(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(idx, _)| idx)
        .unwrap_or(token.len());
    &token[..end]
}

fn normalize_token(s: &str) -> String {
    s.trim().to_lowercase().replace(['-', ' '], "_")
}
