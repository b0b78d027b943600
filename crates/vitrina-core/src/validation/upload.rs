//! Upload intent validation: document type, owner compatibility, MIME allow-list, size ceiling.
//!
//! Everything here runs before any database or storage interaction.

use crate::config::UploadPolicy;
use crate::error::AppError;
use crate::models::{DocumentType, OwnerEntityType};

const MAX_FILENAME_LENGTH: usize = 255;

/// Typed, policy-checked view of a presign request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIntent {
    pub owner_entity_type: OwnerEntityType,
    pub document_type: DocumentType,
    /// Lowercased MIME type without parameters
    pub mime_type: String,
    pub file_name: String,
    pub size_bytes: u64,
}

pub fn parse_document_type(value: &str) -> Result<DocumentType, AppError> {
    value
        .parse::<DocumentType>()
        .map_err(AppError::InvalidDocumentType)
}

pub fn parse_owner_entity_type(value: &str) -> Result<OwnerEntityType, AppError> {
    value
        .parse::<OwnerEntityType>()
        .map_err(AppError::InvalidInput)
}

/// Reject a document type that the owner kind cannot hold (e.g. PRODUCT_PHOTO on a commerce).
pub fn validate_owner_compatibility(
    owner_entity_type: OwnerEntityType,
    document_type: DocumentType,
) -> Result<(), AppError> {
    if document_type.owner_kind() != owner_entity_type {
        return Err(AppError::InvalidDocumentType(format!(
            "{} is not accepted for owner type {}",
            document_type, owner_entity_type
        )));
    }
    Ok(())
}

/// Normalize MIME type by stripping parameters (e.g. "image/jpeg; charset=utf-8" -> "image/jpeg").
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
        .to_lowercase()
}

/// Validate content type against the allow-list of the document type.
pub fn validate_content_type(
    content_type: &str,
    document_type: DocumentType,
    policy: &UploadPolicy,
) -> Result<String, AppError> {
    let normalized = normalize_mime_type(content_type);
    let allowed = policy.allowed_content_types_for(document_type);
    if !allowed.iter().any(|ct| normalized == ct.to_lowercase()) {
        return Err(AppError::UnsupportedMimeType {
            mime_type: content_type.to_string(),
            document_type: document_type.to_string(),
        });
    }
    Ok(normalized)
}

pub fn validate_file_size(
    size_bytes: u64,
    document_type: DocumentType,
    policy: &UploadPolicy,
) -> Result<(), AppError> {
    if size_bytes == 0 {
        return Err(AppError::InvalidInput(
            "File size must be at least 1 byte".to_string(),
        ));
    }
    let max = policy.max_size_for(document_type);
    if size_bytes > max {
        return Err(AppError::FileTooLarge {
            size: size_bytes,
            max,
        });
    }
    Ok(())
}

/// Sanitize filename to prevent path traversal and invalid characters.
/// Returns an error if the filename contains path traversal attempts.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    if filename_only.contains("..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches('_').is_empty() {
        return Ok("file".to_string());
    }

    Ok(sanitized)
}

/// Run every presign check in order: type, owner compatibility, MIME, size, filename.
pub fn validate_upload_intent(
    owner_entity_type: &str,
    document_type: &str,
    mime_type: &str,
    size_bytes: u64,
    file_name: &str,
    policy: &UploadPolicy,
) -> Result<ValidatedIntent, AppError> {
    let document_type = parse_document_type(document_type)?;
    let owner_entity_type = parse_owner_entity_type(owner_entity_type)?;
    validate_owner_compatibility(owner_entity_type, document_type)?;
    let mime_type = validate_content_type(mime_type, document_type, policy)?;
    validate_file_size(size_bytes, document_type, policy)?;
    let file_name = sanitize_filename(file_name)?;

    Ok(ValidatedIntent {
        owner_entity_type,
        document_type,
        mime_type,
        file_name,
        size_bytes,
    })
}

/// Canonical ETag form for comparisons: weak prefix and surrounding quotes removed, lowercased.
pub fn normalize_etag(etag: &str) -> String {
    let trimmed = etag.trim();
    let without_weak = trimmed
        .strip_prefix("W/")
        .or_else(|| trimmed.strip_prefix("w/"))
        .unwrap_or(trimmed);
    without_weak.trim_matches('"').to_lowercase()
}
