//! Error types module
//!
//! All upload-lifecycle failures are unified under the `AppError` enum. Variants map onto
//! the error taxonomy the HTTP layer exposes: validation errors, missing records, conflicts,
//! transient storage failures, verification mismatches and terminal ("gone") uploads.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::UploadStatus;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues and counted verification failures
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage temporarily unavailable: {0}")]
    TransientStorage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid document type: {0}")]
    InvalidDocumentType(String),

    #[error("Unsupported MIME type {mime_type} for {document_type}")]
    UnsupportedMimeType {
        mime_type: String,
        document_type: String,
    },

    #[error("File too large: {size} bytes exceeds max {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Owner entity not found: {0}")]
    OwnerEntityNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Version conflict: {0}")]
    VersionConflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Verification mismatch ({attempts_remaining} attempts remaining): {reason}")]
    VerificationMismatch {
        attempts_remaining: u32,
        terminal: bool,
        reason: String,
    },

    #[error("Upload is {status} and can no longer be confirmed")]
    UploadGone {
        status: UploadStatus,
        attempts_remaining: u32,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::TransientStorage(_) => (
            503,
            "STORAGE_UNAVAILABLE",
            true,
            Some("Retry the same request after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::InvalidInput(_) => (
            422,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidDocumentType(_) => (
            422,
            "INVALID_DOCUMENT_TYPE",
            false,
            Some("Use a document type accepted for this owner"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedMimeType { .. } => (
            422,
            "UNSUPPORTED_MIME_TYPE",
            false,
            Some("Upload a file in one of the accepted formats"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooLarge { .. } => (
            422,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce file size and request a new upload"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::OwnerEntityNotFound(_) => (
            404,
            "OWNER_NOT_FOUND",
            false,
            Some("Verify the owner entity exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            false,
            Some("Re-read the resource before retrying"),
            false,
            LogLevel::Warn,
        ),
        AppError::VersionConflict(_) => (
            409,
            "VERSION_CONFLICT",
            true,
            Some("Fetch the current document version and retry"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidState(_) => (
            409,
            "INVALID_STATE",
            false,
            Some("Check the document status before retrying"),
            false,
            LogLevel::Debug,
        ),
        AppError::VerificationMismatch { .. } => (
            409,
            "VERIFICATION_MISMATCH",
            true,
            Some("Re-upload the file to the presigned URL and confirm again"),
            false,
            LogLevel::Warn,
        ),
        AppError::UploadGone { .. } => (
            410,
            "UPLOAD_GONE",
            false,
            Some("Request a new upload intent"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the caller identity supplied by the gateway"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::TransientStorage(_) => "TransientStorage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::InvalidDocumentType(_) => "InvalidDocumentType",
            AppError::UnsupportedMimeType { .. } => "UnsupportedMimeType",
            AppError::FileTooLarge { .. } => "FileTooLarge",
            AppError::NotFound(_) => "NotFound",
            AppError::OwnerEntityNotFound(_) => "OwnerEntityNotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::VersionConflict(_) => "VersionConflict",
            AppError::InvalidState(_) => "InvalidState",
            AppError::VerificationMismatch { .. } => "VerificationMismatch",
            AppError::UploadGone { .. } => "UploadGone",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::TransientStorage(_) => {
                "Storage is temporarily unavailable, please retry".to_string()
            }
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::BadRequest(ref msg) => msg.clone(),
            AppError::InvalidDocumentType(ref msg) => msg.clone(),
            AppError::UnsupportedMimeType {
                mime_type,
                document_type,
            } => format!(
                "MIME type '{}' is not accepted for {}",
                mime_type, document_type
            ),
            AppError::FileTooLarge { size, max } => {
                format!("File too large: {} bytes exceeds max {} bytes", size, max)
            }
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::OwnerEntityNotFound(ref msg) => msg.clone(),
            AppError::Conflict(ref msg) => msg.clone(),
            AppError::VersionConflict(ref msg) => msg.clone(),
            AppError::InvalidState(ref msg) => msg.clone(),
            AppError::VerificationMismatch {
                attempts_remaining,
                reason,
                ..
            } => format!(
                "Uploaded object does not match the declared file ({}); {} attempts remaining",
                reason, attempts_remaining
            ),
            AppError::UploadGone { status, .. } => {
                format!("Upload is {} and can no longer be confirmed", status)
            }
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_validation_errors_are_unprocessable() {
        let errors = [
            AppError::InvalidDocumentType("PASSPORT".to_string()),
            AppError::UnsupportedMimeType {
                mime_type: "text/html".to_string(),
                document_type: "ID_CARD".to_string(),
            },
            AppError::FileTooLarge { size: 10, max: 5 },
            AppError::InvalidInput("file_name is empty".to_string()),
        ];
        for err in errors {
            assert_eq!(err.http_status_code(), 422, "{}", err.error_type());
            assert!(!err.is_recoverable());
            assert_eq!(err.log_level(), LogLevel::Debug);
        }
    }

    #[test]
    fn test_transient_storage_is_retryable() {
        let err = AppError::TransientStorage("HEAD timed out after 5s".to_string());
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "STORAGE_UNAVAILABLE");
        assert!(err.is_recoverable());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("HEAD"));
    }

    #[test]
    fn test_conflict_family() {
        let version = AppError::VersionConflict("already superseded".to_string());
        assert_eq!(version.http_status_code(), 409);
        assert_eq!(version.error_code(), "VERSION_CONFLICT");

        let mismatch = AppError::VerificationMismatch {
            attempts_remaining: 4,
            terminal: false,
            reason: "size 190000 != declared 204800".to_string(),
        };
        assert_eq!(mismatch.http_status_code(), 409);
        assert!(mismatch.client_message().contains("4 attempts remaining"));
    }

    #[test]
    fn test_upload_gone_metadata() {
        let err = AppError::UploadGone {
            status: UploadStatus::Orphaned,
            attempts_remaining: 0,
        };
        assert_eq!(err.http_status_code(), 410);
        assert_eq!(err.error_code(), "UPLOAD_GONE");
        assert!(err.client_message().contains("orphaned"));
        assert_eq!(
            err.suggested_action(),
            Some("Request a new upload intent")
        );
    }
}
