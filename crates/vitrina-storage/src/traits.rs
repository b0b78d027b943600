//! Storage abstraction trait
//!
//! This module defines the `ObjectStorage` trait the upload services talk to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Signing happens locally, so `PresignFailed` points at credentials or configuration
    /// and is never retryable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::BackendError(_)
                | StorageError::Timeout(_)
                | StorageError::DeleteFailed(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Authoritative object metadata returned by a HEAD lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
    pub e_tag: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// Object storage abstraction trait
///
/// Byte transport never goes through this service: clients PUT directly to the presigned
/// URL, and the server only signs, inspects and removes objects.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Generate a presigned PUT URL for a direct upload to `storage_key`.
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Fetch object metadata. `Ok(None)` means the object does not exist.
    async fn head(&self, storage_key: &str) -> StorageResult<Option<ObjectMetadata>>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}
