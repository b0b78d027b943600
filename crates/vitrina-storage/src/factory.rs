#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{ObjectStorage, StorageError, StorageResult};
use std::sync::Arc;
use vitrina_core::StorageConfig;

/// Create the object storage backend from configuration
pub fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStorage>> {
    if config.bucket.trim().is_empty() {
        return Err(StorageError::ConfigError(
            "S3_BUCKET not configured".to_string(),
        ));
    }

    #[cfg(feature = "storage-s3")]
    {
        let credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => Some((key.clone(), secret.clone())),
            _ => None,
        };
        let storage = S3Storage::new(
            config.bucket.clone(),
            config.region.clone(),
            config.endpoint.clone(),
            credentials,
        )?;
        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Object storage initialized"
        );
        Ok(Arc::new(storage))
    }

    #[cfg(not(feature = "storage-s3"))]
    Err(StorageError::ConfigError(
        "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
    ))
}
