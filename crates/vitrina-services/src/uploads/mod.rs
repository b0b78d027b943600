//! Upload lifecycle services
//!
//! Control flow: `TokenIssuer` opens an intent, the client PUTs bytes straight to object
//! storage, `UploadConfirmer` verifies the object and settles the record, and
//! `VersionChain` optionally links it as the successor of an earlier upload.
//! `ExpiryReaper` runs on its own timer and reclaims intents nobody confirmed.

mod confirmer;
mod issuer;
mod moderation;
mod reaper;
mod version_chain;

pub use confirmer::{ClientReportedMetadata, UploadConfirmer};
pub use issuer::{generate_upload_token, IssueUploadIntent, IssuedIntent, TokenIssuer};
pub use moderation::ModerationService;
pub use reaper::{ExpiryReaper, ReaperHandle, SweepReport};
pub use version_chain::VersionChain;

use std::future::Future;
use std::time::Duration;
use vitrina_core::AppError;
use vitrina_storage::{StorageError, StorageResult};

/// Map a storage failure onto the service error taxonomy.
pub(crate) fn storage_error(err: StorageError) -> AppError {
    if err.is_transient() {
        AppError::TransientStorage(err.to_string())
    } else {
        AppError::Storage(err.to_string())
    }
}

/// Run an object storage call under `limit`. Elapsing the limit is a transient failure.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> Result<T, AppError>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(storage_error(err)),
        Err(_) => Err(AppError::TransientStorage(format!(
            "{}: {}",
            operation,
            StorageError::Timeout(limit)
        ))),
    }
}
