//! Test helpers for the upload services
//!
//! In-memory collaborators plus a harness wiring every service against them.

pub mod memory_store;
pub mod mock_owners;
pub mod mock_storage;

pub use memory_store::InMemoryUploadRecordStore;
pub use mock_owners::MockOwnerDirectory;
pub use mock_storage::MockObjectStorage;

use std::sync::Arc;
use vitrina_core::models::token_hint;
use vitrina_core::{DocumentType, OwnerEntityType, ReaperConfig, UploadPolicy, UploadRecord};

use crate::uploads::{
    ClientReportedMetadata, ExpiryReaper, IssueUploadIntent, ModerationService, TokenIssuer,
    UploadConfirmer, VersionChain,
};

/// Size used by `UploadHarness::issue_and_confirm`
pub const HARNESS_UPLOAD_SIZE: u64 = 1024;

pub fn intent(
    owner_type: &str,
    owner_id: i64,
    document_type: &str,
    file_name: &str,
    mime_type: &str,
    size_bytes: u64,
) -> IssueUploadIntent {
    IssueUploadIntent {
        owner_entity_type: owner_type.to_string(),
        owner_entity_id: owner_id,
        document_type: document_type.to_string(),
        file_name: file_name.to_string(),
        mime_type: mime_type.to_string(),
        size_bytes,
        requested_by_user_id: 7,
    }
}

pub fn reported(etag: &str, size: u64) -> ClientReportedMetadata {
    ClientReportedMetadata {
        etag: etag.to_string(),
        size,
        last_modified: None,
    }
}

pub struct UploadHarness {
    pub store: Arc<InMemoryUploadRecordStore>,
    pub storage: Arc<MockObjectStorage>,
    pub owners: Arc<MockOwnerDirectory>,
    pub policy: UploadPolicy,
    pub issuer: Arc<TokenIssuer>,
    pub confirmer: Arc<UploadConfirmer>,
    pub versions: Arc<VersionChain>,
    pub moderation: Arc<ModerationService>,
}

impl Default for UploadHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadHarness {
    pub fn new() -> Self {
        Self::with_policy(UploadPolicy::default())
    }

    /// Seeded owners: commerces 1 and 42, branch 7, product 5.
    pub fn with_policy(policy: UploadPolicy) -> Self {
        let store = Arc::new(InMemoryUploadRecordStore::new());
        let storage = Arc::new(MockObjectStorage::new());
        let owners = Arc::new(MockOwnerDirectory::new());
        owners.add(OwnerEntityType::Commerce, 1);
        owners.add(OwnerEntityType::Commerce, 42);
        owners.add(OwnerEntityType::CommerceBranch, 7);
        owners.add(OwnerEntityType::Product, 5);

        let issuer = Arc::new(TokenIssuer::new(
            store.clone(),
            storage.clone(),
            owners.clone(),
            policy.clone(),
        ));
        let confirmer = Arc::new(UploadConfirmer::new(
            store.clone(),
            storage.clone(),
            policy.clone(),
        ));
        let versions = Arc::new(VersionChain::new(store.clone()));
        let moderation = Arc::new(ModerationService::new(store.clone()));

        Self {
            store,
            storage,
            owners,
            policy,
            issuer,
            confirmer,
            versions,
            moderation,
        }
    }

    pub fn reaper(&self, config: ReaperConfig) -> Arc<ExpiryReaper> {
        Arc::new(ExpiryReaper::new(
            self.store.clone(),
            self.storage.clone(),
            config,
            self.policy.storage_timeout,
        ))
    }

    /// Issue an intent, land a matching object and confirm it.
    pub async fn issue_and_confirm(
        &self,
        owner_type: &str,
        owner_id: i64,
        document_type: &str,
    ) -> UploadRecord {
        let (file_name, mime_type) = match document_type.parse::<DocumentType>() {
            Ok(DocumentType::BranchPhoto | DocumentType::ProductPhoto) => ("photo.jpg", "image/jpeg"),
            _ => ("document.pdf", "application/pdf"),
        };
        let issued = self
            .issuer
            .issue(intent(
                owner_type,
                owner_id,
                document_type,
                file_name,
                mime_type,
                HARNESS_UPLOAD_SIZE,
            ))
            .await
            .expect("issue upload intent");

        let etag = format!("etag-{}", token_hint(&issued.record.upload_token));
        self.storage
            .put_object(&issued.record.storage_key, HARNESS_UPLOAD_SIZE, &etag);
        self.confirmer
            .confirm(
                &issued.record.upload_token,
                &reported(&etag, HARNESS_UPLOAD_SIZE),
            )
            .await
            .expect("confirm upload")
    }
}
