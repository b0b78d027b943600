//! Service wiring

use crate::state::AppState;
use sqlx::PgPool;
use std::sync::Arc;
use vitrina_core::{Config, UploadPolicy};
use vitrina_db::{PgOwnerDirectory, PgUploadRecordRepository};
use vitrina_services::{
    ExpiryReaper, ModerationService, ObjectStorage, OwnerDirectory, ReaperHandle, TokenIssuer,
    UploadConfirmer, UploadRecordStore, VersionChain,
};

/// Build the services on top of Postgres and start the expiry reaper when enabled.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn ObjectStorage>,
) -> (Arc<AppState>, Option<ReaperHandle>) {
    let store: Arc<dyn UploadRecordStore> = Arc::new(PgUploadRecordRepository::new(pool.clone()));
    let owners: Arc<dyn OwnerDirectory> = Arc::new(PgOwnerDirectory::new(pool.clone()));

    let reaper = if config.reaper.enabled {
        let reaper = Arc::new(ExpiryReaper::new(
            store.clone(),
            storage.clone(),
            config.reaper.clone(),
            config.upload.storage_timeout,
        ));
        Some(reaper.start())
    } else {
        tracing::info!("Expiry reaper disabled");
        None
    };

    let state = build_state(Some(pool), store, owners, storage, config.upload.clone());
    (state, reaper)
}

/// Assemble `AppState` from its collaborators.
pub fn build_state(
    db_pool: Option<PgPool>,
    store: Arc<dyn UploadRecordStore>,
    owners: Arc<dyn OwnerDirectory>,
    storage: Arc<dyn ObjectStorage>,
    policy: UploadPolicy,
) -> Arc<AppState> {
    Arc::new(AppState {
        db_pool,
        issuer: Arc::new(TokenIssuer::new(
            store.clone(),
            storage.clone(),
            owners,
            policy.clone(),
        )),
        confirmer: Arc::new(UploadConfirmer::new(store.clone(), storage.clone(), policy)),
        versions: Arc::new(VersionChain::new(store.clone())),
        moderation: Arc::new(ModerationService::new(store)),
        storage,
    })
}
