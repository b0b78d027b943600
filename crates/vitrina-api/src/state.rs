//! Application state shared by all handlers.

use sqlx::PgPool;
use std::sync::Arc;
use vitrina_services::{
    ModerationService, ObjectStorage, TokenIssuer, UploadConfirmer, VersionChain,
};

#[derive(Clone)]
pub struct AppState {
    /// `None` when the store is not Postgres-backed (tests); health then skips the database probe.
    pub db_pool: Option<PgPool>,
    pub storage: Arc<dyn ObjectStorage>,
    pub issuer: Arc<TokenIssuer>,
    pub confirmer: Arc<UploadConfirmer>,
    pub versions: Arc<VersionChain>,
    pub moderation: Arc<ModerationService>,
}
