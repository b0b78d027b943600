use async_trait::async_trait;
use sqlx::PgPool;
use vitrina_core::{AppError, OwnerEntityType, OwnerRef};

/// Existence checks for the marketplace entities that own documents
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn exists(&self, owner: &OwnerRef) -> Result<bool, AppError>;
}

/// Owner lookups against the commerce, branch and product tables
#[derive(Clone)]
pub struct PgOwnerDirectory {
    pool: PgPool,
}

impl PgOwnerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn table_for(entity_type: OwnerEntityType) -> &'static str {
        match entity_type {
            OwnerEntityType::Commerce => "commerces",
            OwnerEntityType::CommerceBranch => "commerce_branches",
            OwnerEntityType::Product => "products",
        }
    }
}

#[async_trait]
impl OwnerDirectory for PgOwnerDirectory {
    #[tracing::instrument(skip(self), fields(owner = %owner))]
    async fn exists(&self, owner: &OwnerRef) -> Result<bool, AppError> {
        // Table name comes from a closed enum, never from input
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND deleted_at IS NULL)",
            Self::table_for(owner.entity_type)
        );
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(owner.entity_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}
