use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use vitrina_core::{AppError, OwnerEntityType, OwnerRef};
use vitrina_db::OwnerDirectory;

/// Owner directory backed by a set of known owners
#[derive(Clone, Default)]
pub struct MockOwnerDirectory {
    owners: Arc<Mutex<HashSet<OwnerRef>>>,
}

impl MockOwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, entity_type: OwnerEntityType, entity_id: i64) {
        self.owners.lock().unwrap().insert(OwnerRef {
            entity_type,
            entity_id,
        });
    }
}

#[async_trait]
impl OwnerDirectory for MockOwnerDirectory {
    async fn exists(&self, owner: &OwnerRef) -> Result<bool, AppError> {
        Ok(self.owners.lock().unwrap().contains(owner))
    }
}
