//! Object storage setup

use anyhow::{Context, Result};
use std::sync::Arc;
use vitrina_core::Config;
use vitrina_storage::{create_storage, ObjectStorage};

pub fn setup_storage(config: &Config) -> Result<Arc<dyn ObjectStorage>> {
    let storage = create_storage(&config.storage).context("Failed to initialize object storage")?;
    tracing::info!(backend = storage.backend_name(), "Object storage ready");
    Ok(storage)
}
