//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::Result;
use std::sync::Arc;
use vitrina_core::Config;
use vitrina_services::ReaperHandle;

/// Everything `main` needs to serve and later shut down
pub struct Application {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub reaper: Option<ReaperHandle>,
}

/// Initialize the entire application
pub async fn initialize_app(config: &Config) -> Result<Application> {
    crate::telemetry::init_telemetry(config.is_production())?;
    tracing::info!(environment = %config.environment, "Configuration loaded and validated");

    let pool = database::setup_database(config).await?;
    let storage = storage::setup_storage(config)?;
    let (state, reaper) = services::initialize_services(config, pool, storage);
    let router = routes::setup_routes(state.clone(), &routes::RouteOptions::from_config(config));

    Ok(Application {
        state,
        router,
        reaper,
    })
}
