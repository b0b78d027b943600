use vitrina_api::setup;
use vitrina_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = setup::initialize_app(&config).await?;
    setup::server::start_server(&config, app.router).await?;

    if let Some(reaper) = app.reaper {
        reaper.shutdown().await;
    }
    tracing::info!("Server stopped");

    Ok(())
}
