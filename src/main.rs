use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use c2b_gateway::{
    build_router,
    config::{AppConfig, StorageBackend},
    database::{connection::get_db_client, MemoryStore, MongoStore, Store},
    services::{daraja_service::DarajaService, token_cache::InMemoryTokenCache},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!("🔧 Configuration: {}", config.get_config_info());

    let store = initialize_store(&config).await?;

    let daraja = DarajaService::new(
        &config.daraja_base_url,
        config.daraja_timeout,
        Arc::new(InMemoryTokenCache::new()),
    )
    .context("failed to build Daraja client")?;
    tracing::info!("🌐 Daraja: {} ({})", config.daraja_base_url, config.mpesa_environment);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("HOST/PORT do not form a socket address")?;

    let app_state = AppState::new(config, store, Arc::new(daraja));
    let app = build_router(app_state);

    tracing::info!("🚀 Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

async fn initialize_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.storage_backend {
        StorageBackend::MongoDb => {
            let db = get_db_client(config)
                .await
                .context("failed to connect to MongoDB")?;
            Ok(Arc::new(MongoStore::new(db)))
        }
        StorageBackend::Memory => {
            tracing::warn!("⚠️ Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
