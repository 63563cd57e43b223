use std::sync::Arc;

use gaia_indexer::{
    build_synchronizer,
    db::{migrations::run_migrations, DatabaseConfig},
    get_db_pool,
    handlers::{create_router, AppState},
    utils, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let config = Config::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let pool = get_db_pool(&db_config).await?;

    // Run migrations
    run_migrations(&pool).await?;

    let synchronizer = build_synchronizer(&config, pool)?;
    tracing::info!(
        "Indexing {} contracts across {} chains",
        synchronizer.registry().len(),
        config.chains.len()
    );

    let state = AppState::new(Arc::new(synchronizer), config.request_timeout);
    let app = create_router(state, config.allowed_origins.as_deref());

    let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Server running on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
