use anyhow::{Context, Result};
use sqlx::PgPool;

/// Creates or upgrades `contract_events` and `contract_event_sync_status`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("running contract event migrations")?;
    tracing::info!("Contract event tables are up to date");
    Ok(())
}
