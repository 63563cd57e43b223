use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::constants::EVENT_UPSERT_CHUNK_SIZE;
use crate::db::{CursorStore, EventStore};
use crate::models::{DecodedEvent, SyncCursor};

#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CursorStore for PgEventStore {
    async fn get_cursor(&self, chain_id: u64, contract_address: &str) -> Result<Option<SyncCursor>> {
        let cursor = sqlx::query_as::<_, SyncCursor>(
            r#"
            SELECT chain_id, contract_address, last_synced_block_number, updated_at
            FROM contract_event_sync_status
            WHERE chain_id = $1 AND contract_address = $2
            "#,
        )
        .bind(chain_id as i64)
        .bind(contract_address)
        .fetch_optional(&self.pool)
        .await
        .context("reading sync cursor")?;

        Ok(cursor)
    }

    /// `GREATEST` keeps the stored cursor from ever moving backwards, even
    /// if an out-of-date writer slips through.
    async fn upsert_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contract_event_sync_status (chain_id, contract_address, last_synced_block_number, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (chain_id, contract_address) DO UPDATE
            SET last_synced_block_number = GREATEST(
                    contract_event_sync_status.last_synced_block_number,
                    EXCLUDED.last_synced_block_number
                ),
                updated_at = NOW()
            "#,
        )
        .bind(cursor.chain_id)
        .bind(&cursor.contract_address)
        .bind(cursor.last_synced_block_number)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!("upserting cursor at block {}", cursor.last_synced_block_number)
        })?;

        Ok(())
    }
}

impl EventStore for PgEventStore {
    async fn upsert_events(&self, events: &[DecodedEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for chunk in events.chunks(EVENT_UPSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO contract_events \
                 (chain_id, contract_address, block_number, log_index, transaction_hash, name, args) ",
            );
            builder.push_values(chunk, |mut row, event| {
                row.push_bind(event.chain_id)
                    .push_bind(&event.contract_address)
                    .push_bind(event.block_number)
                    .push_bind(event.log_index)
                    .push_bind(&event.transaction_hash)
                    .push_bind(&event.name)
                    .push_bind(&event.args);
            });
            // Events are immutable once stored; a replayed window leaves them untouched.
            builder.push(
                " ON CONFLICT (chain_id, contract_address, block_number, log_index) DO NOTHING",
            );

            builder
                .build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("upserting {} events", chunk.len()))?;
        }

        tx.commit().await?;
        Ok(())
    }
}
