pub mod connection;
pub mod contract_events;
pub mod migrations;

use std::future::Future;

use anyhow::Result;

use crate::models::{DecodedEvent, SyncCursor};

pub use connection::{get_db_pool, DatabaseConfig};
pub use contract_events::PgEventStore;

/// Per `(chain, contract address)` high-water marks.
pub trait CursorStore {
    fn get_cursor(
        &self,
        chain_id: u64,
        contract_address: &str,
    ) -> impl Future<Output = Result<Option<SyncCursor>>> + Send;

    fn upsert_cursor(&self, cursor: &SyncCursor) -> impl Future<Output = Result<()>> + Send;
}

/// Decoded events, deduplicated on `(chain_id, contract_address,
/// block_number, log_index)`. Writing a row that already exists is a no-op.
pub trait EventStore {
    fn upsert_events(&self, events: &[DecodedEvent]) -> impl Future<Output = Result<()>> + Send;
}
