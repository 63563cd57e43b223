pub mod abi_registry;
pub mod chain_reader;
pub mod decoder;
pub mod synchronizer;

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use crate::db::PgEventStore;
use crate::utils::Config;

pub use abi_registry::{AbiRegistry, ContractDescriptor};
pub use chain_reader::{AlloyChainReader, ChainReader};
pub use decoder::{DecodeError, EventDecoder};
pub use synchronizer::{AdminTopics, BlockWindow, EventSynchronizer, SyncOutcome};

/// The production wiring: JSON-RPC reads, Postgres writes.
pub type PgSynchronizer = EventSynchronizer<AlloyChainReader, PgEventStore>;

pub fn build_synchronizer(config: &Config, pool: PgPool) -> Result<PgSynchronizer> {
    let registry = AbiRegistry::load(&config.contracts, &config.artifacts_dir)?;
    if registry.is_empty() {
        tracing::warn!("No contracts configured; every sync request will be rejected");
    }

    Ok(EventSynchronizer::new(
        AlloyChainReader::new(&config.chains)?,
        PgEventStore::new(pool),
        Arc::new(registry),
        config.chains.clone(),
        AdminTopics::with_extra(config.extra_admin_topics.iter().copied()),
    ))
}
