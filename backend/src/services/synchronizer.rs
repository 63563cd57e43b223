//! Incremental contract event indexing.
//!
//! Each call advances one `(chain, contract)` cursor by at most one window:
//! read the cursor, clamp the window to the chain head, fetch and decode the
//! window's logs, store the events, then store the cursor. Nothing is written
//! until the whole window has decoded, and the cursor is written last, so a
//! failed call leaves the cursor where it was and re-running it replays the
//! same window. Event writes are keyed on the log position, which makes the
//! replay harmless.
//!
//! Calls for the same key must not overlap; callers serialize them.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use alloy::primitives::{keccak256, B256};
use anyhow::Context;
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::constants::{ADMIN_EVENT_SIGNATURES, NOTHING_TO_SYNC_MESSAGE};
use crate::db::{CursorStore, EventStore};
use crate::error::SyncError;
use crate::models::{DecodedEvent, RawLog, SyncCursor, SyncStatus};
use crate::services::abi_registry::{AbiRegistry, ContractDescriptor};
use crate::services::chain_reader::ChainReader;
use crate::utils::{ChainSettings, ChainTable};

static BUILT_IN_ADMIN_TOPICS: Lazy<HashSet<B256>> = Lazy::new(|| {
    ADMIN_EVENT_SIGNATURES
        .iter()
        .map(|signature| keccak256(signature.as_bytes()))
        .collect()
});

/// Signature topics of proxy administration events, which are skipped
/// instead of decoded.
#[derive(Debug, Clone)]
pub struct AdminTopics(HashSet<B256>);

impl AdminTopics {
    pub fn with_extra(extra: impl IntoIterator<Item = B256>) -> Self {
        let mut topics = BUILT_IN_ADMIN_TOPICS.clone();
        topics.extend(extra);
        Self(topics)
    }

    pub fn contains(&self, topic: &B256) -> bool {
        self.0.contains(topic)
    }
}

impl Default for AdminTopics {
    fn default() -> Self {
        Self(BUILT_IN_ADMIN_TOPICS.clone())
    }
}

/// Inclusive block range handled by one sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl BlockWindow {
    /// `None` once `from_block` is past the chain head.
    pub fn plan(from_block: u64, block_period: u64, current_block: u64) -> Option<Self> {
        if from_block > current_block {
            return None;
        }

        let to_block = from_block
            .saturating_add(block_period.max(1) - 1)
            .min(current_block);

        Some(Self {
            from_block,
            to_block,
        })
    }

    pub fn contains(&self, block_number: u64) -> bool {
        (self.from_block..=self.to_block).contains(&block_number)
    }

    pub fn len(&self) -> u64 {
        self.to_block - self.from_block + 1
    }
}

impl fmt::Display for BlockWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blocks {} to {}", self.from_block, self.to_block)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cursor is already at the chain head. Nothing was written.
    NothingToSync { from_block: u64, current_block: u64 },
    Synced {
        window: BlockWindow,
        events: usize,
        skipped_admin_logs: usize,
    },
}

impl SyncOutcome {
    pub fn events(&self) -> usize {
        match self {
            Self::NothingToSync { .. } => 0,
            Self::Synced { events, .. } => *events,
        }
    }

    pub fn window(&self) -> Option<BlockWindow> {
        match self {
            Self::NothingToSync { .. } => None,
            Self::Synced { window, .. } => Some(*window),
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToSync { .. } => f.write_str(NOTHING_TO_SYNC_MESSAGE),
            Self::Synced { window, events, .. } => write!(
                f,
                "Synced {} events from block {} to {}",
                events, window.from_block, window.to_block
            ),
        }
    }
}

pub struct EventSynchronizer<C, S> {
    chain_reader: C,
    store: S,
    registry: Arc<AbiRegistry>,
    chains: ChainTable,
    admin_topics: AdminTopics,
}

impl<C, S> EventSynchronizer<C, S>
where
    C: ChainReader + Sync,
    S: CursorStore + EventStore + Sync,
{
    pub fn new(
        chain_reader: C,
        store: S,
        registry: Arc<AbiRegistry>,
        chains: ChainTable,
        admin_topics: AdminTopics,
    ) -> Self {
        Self {
            chain_reader,
            store,
            registry,
            chains,
            admin_topics,
        }
    }

    pub fn chain_reader(&self) -> &C {
        &self.chain_reader
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &AbiRegistry {
        &self.registry
    }

    /// Index the next window of `contract_id`'s events on `chain_id`.
    ///
    /// `block_period` overrides the chain's default window; `None` or `0`
    /// use the default.
    pub async fn sync_once(
        &self,
        chain_id: u64,
        contract_id: &str,
        block_period: Option<u64>,
    ) -> Result<SyncOutcome, SyncError> {
        let (chain, contract) = self.resolve(chain_id, contract_id)?;
        let block_period = chain.resolve_block_period(block_period);

        let chain_read = |reason: anyhow::Error| SyncError::ChainRead {
            chain_id,
            contract: contract_id.to_string(),
            reason,
        };
        let persistence = |reason: anyhow::Error| SyncError::Persistence {
            chain_id,
            contract: contract_id.to_string(),
            reason,
        };

        let cursor = self
            .store
            .get_cursor(chain_id, &contract.address_hex)
            .await
            .map_err(persistence)?;
        let from_block = cursor
            .as_ref()
            .map(SyncCursor::next_block)
            .unwrap_or(contract.deployment_block);

        let current_block = self
            .chain_reader
            .get_block_height(chain_id)
            .await
            .map_err(chain_read)?;

        let Some(window) = BlockWindow::plan(from_block, block_period, current_block) else {
            info!(
                chain_id,
                contract = contract_id,
                from_block,
                current_block,
                "No new blocks to sync"
            );
            return Ok(SyncOutcome::NothingToSync {
                from_block,
                current_block,
            });
        };

        info!(
            chain_id,
            contract = contract_id,
            block_period,
            current_block,
            "Processing {}",
            window
        );

        let mut logs = self
            .chain_reader
            .get_logs(chain_id, contract.address, window.from_block, window.to_block)
            .await
            .map_err(chain_read)?;

        // Stored events must follow on-chain order whatever order the node used.
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        if let Some(stray) = logs.iter().find(|log| !window.contains(log.block_number)) {
            return Err(chain_read(anyhow::anyhow!(
                "node returned a log from block {} while fetching {}",
                stray.block_number,
                window
            )));
        }

        debug!(chain_id, contract = contract_id, "Fetched {} logs in {}", logs.len(), window);

        let (events, skipped_admin_logs) = self.decode_window(chain_id, contract, logs)?;

        self.store
            .upsert_events(&events)
            .await
            .with_context(|| format!("storing {} events from {}", events.len(), window))
            .map_err(persistence)?;

        self.store
            .upsert_cursor(&SyncCursor::new(chain_id, &contract.address_hex, window.to_block))
            .await
            .map_err(persistence)?;

        info!(
            chain_id,
            contract = contract_id,
            blocks = window.len(),
            events = events.len(),
            skipped_admin_logs,
            "Committed {}, cursor now at {}",
            window,
            window.to_block
        );

        Ok(SyncOutcome::Synced {
            window,
            events: events.len(),
            skipped_admin_logs,
        })
    }

    /// Where indexing of `contract_id` on `chain_id` currently stands.
    pub async fn sync_status(&self, chain_id: u64, contract_id: &str) -> Result<SyncStatus, SyncError> {
        let (_, contract) = self.resolve(chain_id, contract_id)?;

        let cursor = self
            .store
            .get_cursor(chain_id, &contract.address_hex)
            .await
            .map_err(|reason| SyncError::Persistence {
                chain_id,
                contract: contract_id.to_string(),
                reason,
            })?;

        Ok(SyncStatus {
            chain_id,
            contract: contract.contract_id.clone(),
            contract_address: contract.address_hex.clone(),
            deployment_block: contract.deployment_block,
            next_block: cursor
                .as_ref()
                .map(SyncCursor::next_block)
                .unwrap_or(contract.deployment_block),
            last_synced_block_number: cursor.as_ref().map(|c| c.last_synced_block_number),
            updated_at: cursor.and_then(|c| c.updated_at),
        })
    }

    /// Storage key address of `contract_id` once both it and `chain_id` are
    /// known to be configured.
    pub fn contract_address(&self, chain_id: u64, contract_id: &str) -> Result<String, SyncError> {
        let (_, contract) = self.resolve(chain_id, contract_id)?;
        Ok(contract.address_hex.clone())
    }

    fn resolve(
        &self,
        chain_id: u64,
        contract_id: &str,
    ) -> Result<(&ChainSettings, &ContractDescriptor), SyncError> {
        let chain = self
            .chains
            .get(chain_id)
            .ok_or(SyncError::UnsupportedChain { chain_id })?;
        let contract = self
            .registry
            .resolve(contract_id)
            .ok_or_else(|| SyncError::UnknownContract {
                contract: contract_id.to_string(),
            })?;
        Ok((chain, contract))
    }

    /// All-or-nothing: the first log that fails to decode fails the window.
    fn decode_window(
        &self,
        chain_id: u64,
        contract: &ContractDescriptor,
        logs: Vec<RawLog>,
    ) -> Result<(Vec<DecodedEvent>, usize), SyncError> {
        let mut events = Vec::with_capacity(logs.len());
        let mut skipped_admin_logs = 0;

        for log in logs {
            if log.address != contract.address {
                warn!(
                    chain_id,
                    contract = %contract.contract_id,
                    "Ignoring log {} in block {} from unexpected address {:#x}",
                    log.log_index,
                    log.block_number,
                    log.address
                );
                continue;
            }

            if log
                .signature_topic()
                .is_some_and(|topic| self.admin_topics.contains(topic))
            {
                skipped_admin_logs += 1;
                continue;
            }

            let decoded = contract
                .decoder
                .decode(&log.topics, &log.data)
                .map_err(|source| SyncError::Decode {
                    chain_id,
                    contract: contract.contract_id.clone(),
                    block_number: log.block_number,
                    log_index: log.log_index,
                    source,
                })?;

            events.push(DecodedEvent {
                chain_id: chain_id as i64,
                contract_address: contract.address_hex.clone(),
                block_number: log.block_number as i64,
                log_index: log.log_index as i64,
                transaction_hash: format!("{:#x}", log.transaction_hash),
                name: decoded.name,
                args: decoded.args,
            });
        }

        Ok((events, skipped_admin_logs))
    }
}
