use alloy::primitives::{Address, B256, Bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A log as returned by the node, with the positional fields a mined log
/// always carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: B256,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl RawLog {
    /// The event signature topic, if the log has one.
    pub fn signature_topic(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// One decoded domain event. `(chain_id, contract_address, block_number,
/// log_index)` is unique.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub chain_id: i64,
    pub contract_address: String,
    pub block_number: i64,
    pub log_index: i64,
    pub transaction_hash: String,
    pub name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SyncCursor {
    pub chain_id: i64,
    pub contract_address: String,
    /// Inclusive; every block up to here has been indexed.
    pub last_synced_block_number: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncCursor {
    pub fn new(chain_id: u64, contract_address: &str, last_synced_block_number: u64) -> Self {
        Self {
            chain_id: chain_id as i64,
            contract_address: contract_address.to_string(),
            last_synced_block_number: last_synced_block_number as i64,
            updated_at: None,
        }
    }

    /// First block not yet indexed.
    pub fn next_block(&self) -> u64 {
        (self.last_synced_block_number + 1).max(0) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub chain_id: u64,
    pub contract: String,
    pub contract_address: String,
    pub deployment_block: u64,
    pub last_synced_block_number: Option<i64>,
    pub next_block: u64,
    pub updated_at: Option<DateTime<Utc>>,
}
