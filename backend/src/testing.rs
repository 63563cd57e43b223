//! Fixtures and in-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::{
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    primitives::{address, keccak256, Address, Bytes, B256, I256, U256},
};
use anyhow::{bail, Result};

use crate::constants::{BASE_SEPOLIA_CHAIN_ID, ETHEREUM_SEPOLIA_CHAIN_ID};
use crate::db::{CursorStore, EventStore};
use crate::models::{DecodedEvent, RawLog, SyncCursor};
use crate::services::abi_registry::{AbiRegistry, ContractDescriptor};
use crate::services::chain_reader::ChainReader;
use crate::utils::chains::{chain_name, default_block_period, public_rpc_url};
use crate::utils::{ChainSettings, ChainTable};

pub const SAMPLE_ABI_JSON: &str = r#"[
  {
    "type": "event",
    "name": "Transfer",
    "anonymous": false,
    "inputs": [
      { "name": "from", "type": "address", "indexed": true, "internalType": "address" },
      { "name": "to", "type": "address", "indexed": true, "internalType": "address" },
      { "name": "value", "type": "uint256", "indexed": false, "internalType": "uint256" }
    ]
  },
  {
    "type": "event",
    "name": "NameSet",
    "anonymous": false,
    "inputs": [
      { "name": "tokenId", "type": "uint64", "indexed": true, "internalType": "uint64" },
      { "name": "name", "type": "string", "indexed": false, "internalType": "string" },
      { "name": "tag", "type": "string", "indexed": true, "internalType": "string" },
      {
        "name": "owner",
        "type": "tuple",
        "indexed": false,
        "internalType": "struct Owner",
        "components": [
          { "name": "account", "type": "address", "internalType": "address" },
          { "name": "weight", "type": "int128", "internalType": "int128" }
        ]
      }
    ]
  },
  { "type": "event", "name": "Paused", "anonymous": false, "inputs": [] },
  {
    "type": "event",
    "name": "Debug",
    "anonymous": true,
    "inputs": [{ "name": "note", "type": "string", "indexed": false, "internalType": "string" }]
  },
  {
    "type": "function",
    "name": "setName",
    "stateMutability": "nonpayable",
    "inputs": [{ "name": "name", "type": "string", "internalType": "string" }],
    "outputs": []
  }
]"#;

pub const SAMPLE_CONTRACT_ID: &str = "PersonaFragments";
pub const SAMPLE_CONTRACT_ADDRESS: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
pub const ACCOUNT_A: Address = address!("0xAefC770D8515C552C952a30e597d9fbEa99aA756");
pub const ACCOUNT_B: Address = address!("0x59888bE579194C701f16a9425F57ecCe3906Af4B");

pub const TEST_CHAIN_ID: u64 = BASE_SEPOLIA_CHAIN_ID;
pub const OTHER_TEST_CHAIN_ID: u64 = ETHEREUM_SEPOLIA_CHAIN_ID;

pub fn sample_abi() -> JsonAbi {
    serde_json::from_str(SAMPLE_ABI_JSON).unwrap()
}

pub fn sample_registry(deployment_block: u64) -> AbiRegistry {
    AbiRegistry::new([ContractDescriptor::new(
        SAMPLE_CONTRACT_ID,
        SAMPLE_CONTRACT_ADDRESS,
        deployment_block,
        &sample_abi(),
    )])
}

pub fn test_chains() -> ChainTable {
    ChainTable::new([TEST_CHAIN_ID, OTHER_TEST_CHAIN_ID].map(|chain_id| ChainSettings {
        chain_id,
        name: chain_name(chain_id),
        rpc_url: public_rpc_url(chain_id).unwrap().to_string(),
        block_period: default_block_period(chain_id),
    }))
}

pub fn tx_hash(block_number: u64, log_index: u64) -> B256 {
    keccak256(format!("{block_number}:{log_index}"))
}

fn event_topic(name: &str) -> B256 {
    sample_abi()
        .events()
        .find(|event| event.name == name)
        .unwrap()
        .selector()
}

fn raw_log(address: Address, block_number: u64, log_index: u64, topics: Vec<B256>, data: Vec<u8>) -> RawLog {
    RawLog {
        address,
        block_number,
        log_index,
        transaction_hash: tx_hash(block_number, log_index),
        topics,
        data: Bytes::from(data),
    }
}

/// `Transfer(ACCOUNT_A, ACCOUNT_B, value)`
pub fn transfer_log(address: Address, block_number: u64, log_index: u64, value: U256) -> RawLog {
    raw_log(
        address,
        block_number,
        log_index,
        vec![event_topic("Transfer"), ACCOUNT_A.into_word(), ACCOUNT_B.into_word()],
        value.to_be_bytes::<32>().to_vec(),
    )
}

/// `NameSet(token_id, name, tag, (ACCOUNT_A, weight))`
pub fn name_set_log(
    address: Address,
    block_number: u64,
    log_index: u64,
    token_id: u64,
    name: &str,
    tag: &str,
    weight: i64,
) -> RawLog {
    let data = DynSolValue::Tuple(vec![
        DynSolValue::String(name.to_string()),
        DynSolValue::Tuple(vec![
            DynSolValue::Address(ACCOUNT_A),
            DynSolValue::Int(I256::try_from(weight).unwrap(), 128),
        ]),
    ])
    .abi_encode_params();

    raw_log(
        address,
        block_number,
        log_index,
        vec![
            event_topic("NameSet"),
            B256::from(U256::from(token_id)),
            keccak256(tag),
        ],
        data,
    )
}

pub fn paused_log(address: Address, block_number: u64, log_index: u64) -> RawLog {
    raw_log(address, block_number, log_index, vec![event_topic("Paused")], Vec::new())
}

/// `Upgraded(ACCOUNT_B)`, emitted by the proxy rather than the implementation ABI.
pub fn upgraded_log(address: Address, block_number: u64, log_index: u64) -> RawLog {
    raw_log(
        address,
        block_number,
        log_index,
        vec![keccak256("Upgraded(address)"), ACCOUNT_B.into_word()],
        Vec::new(),
    )
}

/// A log whose signature is not in the sample ABI.
pub fn unknown_log(address: Address, block_number: u64, log_index: u64) -> RawLog {
    raw_log(
        address,
        block_number,
        log_index,
        vec![keccak256("Minted(address,uint256)")],
        Vec::new(),
    )
}

/// Serves a fixed set of logs and a settable head. Logs are returned in the
/// order they were pushed.
#[derive(Debug, Default)]
pub struct MockChainReader {
    height: Mutex<u64>,
    logs: Mutex<Vec<RawLog>>,
    log_requests: Mutex<Vec<(u64, u64)>>,
    fail_reads: AtomicBool,
    unfiltered: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockChainReader {
    pub fn new(height: u64) -> Self {
        Self {
            height: Mutex::new(height),
            ..Default::default()
        }
    }

    pub fn set_height(&self, height: u64) {
        *self.height.lock().unwrap() = height;
    }

    pub fn push_log(&self, log: RawLog) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Return every pushed log regardless of the requested address and range,
    /// like a misbehaving node.
    pub fn serve_unfiltered(&self, unfiltered: bool) {
        self.unfiltered.store(unfiltered, Ordering::SeqCst);
    }

    /// Make every height read take `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn log_requests(&self) -> Vec<(u64, u64)> {
        self.log_requests.lock().unwrap().clone()
    }
}

impl ChainReader for MockChainReader {
    async fn get_block_height(&self, _chain_id: u64) -> Result<u64> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("rpc unavailable");
        }
        Ok(*self.height.lock().unwrap())
    }

    async fn get_logs(
        &self,
        _chain_id: u64,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("rpc unavailable");
        }
        self.log_requests.lock().unwrap().push((from_block, to_block));

        let unfiltered = self.unfiltered.load(Ordering::SeqCst);
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                unfiltered
                    || (log.address == address
                        && (from_block..=to_block).contains(&log.block_number))
            })
            .cloned()
            .collect())
    }
}

type EventKey = (i64, String, i64, i64);

/// Keeps the same write semantics as `PgEventStore`: existing events are left
/// alone and cursors never move backwards.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cursors: Mutex<HashMap<(i64, String), SyncCursor>>,
    events: Mutex<BTreeMap<EventKey, DecodedEvent>>,
    last_batch: Mutex<Vec<(i64, i64)>>,
    writes: AtomicUsize,
    fail_event_writes: AtomicBool,
    fail_cursor_writes: AtomicBool,
}

impl MemoryStore {
    pub fn events(&self) -> Vec<DecodedEvent> {
        self.events.lock().unwrap().values().cloned().collect()
    }

    pub fn cursor(&self, chain_id: u64, contract_address: &str) -> Option<i64> {
        self.cursors
            .lock()
            .unwrap()
            .get(&(chain_id as i64, contract_address.to_string()))
            .map(|cursor| cursor.last_synced_block_number)
    }

    /// `(block_number, log_index)` of the most recent event batch, in write order.
    pub fn last_batch(&self) -> Vec<(i64, i64)> {
        self.last_batch.lock().unwrap().clone()
    }

    /// Successful event and cursor writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_event_writes(&self, fail: bool) {
        self.fail_event_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cursor_writes(&self, fail: bool) {
        self.fail_cursor_writes.store(fail, Ordering::SeqCst);
    }
}

impl CursorStore for MemoryStore {
    async fn get_cursor(&self, chain_id: u64, contract_address: &str) -> Result<Option<SyncCursor>> {
        Ok(self
            .cursors
            .lock()
            .unwrap()
            .get(&(chain_id as i64, contract_address.to_string()))
            .cloned())
    }

    async fn upsert_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        if self.fail_cursor_writes.load(Ordering::SeqCst) {
            bail!("cursor write refused");
        }

        let mut cursors = self.cursors.lock().unwrap();
        let entry = cursors
            .entry((cursor.chain_id, cursor.contract_address.clone()))
            .or_insert_with(|| cursor.clone());
        entry.last_synced_block_number = entry
            .last_synced_block_number
            .max(cursor.last_synced_block_number);
        entry.updated_at = Some(chrono::Utc::now());

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl EventStore for MemoryStore {
    async fn upsert_events(&self, events: &[DecodedEvent]) -> Result<()> {
        if self.fail_event_writes.load(Ordering::SeqCst) {
            bail!("event write refused");
        }

        let mut stored = self.events.lock().unwrap();
        for event in events {
            let key = (
                event.chain_id,
                event.contract_address.clone(),
                event.block_number,
                event.log_index,
            );
            stored.entry(key).or_insert_with(|| event.clone());
        }

        *self.last_batch.lock().unwrap() = events
            .iter()
            .map(|event| (event.block_number, event.log_index))
            .collect();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
