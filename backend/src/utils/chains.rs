use std::collections::BTreeMap;

use crate::constants::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSettings {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    /// Window used when a request does not name a usable one.
    pub block_period: u64,
}

impl ChainSettings {
    /// A positive requested period wins; anything else falls back to the
    /// chain default.
    pub fn resolve_block_period(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(period) if period > 0 => period,
            _ => self.block_period,
        }
    }
}

/// Chains the indexer can sync, keyed by chain id.
#[derive(Debug, Clone, Default)]
pub struct ChainTable {
    chains: BTreeMap<u64, ChainSettings>,
}

impl ChainTable {
    pub fn new(chains: impl IntoIterator<Item = ChainSettings>) -> Self {
        Self {
            chains: chains
                .into_iter()
                .map(|chain| (chain.chain_id, chain))
                .collect(),
        }
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainSettings> {
        self.chains.get(&chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainSettings> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

pub const BUILT_IN_CHAIN_IDS: &[u64] = &[
    ETHEREUM_MAINNET_CHAIN_ID,
    ETHEREUM_SEPOLIA_CHAIN_ID,
    BASE_MAINNET_CHAIN_ID,
    BASE_SEPOLIA_CHAIN_ID,
];

pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        ETHEREUM_MAINNET_CHAIN_ID => "ethereum".to_string(),
        ETHEREUM_SEPOLIA_CHAIN_ID => "sepolia".to_string(),
        BASE_MAINNET_CHAIN_ID => "base".to_string(),
        BASE_SEPOLIA_CHAIN_ID => "base-sepolia".to_string(),
        other => format!("chain-{}", other),
    }
}

pub fn default_block_period(chain_id: u64) -> u64 {
    match chain_id {
        ETHEREUM_MAINNET_CHAIN_ID | ETHEREUM_SEPOLIA_CHAIN_ID => LOW_THROUGHPUT_BLOCK_PERIOD,
        BASE_MAINNET_CHAIN_ID | BASE_SEPOLIA_CHAIN_ID => HIGH_THROUGHPUT_BLOCK_PERIOD,
        _ => DEFAULT_BLOCK_PERIOD,
    }
}

pub fn public_rpc_url(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        ETHEREUM_MAINNET_CHAIN_ID => Some(ETHEREUM_MAINNET_PUBLIC_RPC),
        ETHEREUM_SEPOLIA_CHAIN_ID => Some(ETHEREUM_SEPOLIA_PUBLIC_RPC),
        BASE_MAINNET_CHAIN_ID => Some(BASE_MAINNET_PUBLIC_RPC),
        BASE_SEPOLIA_CHAIN_ID => Some(BASE_SEPOLIA_PUBLIC_RPC),
        _ => None,
    }
}

pub fn infura_rpc_url(chain_id: u64, api_key: &str) -> Option<String> {
    let network = match chain_id {
        ETHEREUM_MAINNET_CHAIN_ID => "mainnet",
        ETHEREUM_SEPOLIA_CHAIN_ID => "sepolia",
        BASE_MAINNET_CHAIN_ID => "base-mainnet",
        BASE_SEPOLIA_CHAIN_ID => "base-sepolia",
        _ => return None,
    };
    Some(format!("https://{}.infura.io/v3/{}", network, api_key))
}

/// Endpoint selection: explicit override, then the paid provider when a key
/// is configured, then the public endpoint.
pub fn select_rpc_url(
    chain_id: u64,
    override_url: Option<&str>,
    infura_api_key: Option<&str>,
) -> Option<String> {
    if let Some(url) = override_url.map(str::trim).filter(|url| !url.is_empty()) {
        return Some(url.to_string());
    }
    if let Some(url) = infura_api_key.and_then(|key| infura_rpc_url(chain_id, key)) {
        return Some(url);
    }
    public_rpc_url(chain_id).map(str::to_string)
}
