use std::env;
use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::B256;
use anyhow::{Context, Result};

use crate::constants::{
    DEFAULT_ABI_ARTIFACTS_DIR, DEFAULT_INDEXED_CONTRACTS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SERVER_PORT,
};
use crate::utils::chains::{self, ChainSettings, ChainTable};

/// A contract to index, as configured. The ABI itself is read from
/// `artifacts_dir` when the registry is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractConfig {
    pub contract_id: String,
    pub address: String,
    pub deployment_block: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub allowed_origins: Option<String>,
    pub request_timeout: Duration,
    pub chains: ChainTable,
    pub extra_admin_topics: Vec<B256>,
    pub artifacts_dir: PathBuf,
    pub contracts: Vec<ContractConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let infura_api_key = lookup("INFURA_API_KEY").filter(|key| !key.trim().is_empty());

        Ok(Self {
            port: lookup("PORT")
                .and_then(|port| port.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            allowed_origins: lookup("ALLOWED_ORIGINS"),
            request_timeout: Duration::from_secs(
                lookup("REQUEST_TIMEOUT_SECS")
                    .and_then(|secs| secs.parse().ok())
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            chains: load_chains(&lookup, infura_api_key.as_deref())?,
            extra_admin_topics: split_list(lookup("EXTRA_ADMIN_TOPICS").as_deref())
                .iter()
                .map(|topic| {
                    topic
                        .parse::<B256>()
                        .map_err(|e| anyhow::anyhow!("Invalid admin topic '{}': {}", topic, e))
                })
                .collect::<Result<_>>()?,
            artifacts_dir: lookup("ABI_ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ABI_ARTIFACTS_DIR)),
            contracts: load_contracts(&lookup)?,
        })
    }
}

fn load_chains(
    lookup: &impl Fn(&str) -> Option<String>,
    infura_api_key: Option<&str>,
) -> Result<ChainTable> {
    let extra_chain_ids = split_list(lookup("EXTRA_CHAIN_IDS").as_deref())
        .iter()
        .map(|id| {
            id.parse::<u64>()
                .map_err(|_| anyhow::anyhow!("Invalid chain id in EXTRA_CHAIN_IDS: '{}'", id))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut chain_ids = chains::BUILT_IN_CHAIN_IDS.to_vec();
    chain_ids.extend(extra_chain_ids);

    let mut table = Vec::with_capacity(chain_ids.len());
    for chain_id in chain_ids {
        let override_url = lookup(&format!("CHAIN_{}_RPC_URL", chain_id));
        let rpc_url = chains::select_rpc_url(chain_id, override_url.as_deref(), infura_api_key)
            .ok_or_else(|| anyhow::anyhow!("CHAIN_{}_RPC_URL must be set", chain_id))?;

        let block_period = match lookup(&format!("CHAIN_{}_BLOCK_PERIOD", chain_id)) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|period| *period > 0)
                .ok_or_else(|| {
                    anyhow::anyhow!("CHAIN_{}_BLOCK_PERIOD must be a positive integer", chain_id)
                })?,
            None => chains::default_block_period(chain_id),
        };

        table.push(ChainSettings {
            chain_id,
            name: chains::chain_name(chain_id),
            rpc_url,
            block_period,
        });
    }

    Ok(ChainTable::new(table))
}

/// Reads `<PREFIX>_CONTRACT_ADDRESS` / `<PREFIX>_DEPLOYMENT_BLOCK` for every
/// indexed contract. Contracts without an address are not deployed in this
/// environment and are skipped.
fn load_contracts(lookup: &impl Fn(&str) -> Option<String>) -> Result<Vec<ContractConfig>> {
    let contract_ids = match lookup("INDEXED_CONTRACTS") {
        Some(list) => split_list(Some(&list)),
        None => DEFAULT_INDEXED_CONTRACTS.iter().map(|id| id.to_string()).collect(),
    };

    let mut contracts = Vec::with_capacity(contract_ids.len());
    for contract_id in contract_ids {
        let prefix = env_prefix(&contract_id);

        let Some(address) = lookup(&format!("{}_CONTRACT_ADDRESS", prefix)) else {
            tracing::warn!("{}_CONTRACT_ADDRESS not set, {} will not be indexed", prefix, contract_id);
            continue;
        };

        let deployment_block = lookup(&format!("{}_DEPLOYMENT_BLOCK", prefix))
            .ok_or_else(|| anyhow::anyhow!("{}_DEPLOYMENT_BLOCK must be set", prefix))?
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{}_DEPLOYMENT_BLOCK must be a block number", prefix))?;

        contracts.push(ContractConfig {
            contract_id,
            address: address.trim().to_string(),
            deployment_block,
        });
    }

    Ok(contracts)
}

/// `PersonaFragments` -> `PERSONA_FRAGMENTS`
pub fn env_prefix(contract_id: &str) -> String {
    let mut prefix = String::with_capacity(contract_id.len() + 4);
    let mut previous: Option<char> = None;

    for c in contract_id.chars() {
        if c.is_ascii_uppercase()
            && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            prefix.push('_');
        }
        if c.is_ascii_alphanumeric() {
            prefix.push(c.to_ascii_uppercase());
        } else {
            prefix.push('_');
        }
        previous = Some(c);
    }

    prefix
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{
        BASE_MAINNET_CHAIN_ID, BASE_SEPOLIA_CHAIN_ID, BASE_SEPOLIA_PUBLIC_RPC, DEFAULT_BLOCK_PERIOD,
    };
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("PersonaFragments"), "PERSONA_FRAGMENTS");
        assert_eq!(env_prefix("ClanEmblems"), "CLAN_EMBLEMS");
        assert_eq!(env_prefix("GaiaV2Token"), "GAIA_V2_TOKEN");
        assert_eq!(env_prefix("topic-shares"), "TOPIC_SHARES");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.port, DEFAULT_SERVER_PORT);
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        assert_eq!(config.chains.len(), 4);
        assert_eq!(
            config.chains.get(BASE_SEPOLIA_CHAIN_ID).unwrap().rpc_url,
            BASE_SEPOLIA_PUBLIC_RPC
        );
        assert!(config.contracts.is_empty());
        assert!(config.extra_admin_topics.is_empty());
    }

    #[test]
    fn test_chain_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("INFURA_API_KEY", "secret"),
            ("EXTRA_CHAIN_IDS", "10"),
            ("CHAIN_10_RPC_URL", "https://optimism.example"),
            ("CHAIN_8453_BLOCK_PERIOD", "1000"),
        ]))
        .unwrap();

        let base = config.chains.get(BASE_MAINNET_CHAIN_ID).unwrap();
        assert_eq!(base.rpc_url, "https://base-mainnet.infura.io/v3/secret");
        assert_eq!(base.block_period, 1000);

        let optimism = config.chains.get(10).unwrap();
        assert_eq!(optimism.rpc_url, "https://optimism.example");
        assert_eq!(optimism.block_period, DEFAULT_BLOCK_PERIOD);
    }

    #[test]
    fn test_extra_chain_requires_rpc_url() {
        let err = Config::from_lookup(lookup_from(&[("EXTRA_CHAIN_IDS", "10")])).unwrap_err();
        assert!(err.to_string().contains("CHAIN_10_RPC_URL"));
    }

    #[test]
    fn test_invalid_block_period_override_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("CHAIN_1_BLOCK_PERIOD", "0")])).is_err());
    }

    #[test]
    fn test_contracts_from_env() {
        let config = Config::from_lookup(lookup_from(&[
            ("INDEXED_CONTRACTS", "PersonaFragments, ClanEmblems"),
            ("PERSONA_FRAGMENTS_CONTRACT_ADDRESS", "0x00000000000000000000000000000000000000aa"),
            ("PERSONA_FRAGMENTS_DEPLOYMENT_BLOCK", "1000"),
        ]))
        .unwrap();

        assert_eq!(
            config.contracts,
            vec![ContractConfig {
                contract_id: "PersonaFragments".to_string(),
                address: "0x00000000000000000000000000000000000000aa".to_string(),
                deployment_block: 1000,
            }]
        );
    }

    #[test]
    fn test_contract_without_deployment_block_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("INDEXED_CONTRACTS", "TopicShares"),
            ("TOPIC_SHARES_CONTRACT_ADDRESS", "0x00000000000000000000000000000000000000aa"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TOPIC_SHARES_DEPLOYMENT_BLOCK"));
    }

    #[test]
    fn test_extra_admin_topics() {
        let topic = "0x1cf3b03a6cf19fa2baba4df148e9dcabedea7f8a5c07840e207e5c089be95d3e";
        let config =
            Config::from_lookup(lookup_from(&[("EXTRA_ADMIN_TOPICS", topic)])).unwrap();
        assert_eq!(config.extra_admin_topics, vec![topic.parse::<B256>().unwrap()]);

        assert!(Config::from_lookup(lookup_from(&[("EXTRA_ADMIN_TOPICS", "0x12")])).is_err());
    }
}
