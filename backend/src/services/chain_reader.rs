use std::collections::HashMap;
use std::future::Future;

use alloy::{
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Filter, Log},
};
use anyhow::{Context, Result};

use crate::models::RawLog;
use crate::utils::ChainTable;

/// Read access to chain heads and contract logs.
pub trait ChainReader {
    fn get_block_height(&self, chain_id: u64) -> impl Future<Output = Result<u64>> + Send;

    /// Logs emitted by `address` in `[from_block, to_block]`.
    fn get_logs(
        &self,
        chain_id: u64,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> impl Future<Output = Result<Vec<RawLog>>> + Send;
}

/// One HTTP provider per configured chain.
#[derive(Clone)]
pub struct AlloyChainReader {
    providers: HashMap<u64, DynProvider>,
}

impl AlloyChainReader {
    pub fn new(chains: &ChainTable) -> Result<Self> {
        let mut providers = HashMap::with_capacity(chains.len());

        for chain in chains.iter() {
            let url = chain
                .rpc_url
                .parse()
                .with_context(|| format!("Invalid RPC URL for chain {}", chain.chain_id))?;
            let provider = ProviderBuilder::new().connect_http(url).erased();
            providers.insert(chain.chain_id, provider);
        }

        Ok(Self { providers })
    }

    fn provider(&self, chain_id: u64) -> Result<&DynProvider> {
        self.providers
            .get(&chain_id)
            .ok_or_else(|| anyhow::anyhow!("No RPC provider configured for chain {}", chain_id))
    }
}

impl ChainReader for AlloyChainReader {
    async fn get_block_height(&self, chain_id: u64) -> Result<u64> {
        let block_number = self
            .provider(chain_id)?
            .get_block_number()
            .await
            .context("fetching block height")?;
        Ok(block_number)
    }

    async fn get_logs(
        &self,
        chain_id: u64,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>> {
        let filter = Filter::new()
            .address(address)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider(chain_id)?
            .get_logs(&filter)
            .await
            .with_context(|| format!("fetching logs for blocks {} to {}", from_block, to_block))?;

        logs.iter().map(to_raw_log).collect()
    }
}

fn to_raw_log(log: &Log) -> Result<RawLog> {
    Ok(RawLog {
        address: log.inner.address,
        block_number: log
            .block_number
            .ok_or_else(|| anyhow::anyhow!("Missing block number"))?,
        log_index: log
            .log_index
            .ok_or_else(|| anyhow::anyhow!("Missing log index"))?,
        transaction_hash: log
            .transaction_hash
            .ok_or_else(|| anyhow::anyhow!("Missing transaction hash"))?,
        topics: log.topics().to_vec(),
        data: log.inner.data.data.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{b256, Bytes, LogData, B256};

    #[test]
    fn test_to_raw_log_requires_mined_fields() {
        let topic = b256!("0xbc7cd75a20ee27fd9adebab32041f755214dbc6bffa90cc0225b39da2e5c2d3b");
        let mut log = Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0x11),
                data: LogData::new_unchecked(vec![topic], Bytes::from(vec![1, 2, 3])),
            },
            block_number: Some(42),
            log_index: Some(3),
            transaction_hash: Some(B256::repeat_byte(0x22)),
            ..Default::default()
        };

        let raw = to_raw_log(&log).unwrap();
        assert_eq!(raw.block_number, 42);
        assert_eq!(raw.log_index, 3);
        assert_eq!(raw.signature_topic(), Some(&topic));
        assert_eq!(raw.data, Bytes::from(vec![1, 2, 3]));

        log.block_number = None;
        assert!(to_raw_log(&log).is_err());
    }

    #[test]
    fn test_reader_builds_a_provider_per_chain() {
        let chains = ChainTable::new([crate::utils::ChainSettings {
            chain_id: 84532,
            name: "base-sepolia".to_string(),
            rpc_url: "https://sepolia.base.org".to_string(),
            block_period: 2500,
        }]);

        let reader = AlloyChainReader::new(&chains).unwrap();
        assert!(reader.provider(84532).is_ok());
        assert!(reader.provider(1).is_err());
    }
}
