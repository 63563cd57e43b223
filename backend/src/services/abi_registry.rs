use std::collections::HashMap;
use std::path::Path;

use alloy::{json_abi::JsonAbi, primitives::Address};
use anyhow::{Context, Result};
use serde_json::Value;

use crate::services::decoder::EventDecoder;
use crate::utils::ContractConfig;

#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub contract_id: String,
    pub address: Address,
    /// Lowercase `0x` hex, the form used as a storage key.
    pub address_hex: String,
    pub deployment_block: u64,
    pub decoder: EventDecoder,
}

impl ContractDescriptor {
    pub fn new(
        contract_id: impl Into<String>,
        address: Address,
        deployment_block: u64,
        abi: &JsonAbi,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            address,
            address_hex: format!("{address:#x}"),
            deployment_block,
            decoder: EventDecoder::new(abi),
        }
    }
}

/// Contracts known to this process. Built once at start-up and only read
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct AbiRegistry {
    contracts: HashMap<String, ContractDescriptor>,
}

impl AbiRegistry {
    pub fn new(contracts: impl IntoIterator<Item = ContractDescriptor>) -> Self {
        Self {
            contracts: contracts
                .into_iter()
                .map(|contract| (contract.contract_id.clone(), contract))
                .collect(),
        }
    }

    /// Reads `<artifacts_dir>/<ContractId>.json` for every configured contract.
    pub fn load(contracts: &[ContractConfig], artifacts_dir: &Path) -> Result<Self> {
        let mut descriptors = Vec::with_capacity(contracts.len());

        for contract in contracts {
            let address: Address = contract.address.parse().with_context(|| {
                format!("Invalid address '{}' for {}", contract.address, contract.contract_id)
            })?;

            let artifact_path = artifacts_dir.join(format!("{}.json", contract.contract_id));
            let artifact = std::fs::read_to_string(&artifact_path)
                .with_context(|| format!("Failed to read {}", artifact_path.display()))?;
            let abi = parse_abi(&artifact)
                .with_context(|| format!("Failed to parse ABI in {}", artifact_path.display()))?;

            let descriptor =
                ContractDescriptor::new(&contract.contract_id, address, contract.deployment_block, &abi);
            tracing::info!(
                "Registered {} at {} (deployed at block {}, {} events)",
                descriptor.contract_id,
                descriptor.address_hex,
                descriptor.deployment_block,
                descriptor.decoder.len()
            );
            descriptors.push(descriptor);
        }

        Ok(Self::new(descriptors))
    }

    pub fn resolve(&self, contract_id: &str) -> Option<&ContractDescriptor> {
        self.contracts.get(contract_id)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Accepts a Hardhat artifact (`{"abi": [...], ...}`) or a bare ABI array.
pub fn parse_abi(artifact: &str) -> Result<JsonAbi> {
    let value: Value = serde_json::from_str(artifact)?;
    let abi = match value {
        Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| anyhow::anyhow!("Artifact has no 'abi' field"))?,
        other => other,
    };
    Ok(serde_json::from_value(abi)?)
}
