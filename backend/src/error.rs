use thiserror::Error;

use crate::services::decoder::DecodeError;

/// Failures of a single sync call. None of them leave a partially advanced
/// cursor behind.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unsupported chain: {chain_id}")]
    UnsupportedChain { chain_id: u64 },

    #[error("unknown contract: {contract}")]
    UnknownContract { contract: String },

    #[error("failed to read chain {chain_id} for {contract}: {reason:#}")]
    ChainRead {
        chain_id: u64,
        contract: String,
        reason: anyhow::Error,
    },

    #[error(
        "failed to decode log {log_index} in block {block_number} of {contract} on chain {chain_id}: {source}"
    )]
    Decode {
        chain_id: u64,
        contract: String,
        block_number: u64,
        log_index: u64,
        #[source]
        source: DecodeError,
    },

    #[error("failed to persist {contract} on chain {chain_id}: {reason:#}")]
    Persistence {
        chain_id: u64,
        contract: String,
        reason: anyhow::Error,
    },
}

impl SyncError {
    /// Transient infrastructure failures; re-running the identical call is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChainRead { .. } | Self::Persistence { .. })
    }
}
