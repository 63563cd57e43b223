// =============================================================================
// Gaia Indexer Constants
// =============================================================================
// Tunables for the contract event indexer, kept in one place so chain tables
// and defaults can be adjusted without hunting through the services.

// =============================================================================
// CHAIN IDS
// =============================================================================

/// Ethereum mainnet chain ID
pub const ETHEREUM_MAINNET_CHAIN_ID: u64 = 1;

/// Ethereum Sepolia testnet chain ID
pub const ETHEREUM_SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Base mainnet chain ID
pub const BASE_MAINNET_CHAIN_ID: u64 = 8453;

/// Base Sepolia testnet chain ID
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84_532;

// =============================================================================
// BLOCK PERIODS (blocks fetched per sync window)
// =============================================================================

/// Window for chains with slow blocks (Ethereum L1)
pub const LOW_THROUGHPUT_BLOCK_PERIOD: u64 = 500;

/// Window for chains with fast blocks (Base)
pub const HIGH_THROUGHPUT_BLOCK_PERIOD: u64 = 2500;

/// Window for any other configured chain
pub const DEFAULT_BLOCK_PERIOD: u64 = 750;

// =============================================================================
// RPC ENDPOINTS
// =============================================================================

pub const ETHEREUM_MAINNET_PUBLIC_RPC: &str = "https://eth.llamarpc.com";
pub const ETHEREUM_SEPOLIA_PUBLIC_RPC: &str = "https://rpc.sepolia.org";
pub const BASE_MAINNET_PUBLIC_RPC: &str = "https://mainnet.base.org";
pub const BASE_SEPOLIA_PUBLIC_RPC: &str = "https://sepolia.base.org";

// =============================================================================
// EVENT FILTERING
// =============================================================================

/// Proxy administration events. Their topics are never decoded into
/// `contract_events`.
pub const ADMIN_EVENT_SIGNATURES: &[&str] = &[
    "Upgraded(address)",
    "AdminChanged(address,address)",
    "BeaconUpgraded(address)",
];

// =============================================================================
// CONTRACT REGISTRY
// =============================================================================

/// Contracts indexed when `INDEXED_CONTRACTS` is not set
pub const DEFAULT_INDEXED_CONTRACTS: &[&str] = &[
    "PersonaFragments",
    "ClanEmblems",
    "TopicShares",
    "MaterialFactory",
];

/// Where contract artifacts are read from when `ABI_ARTIFACTS_DIR` is not set
pub const DEFAULT_ABI_ARTIFACTS_DIR: &str = "./artifacts";

// =============================================================================
// DATABASE
// =============================================================================

/// Rows per INSERT when upserting events. 7 binds per row keeps this well
/// under the Postgres limit of 65535 bind parameters.
pub const EVENT_UPSERT_CHUNK_SIZE: usize = 1000;

/// Default pool size
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// SERVER CONFIGURATION
// =============================================================================

/// Default server port if not specified in environment
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Deadline for a single sync request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Message returned when the cursor is already at the chain head
pub const NOTHING_TO_SYNC_MESSAGE: &str = "No new blocks to sync.";
