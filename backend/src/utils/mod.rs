pub mod chains;
pub mod config;
pub mod logging;

pub use chains::{ChainSettings, ChainTable};
pub use config::{Config, ContractConfig};
pub use logging::init_logging;
