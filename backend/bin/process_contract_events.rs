use anyhow::Result;
use clap::{Arg, Command};
use gaia_indexer::{
    build_synchronizer,
    db::{get_db_pool, DatabaseConfig},
    utils::init_logging,
    Config, SyncOutcome,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let matches = Command::new("process-contract-events")
        .about("Index the next window of a contract's events, or every window up to the chain head")
        .arg(
            Arg::new("chain-id")
                .long("chain-id")
                .required(true)
                .value_parser(clap::value_parser!(u64))
                .help("Chain to read from"),
        )
        .arg(
            Arg::new("contract")
                .long("contract")
                .required(true)
                .help("Contract id, e.g. PersonaFragments"),
        )
        .arg(
            Arg::new("block-period")
                .long("block-period")
                .value_parser(clap::value_parser!(u64))
                .help("Blocks per window (defaults to the chain's configured period)"),
        )
        .arg(
            Arg::new("catch-up")
                .long("catch-up")
                .help("Keep syncing windows until there is nothing left to sync")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let chain_id = matches.get_one::<u64>("chain-id").copied().unwrap_or_default();
    let contract = matches
        .get_one::<String>("contract")
        .cloned()
        .unwrap_or_default();
    let block_period = matches.get_one::<u64>("block-period").copied();
    let catch_up = matches.get_flag("catch-up");

    let config = Config::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let pool = get_db_pool(&db_config).await?;
    let synchronizer = build_synchronizer(&config, pool)?;

    info!("🎯 Syncing {} on chain {}", contract, chain_id);

    let mut windows = 0usize;
    let mut events = 0usize;
    loop {
        match synchronizer.sync_once(chain_id, &contract, block_period).await {
            Ok(outcome @ SyncOutcome::Synced { .. }) => {
                windows += 1;
                events += outcome.events();
                info!("✅ {}", outcome);
                if !catch_up {
                    break;
                }
            }
            Ok(outcome @ SyncOutcome::NothingToSync { .. }) => {
                info!("{}", outcome);
                break;
            }
            Err(e) => {
                error!("❌ {}", e);
                if e.is_retryable() {
                    error!("Re-running the same command will retry the failed window");
                }
                return Err(e.into());
            }
        }
    }

    if catch_up {
        info!("🏁 Caught up: {} events across {} windows", events, windows);
    }

    Ok(())
}
