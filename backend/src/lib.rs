pub mod constants;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod testing;

pub use db::connection::get_db_pool;
pub use error::SyncError;
pub use services::{build_synchronizer, EventSynchronizer, PgSynchronizer, SyncOutcome};
pub use utils::config::Config;

// Re-export common types
pub use anyhow::Result;
pub use sqlx::PgPool;
