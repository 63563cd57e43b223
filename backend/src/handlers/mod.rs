pub mod contract_events;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::{CursorStore, EventStore};
use crate::services::{ChainReader, EventSynchronizer};

pub use contract_events::{contract_events_status, process_contract_events};

/// One async lock per `(chain id, contract address)` so overlapping requests
/// for the same key run one after the other. Only keys the synchronizer has
/// resolved are ever inserted, which bounds the map by the configured chains
/// and contracts.
#[derive(Debug, Default)]
pub struct SyncLocks {
    locks: Mutex<HashMap<(u64, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncLocks {
    pub fn lock_for(&self, chain_id: u64, contract_address: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry((chain_id, contract_address.to_string()))
            .or_default()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct AppState<C, S> {
    pub synchronizer: Arc<EventSynchronizer<C, S>>,
    pub request_timeout: Duration,
    pub sync_locks: Arc<SyncLocks>,
}

impl<C, S> AppState<C, S> {
    pub fn new(synchronizer: Arc<EventSynchronizer<C, S>>, request_timeout: Duration) -> Self {
        Self {
            synchronizer,
            request_timeout,
            sync_locks: Arc::new(SyncLocks::default()),
        }
    }
}

// Derived Clone would require C: Clone and S: Clone.
impl<C, S> Clone for AppState<C, S> {
    fn clone(&self) -> Self {
        Self {
            synchronizer: Arc::clone(&self.synchronizer),
            request_timeout: self.request_timeout,
            sync_locks: Arc::clone(&self.sync_locks),
        }
    }
}

pub fn create_router<C, S>(state: AppState<C, S>, allowed_origins: Option<&str>) -> Router
where
    C: ChainReader + Send + Sync + 'static,
    S: CursorStore + EventStore + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/process-contract-events",
            post(process_contract_events::<C, S>),
        )
        .route(
            "/contract-events/status",
            get(contract_events_status::<C, S>),
        )
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer(allowed_origins))
        .with_state(state)
}

/// Permissive unless `allowed_origins` lists at least one parseable origin.
pub fn create_cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

async fn health_check() -> &'static str {
    "OK"
}
