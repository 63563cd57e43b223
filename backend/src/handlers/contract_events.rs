use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{CursorStore, EventStore};
use crate::error::SyncError;
use crate::handlers::AppState;
use crate::models::SyncStatus;
use crate::services::{ChainReader, SyncOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessContractEventsRequest {
    pub chain_id: u64,
    pub contract: String,
    /// Number or numeric string; anything unusable means "chain default".
    #[serde(default)]
    pub block_period: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessContractEventsResponse {
    pub message: String,
    pub events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<u64>,
}

impl From<SyncOutcome> for ProcessContractEventsResponse {
    fn from(outcome: SyncOutcome) -> Self {
        let window = outcome.window();
        Self {
            message: outcome.to_string(),
            events: outcome.events(),
            from_block: window.map(|w| w.from_block),
            to_block: window.map(|w| w.to_block),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusQuery {
    pub chain_id: u64,
    pub contract: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

fn sync_error_response(err: &SyncError) -> ApiError {
    let status = match err {
        SyncError::UnsupportedChain { .. } | SyncError::UnknownContract { .. } => {
            StatusCode::BAD_REQUEST
        }
        SyncError::ChainRead { .. } => StatusCode::BAD_GATEWAY,
        SyncError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("{}", err);
    } else {
        tracing::warn!("{}", err);
    }

    api_error(status, err.to_string())
}

pub fn parse_block_period(value: Option<&Value>) -> Option<u64> {
    let period = match value? {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    };
    period.filter(|period| *period > 0)
}

/// `POST /process-contract-events`
pub async fn process_contract_events<C, S>(
    State(state): State<AppState<C, S>>,
    payload: Result<Json<ProcessContractEventsRequest>, JsonRejection>,
) -> Result<Json<ProcessContractEventsResponse>, ApiError>
where
    C: ChainReader + Send + Sync + 'static,
    S: CursorStore + EventStore + Send + Sync + 'static,
{
    let Json(req) = payload
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)))?;
    let block_period = parse_block_period(req.block_period.as_ref());

    let contract_address = state
        .synchronizer
        .contract_address(req.chain_id, &req.contract)
        .map_err(|e| sync_error_response(&e))?;
    let lock = state.sync_locks.lock_for(req.chain_id, &contract_address);
    let sync = async {
        let _guard = lock.lock().await;
        state
            .synchronizer
            .sync_once(req.chain_id, &req.contract, block_period)
            .await
    };

    let outcome = match tokio::time::timeout(state.request_timeout, sync).await {
        Ok(result) => result.map_err(|e| sync_error_response(&e))?,
        Err(_) => {
            tracing::error!(
                chain_id = req.chain_id,
                contract = %req.contract,
                "Sync request exceeded {:?}",
                state.request_timeout
            );
            return Err(api_error(
                StatusCode::GATEWAY_TIMEOUT,
                format!(
                    "Syncing {} on chain {} did not finish within {}s",
                    req.contract,
                    req.chain_id,
                    state.request_timeout.as_secs()
                ),
            ));
        }
    };

    Ok(Json(outcome.into()))
}

/// `GET /contract-events/status?chainId=&contract=`
pub async fn contract_events_status<C, S>(
    State(state): State<AppState<C, S>>,
    query: Result<Query<SyncStatusQuery>, QueryRejection>,
) -> Result<Json<SyncStatus>, ApiError>
where
    C: ChainReader + Send + Sync + 'static,
    S: CursorStore + EventStore + Send + Sync + 'static,
{
    let Query(query) = query
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid query: {}", e)))?;

    let status = state
        .synchronizer
        .sync_status(query.chain_id, &query.contract)
        .await
        .map_err(|e| sync_error_response(&e))?;

    Ok(Json(status))
}
