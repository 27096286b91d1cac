//! Summary routes

use axum::{
    Router,
    routing::get,
    extract::State,
    Json,
};
use std::sync::Arc;
use crate::store::SharedStateStore;
use crate::models::{ChainSummary, MempoolSummary};
use crate::websocket::hub::{EventHub, HubStats};

use crate::error::Result;

#[derive(Clone)]
pub struct StatsState {
    pub store: Arc<SharedStateStore>,
    pub hub: EventHub,
}

pub fn routes(store: Arc<SharedStateStore>, hub: EventHub) -> Router {
    let state = StatsState { store, hub };
    Router::new()
        .route("/summary", get(get_chain_summary))
        .route("/mempool", get(get_mempool_summary))
        .route("/hub", get(get_hub_stats))
        .with_state(state)
}

#[axum::debug_handler]
async fn get_chain_summary(
    State(state): State<StatsState>,
) -> Json<ChainSummary> {
    Json(state.store.chain_summary())
}

#[axum::debug_handler]
async fn get_mempool_summary(
    State(state): State<StatsState>,
) -> Json<MempoolSummary> {
    Json(state.store.mempool_summary())
}

#[axum::debug_handler]
async fn get_hub_stats(
    State(state): State<StatsState>,
) -> Result<Json<HubStats>> {
    Ok(Json(state.hub.stats().await?))
}
