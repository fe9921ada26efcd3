use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use reelfetch_core::artifact::StoreStats;
use reelfetch_core::{Config, OrchestratorStatus};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub orchestrator: OrchestratorStatus,
    pub store: StoreStats,
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        orchestrator: state.orchestrator().stats(),
        store: state.store().stats(),
    })
}
