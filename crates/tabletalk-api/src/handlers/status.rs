//! /status handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub sessions: usize,
    pub workers: usize,
    pub model: String,
    pub table: String,
    pub uptime_secs: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        sessions: state.sessions.len(),
        workers: state.workers,
        model: state.default_model.clone(),
        table: state.table_name.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
