//! /sessions handlers — message submission, transcript, dashboard.

use std::sync::atomic::Ordering;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use tabletalk_core::message::Message;
use tabletalk_services::DashboardState;

use super::ApiState;

// ── /sessions/{id}/messages (POST) ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PostMessageRequest {
    pub text: String,
    /// Override the configured model for this turn.
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct PostMessageResponse {
    pub queued: bool,
}

/// Fire-and-forget submission: returns 202 immediately while the session's
/// dispatch loop does the work.
pub async fn handle_post_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<PostMessageResponse>), (StatusCode, String)> {
    if req.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text must not be empty".into()));
    }

    let entry = state.session(&id);
    entry.handle.on_user_message(req.text, req.model);

    Ok((StatusCode::ACCEPTED, Json(PostMessageResponse { queued: true })))
}

// ── /sessions/{id}/transcript (GET) ───────────────────────────────────────────

#[derive(Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<Message>,
    pub thinking: bool,
}

pub async fn handle_get_transcript(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, (StatusCode, String)> {
    let entry = state.session(&id);
    let messages = entry
        .log
        .read()
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "log lock poisoned".into()))?
        .transcript();

    Ok(Json(TranscriptResponse {
        messages,
        thinking: entry.thinking.load(Ordering::Relaxed),
    }))
}

// ── /sessions/{id}/dashboard (GET) ────────────────────────────────────────────

pub async fn handle_get_dashboard(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Json<DashboardState> {
    let entry = state.session(&id);
    Json(entry.dashboard.current())
}
