//! Administrative endpoints for the streaming mode.

use std::collections::HashMap;

use agent_bridge_core::StreamingMode;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Serialize;
use tracing::info;

use crate::error::HttpError;
use crate::state::AppState;

/// `GET /admin/set-mode?mode=fake|real`
pub async fn set_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(StatusCode, String), HttpError> {
    let mode: StreamingMode = params
        .get("mode")
        .map(String::as_str)
        .unwrap_or_default()
        .parse()
        .map_err(|_| HttpError::BadRequest(r#"invalid mode, use "fake" or "real""#.to_string()))?;

    let previous = state.mode.set(mode);
    info!(%previous, current = %mode, "Streaming mode switched");
    Ok((StatusCode::OK, format!("streaming mode switched to: {mode}")))
}

/// `GET /admin/get-mode`
pub async fn get_mode(State(state): State<AppState>) -> String {
    format!("current streaming mode: {}", state.mode.get())
}

/// Snapshot for operators.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub mode: StreamingMode,
    pub connections: usize,
    pub pending_requests: usize,
}

/// `GET /admin/status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        mode: state.mode.get(),
        connections: state.registry.connection_count(),
        pending_requests: state.registry.pending_requests(),
    })
}
