//! `GET /v1/models`

use axum::Json;

use crate::models::ModelsResponse;

/// Static model catalog in OpenAI list format.
pub async fn list() -> Json<ModelsResponse> {
    Json(ModelsResponse::catalog(chrono::Utc::now().timestamp()))
}
