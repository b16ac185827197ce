//! `POST /v1/chat/completions`

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::adapter::handle_chat_completion;
use crate::error::HttpError;
use crate::state::AppState;

pub async fn completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    handle_chat_completion(state, &headers, &body).await
}
