//! Fallback handler: everything not served locally is relayed to the agent.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;

use crate::error::HttpError;
use crate::relay::{InboundRequest, process_request};
use crate::state::AppState;

pub async fn forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    process_request(
        &state,
        InboundRequest {
            method,
            uri,
            headers,
            body,
        },
    )
    .await
}
