//! Generic request handling: every HTTP request that is not served locally is
//! relayed to the agent and its events are turned back into a response.

use std::collections::BTreeMap;

use agent_bridge_core::{
    BridgeError, QueueItem, StreamingMode, WireEvent, WireRequest, generate_request_id,
};
use axum::extract::Query;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::delivery::{self, Delivery};
use crate::error::HttpError;
use crate::state::BridgeContext;

/// Headers from the agent that describe the upstream connection rather than
/// the response; the HTTP server frames the response itself.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
];

/// The parts of an HTTP request that are relayed.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Relay `inbound` to the agent and build the response from its events.
///
/// # Errors
///
/// Fails before any header is sent:
/// - 503 when no agent is connected (no queue is created)
/// - 504 when the first event does not arrive in time
/// - the agent's status when the first event is `error`
/// - 502 when the first event is not `response_headers`
pub async fn process_request(
    ctx: &BridgeContext,
    inbound: InboundRequest,
) -> Result<Response, HttpError> {
    if !ctx.registry.has_active_connections() {
        warn!(
            method = %inbound.method,
            path = inbound.uri.path(),
            "Rejecting request, no agent connected"
        );
        return Err(BridgeError::NoActiveAgent.into());
    }

    let request = wire_request(&inbound, generate_request_id(), ctx.mode.get());
    info!(
        request_id = %request.request_id,
        method = %request.method,
        path = %request.path,
        mode = %request.streaming_mode,
        "Relaying request"
    );

    let slot = ctx.registry.open_request(&request.request_id)?;
    slot.dispatch(&request)?;

    let first = slot
        .next(ctx.config.timeouts.first_event)
        .await
        .inspect_err(|e| warn!(request_id = %request.request_id, error = %e, "No response from agent"))?;
    let (status, headers) = response_head(first, request.streaming_mode)?;
    debug!(request_id = %request.request_id, %status, "Response headers received");

    let body = delivery::stream_body(slot, Delivery::for_request(&request, &ctx.config));
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Capture an inbound request as a [`WireRequest`].
pub fn wire_request(
    inbound: &InboundRequest,
    request_id: String,
    mode: StreamingMode,
) -> WireRequest {
    WireRequest {
        path: inbound.uri.path().to_string(),
        method: inbound.method.as_str().to_string(),
        headers: header_map(&inbound.headers),
        query_params: Query::<BTreeMap<String, String>>::try_from_uri(&inbound.uri)
            .map(|Query(params)| params)
            .unwrap_or_default(),
        body: String::from_utf8_lossy(&inbound.body).into_owned(),
        request_id,
        streaming_mode: mode,
    }
}

/// Repeated header names are folded into one comma-separated value.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

/// Interpret the first event of a request.
///
/// # Errors
///
/// See [`process_request`].
pub fn response_head(
    first: QueueItem,
    mode: StreamingMode,
) -> Result<(StatusCode, HeaderMap), HttpError> {
    match first {
        QueueItem::Event(WireEvent::ResponseHeaders { status, headers }) => {
            let status = match status {
                None => StatusCode::OK,
                Some(code) => StatusCode::from_u16(code).map_err(|_| {
                    HttpError::BadGateway(format!("agent sent invalid status {code}"))
                })?,
            };
            Ok((status, copy_headers(&headers, mode)))
        }
        QueueItem::Event(WireEvent::Error { status, message }) => {
            Err(BridgeError::AgentReported {
                status: status.unwrap_or(500),
                message: message.unwrap_or_else(|| "upstream error".to_string()),
            }
            .into())
        }
        other => Err(BridgeError::UnexpectedEvent(format!(
            "expected response headers, got {}",
            other.kind()
        ))
        .into()),
    }
}

/// Copy the agent's headers onto the response.
///
/// In fake mode `content-length` is dropped: it was computed for the
/// upstream transfer, not for the body the bridge writes.
pub fn copy_headers(headers: &BTreeMap<String, String>, mode: StreamingMode) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let lower = name.to_ascii_lowercase();
        if HOP_BY_HOP_HEADERS.contains(&lower.as_str())
            || (mode == StreamingMode::Fake && lower == "content-length")
        {
            continue;
        }
        match (
            HeaderName::from_bytes(lower.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => debug!(header = %name, "Skipping invalid response header"),
        }
    }
    map
}
