//! Duplex wire protocol between the bridge and the remote agent.
//!
//! Both directions carry one JSON object per text frame.
//!
//! | Direction | Shape |
//! |---|---|
//! | Bridge → Agent | `{path, method, headers, query_params, body, request_id, streaming_mode}` |
//! | Agent → Bridge | `{request_id, event_type: "response_headers", status, headers}` |
//! | Agent → Bridge | `{request_id, event_type: "chunk", data}` |
//! | Agent → Bridge | `{request_id, event_type: "error", status, message}` |
//! | Agent → Bridge | `{request_id, event_type: "stream_close"}` |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::mode::StreamingMode;

/// A request the agent must execute on the bridge's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRequest {
    /// Upstream path, forwarded as received.
    pub path: String,
    /// HTTP method name.
    pub method: String,
    /// Request headers. Duplicate names are not representable.
    pub headers: BTreeMap<String, String>,
    /// Decoded query parameters.
    pub query_params: BTreeMap<String, String>,
    /// Opaque request body.
    pub body: String,
    /// Correlation id; every event for this request carries it back.
    pub request_id: String,
    /// Delivery strategy captured when the request was admitted.
    pub streaming_mode: StreamingMode,
}

impl WireRequest {
    /// Serialize to a single text frame.
    pub fn to_frame(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An event emitted by the agent for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum WireEvent {
    /// Upstream status line and headers.
    ResponseHeaders {
        #[serde(default)]
        status: Option<u16>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    /// A piece of the response body.
    Chunk {
        #[serde(default)]
        data: Option<String>,
    },
    /// The agent could not execute the request.
    Error {
        #[serde(default)]
        status: Option<u16>,
        #[serde(default)]
        message: Option<String>,
    },
    /// No further events will follow for this request.
    StreamClose,
}

/// What a request's message queue yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    /// An event routed from the agent.
    Event(WireEvent),
    /// Terminal sentinel, produced from `stream_close`.
    StreamEnd,
}

impl QueueItem {
    /// Chunk payload, if this item carries one.
    pub fn data(&self) -> Option<&str> {
        match self {
            Self::Event(WireEvent::Chunk { data }) => data.as_deref(),
            _ => None,
        }
    }

    /// Short name for log lines.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Event(WireEvent::ResponseHeaders { .. }) => "response_headers",
            Self::Event(WireEvent::Chunk { .. }) => "chunk",
            Self::Event(WireEvent::Error { .. }) => "error",
            Self::Event(WireEvent::StreamClose) | Self::StreamEnd => "stream_end",
        }
    }
}

impl From<WireEvent> for QueueItem {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::StreamClose => Self::StreamEnd,
            other => Self::Event(other),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Value,
}

/// An inbound frame whose request id is known but whose event may not be.
#[derive(Debug)]
pub struct InboundFrame {
    /// Correlation id.
    pub request_id: String,
    /// Parsed event, or the reason it could not be parsed.
    pub event: Result<WireEvent, String>,
}

/// Parse the envelope of an agent frame.
///
/// # Errors
///
/// Returns [`BridgeError::MalformedWireMessage`] when the frame is not JSON or
/// carries no (non-empty) `request_id`. An unknown `event_type` is not an error
/// here: the frame is still correlatable, so the failure is reported in
/// [`InboundFrame::event`].
pub fn parse_inbound(frame: &str) -> Result<InboundFrame, BridgeError> {
    let envelope: InboundEnvelope = serde_json::from_str(frame)
        .map_err(|e| BridgeError::MalformedWireMessage(format!("invalid json: {e}")))?;

    let request_id = envelope
        .request_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BridgeError::MalformedWireMessage("missing request_id".into()))?;

    let event = serde_json::from_value::<WireEvent>(envelope.rest).map_err(|e| e.to_string());

    Ok(InboundFrame { request_id, event })
}
