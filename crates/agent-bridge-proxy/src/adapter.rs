//! OpenAI-compatible chat completions on top of the agent's native
//! `generateContent` surface.
//!
//! The translated request goes to the agent like any other relayed request.
//! The answer always comes back as one SSE stream: a single content delta with
//! the full text, a `stop` frame, then `[DONE]`. Failures after the stream has
//! started become one in-band error delta.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::time::Duration;

use agent_bridge_core::{
    BridgeError, QueueError, QueueItem, RequestSlot, WireEvent, WireRequest, generate_request_id,
};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::error::HttpError;
use crate::generate_content::GenerateContentResponse;
use crate::models::{ChatCompletionChunk, ChatCompletionRequest, ChatDelta};
use crate::state::AppState;
use crate::translate::{response_text, to_generate_content};

/// Why an already-started completion stream failed.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("proxy error: {0}")]
    Agent(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("unexpected {0} event")]
    Unexpected(&'static str),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Identity shared by every frame of one completion stream.
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl ChunkMeta {
    pub fn chunk(&self, delta: ChatDelta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk::new(
            self.id.clone(),
            self.created,
            self.model.clone(),
            delta,
            finish_reason,
        )
    }

    fn frame(&self, delta: ChatDelta, finish_reason: Option<&str>) -> Event {
        let chunk = self.chunk(delta, finish_reason);
        Event::default().data(serde_json::to_string(&chunk).unwrap_or_else(|_| "{}".to_string()))
    }

    pub fn content_frame(&self, text: &str) -> Event {
        self.frame(ChatDelta::content(text), None)
    }

    pub fn stop_frame(&self) -> Event {
        self.frame(ChatDelta::default(), Some("stop"))
    }

    pub fn error_frame(&self, message: &str) -> Event {
        self.frame(
            ChatDelta::content(format!("\n\n[ERROR: {message}]")),
            Some("error"),
        )
    }
}

/// Handle `POST /v1/chat/completions`.
///
/// # Errors
///
/// Fails before the stream starts with 503 when no agent is connected and
/// 400 when the body is not a chat-completion request.
pub async fn handle_chat_completion(
    ctx: AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, HttpError> {
    if !ctx.registry.has_active_connections() {
        warn!("Rejecting chat completion, no agent connected");
        return Err(BridgeError::NoActiveAgent.into());
    }

    let request: ChatCompletionRequest = serde_json::from_slice(body)
        .map_err(|e| HttpError::BadRequest(format!("invalid chat completion request: {e}")))?;
    let model = request
        .model
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| ctx.config.default_model.clone());

    let request_id = generate_request_id();
    let wire = WireRequest {
        path: format!("v1beta/models/{model}:generateContent"),
        method: "POST".to_string(),
        headers: forwarded_headers(headers),
        query_params: BTreeMap::new(),
        body: serde_json::to_string(&to_generate_content(&request)).map_err(BridgeError::from)?,
        request_id: request_id.clone(),
        streaming_mode: ctx.mode.get(),
    };
    info!(
        request_id = %request_id,
        model = %model,
        messages = request.messages.len(),
        "Relaying chat completion"
    );

    let slot = ctx.registry.open_request(&request_id)?;
    slot.dispatch(&wire)?;

    let meta = ChunkMeta {
        id: format!("chatcmpl-{request_id}"),
        created: chrono::Utc::now().timestamp(),
        model,
    };
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(stream_completion(
        slot,
        meta,
        tx,
        ctx.config.timeouts.completion,
    ));

    Ok(Sse::new(ReceiverStream::new(rx)).into_response())
}

/// `content-type` plus the caller's `authorization`, verbatim.
fn forwarded_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let authorization = headers
        .get(AUTHORIZATION)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();
    BTreeMap::from([
        (CONTENT_TYPE.as_str().to_string(), "application/json".to_string()),
        (AUTHORIZATION.as_str().to_string(), authorization),
    ])
}

/// Drive one completion stream to `[DONE]`. Owns the slot, so the queue is
/// removed when the stream ends.
pub async fn stream_completion(
    slot: RequestSlot,
    meta: ChunkMeta,
    tx: mpsc::Sender<Result<Event, Infallible>>,
    timeout: Duration,
) {
    let mut frames = Vec::with_capacity(3);
    match read_answer(&slot, timeout).await {
        Ok(Some(text)) => {
            info!(request_id = slot.request_id(), chars = text.chars().count(), "Answer received");
            debug!(request_id = slot.request_id(), answer = %text);
            if !text.is_empty() {
                frames.push(meta.content_frame(&text));
            }
            frames.push(meta.stop_frame());
        }
        Ok(None) => warn!(request_id = slot.request_id(), "No response body received"),
        Err(e) => {
            warn!(request_id = slot.request_id(), error = %e, "Chat completion failed");
            frames.push(meta.error_frame(&e.to_string()));
        }
    }
    frames.push(Event::default().data("[DONE]"));

    for frame in frames {
        if tx.send(Ok(frame)).await.is_err() {
            debug!(request_id = slot.request_id(), "Client went away");
            return;
        }
    }
}

/// Read header, body and close events; return the answer text, or `None`
/// when the agent sent no body.
///
/// The body may be split over several chunks; it is parsed once the stream
/// closes, or once the close wait fails after some body has arrived.
pub async fn read_answer(
    slot: &RequestSlot,
    timeout: Duration,
) -> Result<Option<String>, CompletionError> {
    let status = match slot.next(timeout).await? {
        QueueItem::Event(WireEvent::ResponseHeaders { status, .. }) => status.unwrap_or(200),
        QueueItem::Event(WireEvent::Error { message, .. }) => {
            return Err(CompletionError::Agent(
                message.unwrap_or_else(|| "upstream error".to_string()),
            ));
        }
        other => return Err(CompletionError::Unexpected(other.kind())),
    };

    let mut raw = String::new();
    loop {
        match slot.next(timeout).await {
            Ok(QueueItem::StreamEnd) => break,
            Ok(QueueItem::Event(WireEvent::Chunk { data })) => {
                raw.push_str(data.as_deref().unwrap_or_default());
            }
            Ok(QueueItem::Event(WireEvent::Error { message, .. })) => {
                return Err(CompletionError::Agent(
                    message.unwrap_or_else(|| "upstream error".to_string()),
                ));
            }
            Ok(other) => warn!(kind = other.kind(), "Ignoring unexpected event in answer"),
            // The body is in; a missing close must not cost the answer.
            Err(e) if !raw.is_empty() => {
                warn!(request_id = slot.request_id(), error = %e, "Answer was never closed, using what arrived");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if status >= 400 {
        return Err(CompletionError::UpstreamStatus { status, body: raw });
    }
    if raw.is_empty() {
        return Ok(None);
    }

    let response: GenerateContentResponse = serde_json::from_str(&raw)?;
    Ok(Some(response_text(&response)))
}
