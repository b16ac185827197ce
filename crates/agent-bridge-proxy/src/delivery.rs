//! Response body delivery for proxied requests.
//!
//! Once the status line and headers are committed, a spawned task drains the
//! request's queue into the response body through a bounded channel:
//!
//! - **real**: every chunk is written as soon as it arrives. An idle timeout
//!   ends the body quietly, since upstreams may drop the transport without a
//!   closing event.
//! - **fake**: keep-alive frames are written on a fixed period until the
//!   complete answer is in, then the answer is written in one piece.
//!
//! The task owns the [`RequestSlot`]; the queue is removed when it finishes,
//! however it finishes.

use std::io;
use std::time::Duration;

use agent_bridge_core::{
    BridgeConfig, MessageQueue, QueueError, QueueItem, RequestSlot, StreamingMode, WireEvent,
    WireRequest,
};
use axum::body::Body;
use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::models::{ChatCompletionChunk, ChatDelta};

const BODY_CHANNEL_CAPACITY: usize = 32;

/// Keep-alive for surfaces the bridge cannot identify.
const GENERIC_KEEP_ALIVE: &str = "data: {}\n\n";

pub(crate) type BodySender = mpsc::Sender<Result<Bytes, io::Error>>;

/// How the body of one response is produced.
#[derive(Debug, Clone)]
pub enum Delivery {
    Real {
        idle: Duration,
    },
    Fake {
        frame: Bytes,
        period: Duration,
        timeout: Duration,
    },
}

impl Delivery {
    /// Strategy for `request`, following the mode it was admitted with.
    pub fn for_request(request: &WireRequest, config: &BridgeConfig) -> Self {
        match request.streaming_mode {
            StreamingMode::Real => Self::Real {
                idle: config.timeouts.stream_idle,
            },
            StreamingMode::Fake => Self::Fake {
                frame: keep_alive_frame(request, &config.default_model),
                period: config.timeouts.keep_alive,
                timeout: config.timeouts.first_event,
            },
        }
    }
}

/// How a delivery ended. Logged, never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The agent closed the stream.
    Completed,
    /// Real mode saw no event within the idle timeout.
    IdleTimeout,
    /// Fake mode got `stream_close` before any data.
    Empty,
    /// The queue was closed under us.
    AgentDisconnected,
    /// The HTTP client went away.
    ClientGone,
    /// The agent reported an error after headers were sent.
    AgentError,
}

/// Spawn the delivery task and return the body it feeds.
pub fn stream_body(slot: RequestSlot, delivery: Delivery) -> Body {
    let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let outcome = match &delivery {
            Delivery::Real { idle } => deliver_real(slot.queue(), &tx, *idle).await,
            Delivery::Fake {
                frame,
                period,
                timeout,
            } => deliver_fake(slot.queue(), &tx, frame.clone(), *period, *timeout).await,
        };
        debug!(request_id = slot.request_id(), ?outcome, "Response delivery finished");
    });

    Body::from_stream(ReceiverStream::new(rx))
}

/// Forward chunks as they arrive until the stream ends.
pub async fn deliver_real(
    queue: &MessageQueue,
    sink: &BodySender,
    idle: Duration,
) -> DeliveryOutcome {
    loop {
        let item = tokio::select! {
            item = queue.dequeue(idle) => item,
            () = sink.closed() => return DeliveryOutcome::ClientGone,
        };

        match item {
            Ok(QueueItem::StreamEnd) => return DeliveryOutcome::Completed,
            Ok(QueueItem::Event(WireEvent::Chunk { data })) => {
                let Some(data) = data.filter(|d| !d.is_empty()) else {
                    continue;
                };
                if sink.send(Ok(Bytes::from(data))).await.is_err() {
                    return DeliveryOutcome::ClientGone;
                }
            }
            Ok(QueueItem::Event(WireEvent::Error { status, message })) => {
                warn!(?status, ?message, "Agent error after headers were sent; ending stream");
                return DeliveryOutcome::AgentError;
            }
            Ok(other) => {
                warn!(kind = other.kind(), "Ignoring unexpected event while streaming");
            }
            Err(QueueError::Timeout) => {
                info!(idle_secs = idle.as_secs(), "No data within idle timeout, ending stream");
                return DeliveryOutcome::IdleTimeout;
            }
            Err(QueueError::Closed) => {
                warn!("Agent disconnected mid-stream");
                return DeliveryOutcome::AgentDisconnected;
            }
        }
    }
}

/// Buffer the complete answer while writing keep-alive frames, then write it
/// in one piece.
pub async fn deliver_fake(
    queue: &MessageQueue,
    sink: &BodySender,
    frame: Bytes,
    period: Duration,
    timeout: Duration,
) -> DeliveryOutcome {
    let mut keep_alive = KeepAlive::start(frame, period);
    let mut body = String::new();

    let outcome = match keep_alive.wait(queue, sink, timeout).await {
        Err(outcome) => outcome,
        Ok(QueueItem::StreamEnd) => {
            warn!("Stream closed before any data arrived, empty answer");
            DeliveryOutcome::Empty
        }
        Ok(first) => {
            match first {
                QueueItem::Event(WireEvent::Chunk { data }) => body = data.unwrap_or_default(),
                QueueItem::Event(WireEvent::Error { status, message }) => {
                    warn!(?status, ?message, "Agent error after headers were sent");
                }
                other => warn!(kind = other.kind(), "Expected a data chunk"),
            }
            match keep_alive.wait(queue, sink, timeout).await {
                Ok(QueueItem::StreamEnd) => DeliveryOutcome::Completed,
                Ok(other) => {
                    warn!(kind = other.kind(), "Expected stream end after the answer");
                    DeliveryOutcome::Completed
                }
                Err(outcome) => outcome,
            }
        }
    };

    let sent = keep_alive.sent;
    drop(keep_alive);
    debug!(keep_alive_frames = sent, body_len = body.len(), "Pseudo-stream finished");

    if outcome != DeliveryOutcome::ClientGone
        && !body.is_empty()
        && sink.send(Ok(Bytes::from(body))).await.is_err()
    {
        return DeliveryOutcome::ClientGone;
    }
    outcome
}

/// Periodic keep-alive writer for the fake strategy.
struct KeepAlive {
    ticker: Interval,
    frame: Bytes,
    sent: usize,
}

impl KeepAlive {
    fn start(frame: Bytes, period: Duration) -> Self {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            frame,
            sent: 0,
        }
    }

    /// Dequeue one item, writing a keep-alive frame on every tick meanwhile.
    async fn wait(
        &mut self,
        queue: &MessageQueue,
        sink: &BodySender,
        timeout: Duration,
    ) -> Result<QueueItem, DeliveryOutcome> {
        let recv = queue.dequeue(timeout);
        tokio::pin!(recv);

        loop {
            tokio::select! {
                biased;
                item = &mut recv => {
                    return item.map_err(|e| match e {
                        QueueError::Timeout => {
                            warn!("Timed out waiting for the answer");
                            DeliveryOutcome::IdleTimeout
                        }
                        QueueError::Closed => {
                            warn!("Agent disconnected before the answer was complete");
                            DeliveryOutcome::AgentDisconnected
                        }
                    });
                }
                _ = self.ticker.tick() => match sink.try_send(Ok(self.frame.clone())) {
                    Ok(()) => self.sent += 1,
                    // Client is not reading; skip this beat.
                    Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Closed(_)) => return Err(DeliveryOutcome::ClientGone),
                },
            }
        }
    }
}

/// No-op frame matching the API surface of `request`.
///
/// - chat-completion paths: an OpenAI chunk with an empty delta
/// - `generateContent` paths: a candidate with one empty text part
/// - anything else: an empty JSON event
pub fn keep_alive_frame(request: &WireRequest, default_model: &str) -> Bytes {
    let payload = if request.path.contains("chat/completions") {
        let model = requested_model(&request.body).unwrap_or_else(|| default_model.to_string());
        let chunk = ChatCompletionChunk::new(
            format!("chatcmpl-{}", request.request_id),
            chrono::Utc::now().timestamp(),
            model,
            ChatDelta::default(),
            None,
        );
        serde_json::to_string(&chunk).ok()
    } else if request.path.contains("generateContent") {
        let candidate = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "" }], "role": "model" },
                "finishReason": null,
                "index": 0,
                "safetyRatings": [],
            }]
        });
        Some(candidate.to_string())
    } else {
        None
    };

    payload.map_or_else(
        || Bytes::from_static(GENERIC_KEEP_ALIVE.as_bytes()),
        |json| Bytes::from(format!("data: {json}\n\n")),
    )
}

fn requested_model(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("model")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn chunk(data: &str) -> QueueItem {
        QueueItem::Event(WireEvent::Chunk {
            data: Some(data.to_string()),
        })
    }

    fn request(path: &str, body: &str) -> WireRequest {
        WireRequest {
            path: path.to_string(),
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            query_params: BTreeMap::new(),
            body: body.to_string(),
            request_id: "17_abc".to_string(),
            streaming_mode: StreamingMode::Fake,
        }
    }

    async fn drain(rx: &mut mpsc::Receiver<Result<Bytes, io::Error>>) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame.unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn real_mode_writes_each_chunk_in_order() {
        let queue = MessageQueue::new();
        queue.enqueue(chunk("a"));
        queue.enqueue(chunk("b"));
        queue.enqueue(QueueItem::StreamEnd);
        let (tx, mut rx) = mpsc::channel(8);

        let outcome = deliver_real(&queue, &tx, Duration::from_secs(30)).await;
        drop(tx);

        assert_eq!(outcome, DeliveryOutcome::Completed);
        assert_eq!(drain(&mut rx).await, vec![Bytes::from("a"), Bytes::from("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn real_mode_idle_timeout_ends_quietly() {
        let queue = MessageQueue::new();
        queue.enqueue(chunk("partial"));
        let (tx, mut rx) = mpsc::channel(8);

        let outcome = deliver_real(&queue, &tx, Duration::from_secs(30)).await;
        drop(tx);

        assert_eq!(outcome, DeliveryOutcome::IdleTimeout);
        assert_eq!(drain(&mut rx).await, vec![Bytes::from("partial")]);
    }

    #[tokio::test]
    async fn real_mode_stops_when_queue_closes() {
        let queue = Arc::new(MessageQueue::new());
        let (tx, _rx) = mpsc::channel(8);

        let closer = Arc::clone(&queue);
        let task = tokio::spawn(async move { deliver_real(&queue, &tx, Duration::from_secs(30)).await });
        while closer.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        closer.close();

        assert_eq!(task.await.unwrap(), DeliveryOutcome::AgentDisconnected);
    }

    #[tokio::test]
    async fn real_mode_notices_client_going_away() {
        let queue = MessageQueue::new();
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let outcome = deliver_real(&queue, &tx, Duration::from_secs(30)).await;
        assert_eq!(outcome, DeliveryOutcome::ClientGone);
        assert_eq!(queue.waiting(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fake_mode_sends_keep_alives_then_whole_body() {
        let queue = Arc::new(MessageQueue::new());
        let (tx, mut rx) = mpsc::channel(8);
        let frame = Bytes::from_static(b"data: {}\n\n");

        let producer = Arc::clone(&queue);
        let task = tokio::spawn(async move {
            deliver_fake(
                &queue,
                &tx,
                frame,
                Duration::from_secs(1),
                Duration::from_secs(600),
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        producer.enqueue(chunk("BODY"));
        producer.enqueue(QueueItem::StreamEnd);

        assert_eq!(task.await.unwrap(), DeliveryOutcome::Completed);
        let frames = drain(&mut rx).await;
        let (body, keep_alives) = frames.split_last().unwrap();
        assert_eq!(body, &Bytes::from("BODY"));
        assert!(!keep_alives.is_empty());
        assert!(keep_alives.iter().all(|f| f == &Bytes::from_static(b"data: {}\n\n")));
    }

    #[tokio::test(start_paused = true)]
    async fn fake_mode_with_immediate_answer_sends_no_keep_alive() {
        let queue = MessageQueue::new();
        queue.enqueue(chunk("BODY"));
        queue.enqueue(QueueItem::StreamEnd);
        let (tx, mut rx) = mpsc::channel(8);

        let outcome = deliver_fake(
            &queue,
            &tx,
            Bytes::from_static(b"data: {}\n\n"),
            Duration::from_secs(1),
            Duration::from_secs(600),
        )
        .await;
        drop(tx);

        assert_eq!(outcome, DeliveryOutcome::Completed);
        assert_eq!(drain(&mut rx).await, vec![Bytes::from("BODY")]);
    }

    #[tokio::test]
    async fn fake_mode_empty_answer_writes_nothing() {
        let queue = MessageQueue::new();
        queue.enqueue(QueueItem::StreamEnd);
        let (tx, mut rx) = mpsc::channel(8);

        let outcome = deliver_fake(
            &queue,
            &tx,
            Bytes::from_static(b"data: {}\n\n"),
            Duration::from_secs(1),
            Duration::from_secs(600),
        )
        .await;
        drop(tx);

        assert_eq!(outcome, DeliveryOutcome::Empty);
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn fake_mode_still_writes_body_when_close_event_is_missing() {
        let queue = MessageQueue::new();
        queue.enqueue(chunk("BODY"));
        queue.enqueue(chunk("extra"));
        let (tx, mut rx) = mpsc::channel(8);

        let outcome = deliver_fake(
            &queue,
            &tx,
            Bytes::from_static(b"data: {}\n\n"),
            Duration::from_secs(60),
            Duration::from_secs(600),
        )
        .await;
        drop(tx);

        assert_eq!(outcome, DeliveryOutcome::Completed);
        assert_eq!(drain(&mut rx).await, vec![Bytes::from("BODY")]);
    }

    #[test]
    fn keep_alive_shape_follows_the_path() {
        let chat = keep_alive_frame(
            &request("/v1/chat/completions", r#"{"model":"gemini-x"}"#),
            "fallback",
        );
        let chat = std::str::from_utf8(&chat).unwrap();
        assert!(chat.starts_with("data: ") && chat.ends_with("\n\n"));
        let value: serde_json::Value =
            serde_json::from_str(chat.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(value["id"], "chatcmpl-17_abc");
        assert_eq!(value["model"], "gemini-x");
        assert!(value["choices"][0]["finish_reason"].is_null());

        let native = keep_alive_frame(
            &request("/v1beta/models/gemini:generateContent", ""),
            "fallback",
        );
        let native = std::str::from_utf8(&native).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(native.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(value["candidates"][0]["content"]["role"], "model");
        assert_eq!(value["candidates"][0]["content"]["parts"][0]["text"], "");

        let other = keep_alive_frame(&request("/v1/embeddings", ""), "fallback");
        assert_eq!(other, Bytes::from_static(b"data: {}\n\n"));
    }

    #[test]
    fn chat_keep_alive_falls_back_to_default_model() {
        let frame = keep_alive_frame(&request("/v1/chat/completions", "not json"), "fallback");
        assert!(std::str::from_utf8(&frame).unwrap().contains("\"model\":\"fallback\""));
    }
}
