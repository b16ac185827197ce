//! Error taxonomy for the bridge core.
//!
//! Adapters map these onto their own surfaces (HTTP status codes, SSE error
//! frames, log lines). Nothing in here knows about HTTP.

use thiserror::Error;

/// Failure of a single [`MessageQueue`](crate::queue::MessageQueue) receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No event arrived before the deadline.
    #[error("Queue timeout")]
    Timeout,

    /// The queue was closed, either by the request finishing or by the agent
    /// disconnecting.
    #[error("Queue closed")]
    Closed,
}

/// Errors produced by the bridge core.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No duplex connection is registered; nothing can execute the request.
    #[error("No agent connection available")]
    NoActiveAgent,

    /// Waiting on a message queue failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The agent answered the request with an `error` event.
    #[error("Agent reported error {status}: {message}")]
    AgentReported {
        /// HTTP status supplied by the agent.
        status: u16,
        /// Agent-supplied message.
        message: String,
    },

    /// A queue for this request id already exists.
    #[error("Request id already in flight: {0}")]
    DuplicateRequestId(String),

    /// Inbound frame could not be parsed or carried no request id.
    #[error("Malformed wire message: {0}")]
    MalformedWireMessage(String),

    /// Inbound frame referenced a request id with no live queue.
    #[error("No pending request for id {0}")]
    UnroutableWireEvent(String),

    /// The agent sent an event that is not valid at this point of the exchange.
    #[error("Unexpected event: {0}")]
    UnexpectedEvent(String),

    /// The duplex transport refused the outbound frame.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization of an outbound frame failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// True if the failure is a receive timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Queue(QueueError::Timeout))
    }

    /// Returns a suggested HTTP status code for this error when response
    /// headers have not been committed yet.
    #[must_use]
    pub const fn suggested_status_code(&self) -> u16 {
        match self {
            Self::NoActiveAgent => 503,
            Self::Queue(QueueError::Timeout) => 504,
            Self::AgentReported { status, .. } => *status,
            Self::UnexpectedEvent(_) => 502,
            Self::Queue(QueueError::Closed)
            | Self::DuplicateRequestId(_)
            | Self::MalformedWireMessage(_)
            | Self::UnroutableWireEvent(_)
            | Self::Transport(_)
            | Self::Serialization(_) => 500,
        }
    }
}

/// Shared result type for the core crate.
pub type Result<T> = std::result::Result<T, BridgeError>;
