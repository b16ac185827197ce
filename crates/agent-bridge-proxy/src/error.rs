//! HTTP error type for the bridge surface and its mapping from core errors.
//!
//! Bodies are plain text: the proxied surface is opaque to the bridge, so it
//! does not impose a JSON error envelope on callers.

use agent_bridge_core::{BridgeError, QueueError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that are turned into an HTTP response before any header is sent.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No agent is connected.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The agent did not answer in time.
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    /// The agent broke the event protocol.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// The agent answered with an `error` event.
    #[error("Agent error {status}: {message}")]
    Agent { status: StatusCode, message: String },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Agent { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self) -> String {
        match self {
            Self::BadRequest(msg)
            | Self::ServiceUnavailable(msg)
            | Self::GatewayTimeout(msg)
            | Self::BadGateway(msg)
            | Self::Internal(msg)
            | Self::Agent { message: msg, .. } => msg,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, self.message()).into_response()
    }
}

impl From<BridgeError> for HttpError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NoActiveAgent => {
                Self::ServiceUnavailable("no agent connection available".to_string())
            }
            BridgeError::Queue(QueueError::Timeout) => {
                Self::GatewayTimeout("request timed out".to_string())
            }
            BridgeError::AgentReported { status, message } => Self::Agent {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                message,
            },
            BridgeError::UnexpectedEvent(msg) => Self::BadGateway(msg),
            other => Self::Internal(format!("proxy error: {other}")),
        }
    }
}

impl From<QueueError> for HttpError {
    fn from(err: QueueError) -> Self {
        BridgeError::from(err).into()
    }
}
