//! Bridge configuration.
//!
//! Pure values with defaults; the binary fills them from arguments and the
//! environment, tests build them directly.

use std::time::Duration;

use crate::mode::StreamingMode;
use crate::queue::DEFAULT_QUEUE_TIMEOUT;

/// Default port for the HTTP surface.
pub const DEFAULT_HTTP_PORT: u16 = 8889;

/// Default port for the agent's duplex connection.
pub const DEFAULT_WS_PORT: u16 = 9998;

/// Default bind host for both listeners.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Model used on the chat-completion surface when the caller names none.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro-preview-06-05";

/// Inbound request body ceiling.
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024 * 1024;

/// Per-phase wait limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Wait for the first event of a proxied request.
    pub first_event: Duration,
    /// Wait between chunks while streaming for real; expiry ends the stream.
    pub stream_idle: Duration,
    /// Wait for each event on the chat-completion surface.
    pub completion: Duration,
    /// Period of pseudo-streaming keep-alive frames.
    pub keep_alive: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            first_event: DEFAULT_QUEUE_TIMEOUT,
            stream_idle: Duration::from_secs(30),
            completion: Duration::from_secs(300),
            keep_alive: Duration::from_secs(1),
        }
    }
}

/// Configuration for the whole bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Host both listeners bind to.
    pub host: String,
    /// HTTP listen port (0 for auto-assign).
    pub http_port: u16,
    /// Duplex listen port (0 for auto-assign).
    pub ws_port: u16,
    /// Streaming mode at startup.
    pub initial_mode: StreamingMode,
    pub timeouts: Timeouts,
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
    /// Fallback model id for chat completions.
    pub default_model: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            ws_port: DEFAULT_WS_PORT,
            initial_mode: StreamingMode::default(),
            timeouts: Timeouts::default(),
            body_limit: DEFAULT_BODY_LIMIT,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl BridgeConfig {
    /// `host:http_port`.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// `host:ws_port`.
    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.host, self.ws_port)
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn with_ports(mut self, http_port: u16, ws_port: u16) -> Self {
        self.http_port = http_port;
        self.ws_port = ws_port;
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: StreamingMode) -> Self {
        self.initial_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BridgeConfig::default();
        assert_eq!(config.http_addr(), "127.0.0.1:8889");
        assert_eq!(config.ws_addr(), "127.0.0.1:9998");
        assert_eq!(config.initial_mode, StreamingMode::Fake);
        assert_eq!(config.timeouts.first_event, Duration::from_secs(600));
        assert_eq!(config.timeouts.stream_idle, Duration::from_secs(30));
        assert_eq!(config.timeouts.keep_alive, Duration::from_secs(1));
        assert_eq!(config.body_limit, 100 * 1024 * 1024);
    }

    #[test]
    fn builders_override_fields() {
        let config = BridgeConfig::default()
            .with_host("0.0.0.0")
            .with_ports(0, 0)
            .with_mode(StreamingMode::Real);
        assert_eq!(config.http_addr(), "0.0.0.0:0");
        assert_eq!(config.initial_mode, StreamingMode::Real);
    }
}
