//! Ports between the core and whatever carries the duplex connection.
//!
//! The transport adapter owns the socket. It hands the core an [`AgentLink`]
//! for outbound frames and reports inbound traffic through a
//! [`ConnectionObserver`].

use std::fmt;

use crate::error::BridgeError;

/// Identifier assigned to a registered duplex connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Outbound half of a duplex connection.
///
/// `send` is fire-and-forget: it queues the frame for transmission and never
/// waits for the peer.
#[cfg_attr(test, mockall::automock)]
pub trait AgentLink: Send + Sync + fmt::Debug {
    /// Queue one text frame for the agent.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] if the connection is already gone.
    fn send(&self, frame: String) -> Result<(), BridgeError>;
}

/// Callbacks a transport invokes for the lifetime of one connection.
pub trait ConnectionObserver: Send + Sync {
    /// A text frame arrived.
    fn on_message(&self, connection: ConnectionId, frame: &str);

    /// The connection closed, cleanly or not.
    fn on_close(&self, connection: ConnectionId);

    /// The transport reported an error. `on_close` follows separately.
    fn on_transport_error(&self, connection: ConnectionId, error: &str);
}
