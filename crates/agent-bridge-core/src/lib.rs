//! Core of agent-bridge: everything needed to correlate HTTP requests with
//! events coming back from a remote execution agent, with no HTTP or socket
//! dependency.
//!
//! - [`wire`]: the duplex JSON protocol.
//! - [`queue`]: per-request mailboxes with deadline receives.
//! - [`registry`]: live connections and the request-id → queue table.
//! - [`ports`]: what a transport adapter implements and calls.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod mode;
pub mod ports;
pub mod queue;
pub mod registry;
pub mod request_id;
pub mod wire;

pub use config::{BridgeConfig, DEFAULT_MODEL, Timeouts};
pub use error::{BridgeError, QueueError, Result};
pub use mode::{InvalidMode, ModeSwitch, StreamingMode};
pub use ports::{AgentLink, ConnectionId, ConnectionObserver};
pub use queue::{DEFAULT_QUEUE_TIMEOUT, MessageQueue};
pub use registry::{ConnectionRegistry, RequestSlot};
pub use request_id::generate_request_id;
pub use wire::{QueueItem, WireEvent, WireRequest};
