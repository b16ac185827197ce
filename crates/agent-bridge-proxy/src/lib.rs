//! Axum adapter for agent-bridge.
//!
//! Hosts two listeners: the HTTP surface clients call, and the WebSocket
//! endpoint the remote agent connects to. Requests that are not served
//! locally are relayed to the agent and answered from its events.
//!
//! - [`relay`] and [`delivery`]: the generic reverse proxy (real and fake
//!   streaming).
//! - [`adapter`] and [`translate`]: OpenAI chat completions over the agent's
//!   native `generateContent` surface.
//! - [`agent_socket`]: the agent side of the bridge.
//! - [`bootstrap`]: binding and serving both listeners.

#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by the integration tests
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use reqwest as _;
#[cfg(test)]
use tokio_tungstenite as _;
#[cfg(test)]
use tower as _;

pub mod adapter;
pub mod agent_socket;
pub mod bootstrap;
pub mod delivery;
pub mod error;
pub mod generate_content;
pub mod handlers;
pub mod models;
pub mod relay;
pub mod routes;
pub mod state;
pub mod translate;

pub use bootstrap::{BridgeServer, CorsConfig, ServerError};
pub use error::HttpError;
pub use routes::create_router;
pub use state::{AppState, BridgeContext};
