//! Bridge server bootstrap - the composition root.
//!
//! Both listeners are bound before anything is served (bind-then-report), so
//! callers learn the real addresses, including auto-assigned ports, before
//! the first connection is accepted. A [`CancellationToken`] stops both.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use agent_bridge_core::BridgeConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent_socket::create_agent_router;
use crate::routes::create_router;
use crate::state::{AppState, BridgeContext};

/// CORS configuration for the HTTP surface.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins.
    #[default]
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

/// Error from server startup.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Serving stopped with an I/O error.
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Both listeners, bound and ready to serve.
#[derive(Debug)]
pub struct BridgeServer {
    http: TcpListener,
    agent: TcpListener,
    http_addr: SocketAddr,
    agent_addr: SocketAddr,
    context: AppState,
    cors: CorsConfig,
}

impl BridgeServer {
    /// Bind the HTTP and agent listeners.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] if either address cannot be bound.
    pub async fn bind(config: BridgeConfig) -> Result<Self, ServerError> {
        let (http, http_addr) = bind(&config.http_addr()).await?;
        let (agent, agent_addr) = bind(&config.ws_addr()).await?;

        Ok(Self {
            http,
            agent,
            http_addr,
            agent_addr,
            context: Arc::new(BridgeContext::new(config)),
            cors: CorsConfig::default(),
        })
    }

    #[must_use]
    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    /// Bound address of the HTTP surface.
    pub const fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Bound address of the agent WebSocket listener.
    pub const fn agent_addr(&self) -> SocketAddr {
        self.agent_addr
    }

    /// Shared state, for inspection.
    pub fn context(&self) -> AppState {
        Arc::clone(&self.context)
    }

    /// Serve both listeners until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error either server stops with.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        let http_app = create_router(Arc::clone(&self.context), &self.cors);
        let agent_app = create_agent_router(Arc::clone(&self.context))
            .into_make_service_with_connect_info::<SocketAddr>();

        info!("HTTP server listening on http://{}", self.http_addr);
        info!("Agent WebSocket listening on ws://{}", self.agent_addr);
        info!(mode = %self.context.mode.get(), "Streaming mode");

        let http = axum::serve(self.http, http_app)
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .into_future();
        let agent = axum::serve(self.agent, agent_app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .into_future();

        tokio::try_join!(http, agent)?;

        info!("Bridge shut down");
        Ok(())
    }
}

async fn bind(address: &str) -> Result<(TcpListener, SocketAddr), ServerError> {
    let bind_failed = |e: std::io::Error| ServerError::BindFailed {
        address: address.to_string(),
        reason: e.to_string(),
    };
    let listener = TcpListener::bind(address).await.map_err(bind_failed)?;
    let addr = listener.local_addr().map_err(bind_failed)?;
    Ok((listener, addr))
}
