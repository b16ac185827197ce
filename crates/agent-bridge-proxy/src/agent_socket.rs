//! WebSocket listener for the remote agent.
//!
//! Any path on the agent port upgrades to a WebSocket. Each connection is
//! registered with the [`ConnectionRegistry`] and served by two tasks:
//!
//! * **Ingest** reads text frames and hands them to the registry for routing.
//!   Binary frames carrying UTF-8 are treated as text.
//! * **Egress** drains the connection's outbound channel into the socket.
//!
//! When either task ends, the other is aborted and the connection is removed,
//! which closes every outstanding request queue.

use std::net::SocketAddr;
use std::sync::Arc;

use agent_bridge_core::{AgentLink, BridgeError, ConnectionObserver, ConnectionRegistry};
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::AppState;

/// Router served on the agent port.
pub fn create_agent_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(agent_socket))
        .route("/{*path}", get(agent_socket))
        .with_state(state)
}

/// Upgrade handler for agent connections.
pub async fn agent_socket(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let registry = Arc::clone(&state.registry);
    ws.on_upgrade(move |socket| serve_agent(socket, peer.to_string(), registry))
}

/// Outbound half of an agent WebSocket.
#[derive(Debug)]
struct WsLink {
    tx: mpsc::UnboundedSender<String>,
}

impl AgentLink for WsLink {
    fn send(&self, frame: String) -> Result<(), BridgeError> {
        self.tx
            .send(frame)
            .map_err(|_| BridgeError::Transport("agent connection closed".to_string()))
    }
}

/// Serve one agent connection until it closes.
pub async fn serve_agent(socket: WebSocket, peer: String, registry: Arc<ConnectionRegistry>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = registry.add_connection(Arc::new(WsLink { tx }), peer.clone());
    debug!(connection_id = %id, %peer, "Agent session started");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let observer = Arc::clone(&registry);
    let mut ingest = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => observer.on_message(id, text.as_str()),
                Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                    Ok(text) => observer.on_message(id, text),
                    Err(_) => warn!(connection_id = %id, bytes = data.len(), "Dropping non-UTF-8 frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(connection_id = %id, ?frame, "Agent sent close");
                    break;
                }
                // Ping/pong are answered by the socket itself.
                Ok(_) => {}
                Err(e) => {
                    observer.on_transport_error(id, &e.to_string());
                    break;
                }
            }
        }
    });

    let mut egress = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut ingest => { egress.abort(); }
        _ = &mut egress => { ingest.abort(); }
    }

    registry.on_close(id);
    debug!(connection_id = %id, %peer, "Agent session ended");
}
