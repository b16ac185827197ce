//! Connection registry: live agent connections and the request-id → queue
//! table.
//!
//! The registry is the only owner of both tables. Request handlers receive a
//! [`RequestSlot`] and never touch the table directly.
//!
//! Single-agent model:
//! - the first registered connection receives every new [`WireRequest`];
//! - inbound events are routed by request id whichever connection they arrive on;
//! - when any connection drops, every outstanding queue is closed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, QueueError, Result};
use crate::ports::{AgentLink, ConnectionId, ConnectionObserver};
use crate::queue::MessageQueue;
use crate::wire::{QueueItem, WireRequest, parse_inbound};

struct Registered {
    id: ConnectionId,
    peer: String,
    link: Arc<dyn AgentLink>,
}

#[derive(Default)]
struct RegistryState {
    /// Registration order; index 0 is the active agent.
    connections: Vec<Registered>,
    queues: HashMap<String, Arc<MessageQueue>>,
}

/// Tracks agent connections and routes their events to request queues.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
    next_connection: AtomicU64,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &state.connections.len())
            .field("queues", &state.queues.len())
            .finish()
    }
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection. The transport must then report its traffic
    /// through this registry's [`ConnectionObserver`] implementation.
    pub fn add_connection(&self, link: Arc<dyn AgentLink>, peer: impl Into<String>) -> ConnectionId {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed) + 1);
        let peer = peer.into();
        let total = {
            let mut state = self.lock();
            state.connections.push(Registered {
                id,
                peer: peer.clone(),
                link,
            });
            state.connections.len()
        };
        info!(connection_id = %id, peer = %peer, total, "Agent connected");
        id
    }

    /// Drop a connection and force-close every outstanding queue.
    ///
    /// An id that is not registered closes nothing. Returns the number of
    /// queues that were closed.
    pub fn remove_connection(&self, id: ConnectionId) -> usize {
        let (removed, queues) = {
            let mut state = self.lock();
            let before = state.connections.len();
            state.connections.retain(|c| c.id != id);
            let removed = before != state.connections.len();
            let queues: Vec<_> = if removed {
                state.queues.drain().map(|(_, q)| q).collect()
            } else {
                Vec::new()
            };
            (removed, queues)
        };

        for queue in &queues {
            queue.close();
        }

        if removed {
            info!(
                connection_id = %id,
                closed_requests = queues.len(),
                "Agent disconnected"
            );
        } else {
            debug!(connection_id = %id, "Disconnect for unknown connection");
        }
        queues.len()
    }

    /// True if at least one agent is connected.
    pub fn has_active_connections(&self) -> bool {
        !self.lock().connections.is_empty()
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// Number of requests with a live queue.
    pub fn pending_requests(&self) -> usize {
        self.lock().queues.len()
    }

    pub fn has_message_queue(&self, request_id: &str) -> bool {
        self.lock().queues.contains_key(request_id)
    }

    /// Register a queue for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DuplicateRequestId`] if one already exists.
    pub fn create_message_queue(&self, request_id: &str) -> Result<Arc<MessageQueue>> {
        let mut state = self.lock();
        if state.queues.contains_key(request_id) {
            return Err(BridgeError::DuplicateRequestId(request_id.to_string()));
        }
        let queue = Arc::new(MessageQueue::new());
        state
            .queues
            .insert(request_id.to_string(), Arc::clone(&queue));
        Ok(queue)
    }

    /// Close and unregister the queue for `request_id`, if any.
    pub fn remove_message_queue(&self, request_id: &str) {
        let queue = self.lock().queues.remove(request_id);
        if let Some(queue) = queue {
            queue.close();
            debug!(request_id, "Message queue removed");
        }
    }

    /// Register a queue and return a slot that removes it on drop.
    ///
    /// The slot must exist before the matching [`WireRequest`] is dispatched,
    /// so no event can arrive for an id without a mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DuplicateRequestId`] if the id is in flight.
    pub fn open_request(self: &Arc<Self>, request_id: &str) -> Result<RequestSlot> {
        let queue = self.create_message_queue(request_id)?;
        Ok(RequestSlot {
            request_id: request_id.to_string(),
            queue,
            registry: Arc::clone(self),
        })
    }

    /// Send a request to the active agent.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::NoActiveAgent`] if nothing is connected.
    /// - [`BridgeError::Transport`] if the active connection refused the frame.
    pub fn dispatch(&self, request: &WireRequest) -> Result<()> {
        let frame = request.to_frame()?;
        let (id, link) = {
            let state = self.lock();
            let active = state.connections.first().ok_or(BridgeError::NoActiveAgent)?;
            (active.id, Arc::clone(&active.link))
        };

        debug!(
            request_id = %request.request_id,
            connection_id = %id,
            method = %request.method,
            path = %request.path,
            mode = %request.streaming_mode,
            "Dispatching request to agent"
        );
        link.send(frame)
    }

    /// Route one inbound frame to its queue.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::MalformedWireMessage`] for unparseable frames, frames
    ///   without a request id and unknown event types.
    /// - [`BridgeError::UnroutableWireEvent`] when no queue exists for the id.
    pub fn route_frame(&self, frame: &str) -> Result<()> {
        let inbound = parse_inbound(frame)?;

        let queue = self
            .lock()
            .queues
            .get(&inbound.request_id)
            .cloned()
            .ok_or_else(|| BridgeError::UnroutableWireEvent(inbound.request_id.clone()))?;

        let event = inbound.event.map_err(|reason| {
            BridgeError::MalformedWireMessage(format!(
                "unknown event for {}: {reason}",
                inbound.request_id
            ))
        })?;

        queue.enqueue(QueueItem::from(event));
        Ok(())
    }

    /// Peer address of a connection, for diagnostics.
    pub fn peer(&self, id: ConnectionId) -> Option<String> {
        self.lock()
            .connections
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.peer.clone())
    }
}

impl ConnectionObserver for ConnectionRegistry {
    fn on_message(&self, connection: ConnectionId, frame: &str) {
        match self.route_frame(frame) {
            Ok(()) => {}
            Err(BridgeError::UnroutableWireEvent(request_id)) => {
                warn!(
                    connection_id = %connection,
                    request_id = %request_id,
                    "Dropping event for unknown request id"
                );
            }
            Err(e) => {
                warn!(connection_id = %connection, error = %e, "Dropping invalid agent message");
            }
        }
    }

    fn on_close(&self, connection: ConnectionId) {
        self.remove_connection(connection);
    }

    fn on_transport_error(&self, connection: ConnectionId, error: &str) {
        error!(connection_id = %connection, error, "Agent connection error");
    }
}

/// Ownership of one request's queue. Dropping it removes the queue from the
/// registry, so no queue outlives its request.
#[derive(Debug)]
pub struct RequestSlot {
    request_id: String,
    queue: Arc<MessageQueue>,
    registry: Arc<ConnectionRegistry>,
}

impl RequestSlot {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// Receive the next item for this request.
    pub async fn next(&self, timeout: Duration) -> std::result::Result<QueueItem, QueueError> {
        self.queue.dequeue(timeout).await
    }

    /// Send `request` to the agent through the owning registry.
    ///
    /// # Errors
    ///
    /// See [`ConnectionRegistry::dispatch`].
    pub fn dispatch(&self, request: &WireRequest) -> Result<()> {
        self.registry.dispatch(request)
    }
}

impl Drop for RequestSlot {
    fn drop(&mut self) {
        self.registry.remove_message_queue(&self.request_id);
    }
}
