//! In-process stand-in for the remote agent.
//!
//! The agent is registered with the registry through an [`AgentLink`] backed
//! by a channel. For every request it receives, it runs a script and routes
//! the scripted events back through the registry, as the WebSocket ingest
//! task would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_bridge_core::{
    AgentLink, BridgeError, ConnectionId, ConnectionObserver, ConnectionRegistry, WireRequest,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// One step of an agent's answer.
#[derive(Debug, Clone)]
pub enum Step {
    /// Send an event; `request_id` is filled in.
    Event(Value),
    /// Pause before the next step.
    Wait(Duration),
}

pub fn headers(status: u16, headers: Value) -> Step {
    Step::Event(json!({"event_type": "response_headers", "status": status, "headers": headers}))
}

pub fn chunk(data: &str) -> Step {
    Step::Event(json!({"event_type": "chunk", "data": data}))
}

pub fn error(status: u16, message: &str) -> Step {
    Step::Event(json!({"event_type": "error", "status": status, "message": message}))
}

pub fn close() -> Step {
    Step::Event(json!({"event_type": "stream_close"}))
}

#[derive(Debug)]
struct ChannelLink(mpsc::UnboundedSender<String>);

impl AgentLink for ChannelLink {
    fn send(&self, frame: String) -> Result<(), BridgeError> {
        self.0
            .send(frame)
            .map_err(|_| BridgeError::Transport("scripted agent gone".into()))
    }
}

/// Handle to a connected scripted agent.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    pub id: ConnectionId,
    requests: Arc<Mutex<Vec<WireRequest>>>,
}

impl ScriptedAgent {
    /// Register an agent that answers each request with `script(request)`.
    pub fn connect<F>(registry: &Arc<ConnectionRegistry>, script: F) -> Self
    where
        F: Fn(&WireRequest) -> Vec<Step> + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let id = registry.add_connection(Arc::new(ChannelLink(tx)), "scripted");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let registry = Arc::clone(registry);
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let request: WireRequest = serde_json::from_str(&frame).unwrap();
                seen.lock().unwrap().push(request.clone());

                let steps = script(&request);
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    for step in steps {
                        match step {
                            Step::Wait(pause) => tokio::time::sleep(pause).await,
                            Step::Event(mut event) => {
                                event["request_id"] = json!(request.request_id);
                                registry.on_message(id, &event.to_string());
                            }
                        }
                    }
                });
            }
        });

        Self { id, requests }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap().clone()
    }
}
