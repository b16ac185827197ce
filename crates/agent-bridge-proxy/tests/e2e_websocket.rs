//! End-to-end: real listeners, a WebSocket agent and an HTTP client.

mod common;

use std::time::Duration;

use agent_bridge_core::BridgeConfig;
use agent_bridge_proxy::BridgeServer;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use common::{eventually, test_timeouts};

#[tokio::test]
async fn relays_http_request_through_websocket_agent() {
    let config = BridgeConfig::default()
        .with_host("127.0.0.1")
        .with_ports(0, 0)
        .with_timeouts(test_timeouts());
    let server = BridgeServer::bind(config).await.unwrap();
    let http_addr = server.http_addr();
    let agent_addr = server.agent_addr();
    let ctx = server.context();

    let cancel = CancellationToken::new();
    let serving = tokio::spawn(server.run(cancel.clone()));

    // The agent: answer every request with its own path.
    let (socket, _) = connect_async(format!("ws://{agent_addr}/")).await.unwrap();
    let (mut sink, mut stream) = socket.split();
    let agent = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let id = request["request_id"].as_str().unwrap().to_string();
            let events = [
                json!({"request_id": id, "event_type": "response_headers", "status": 200,
                       "headers": {"content-type": "text/plain"}}),
                json!({"request_id": id, "event_type": "chunk",
                       "data": format!("{} {}", request["method"].as_str().unwrap(), request["path"].as_str().unwrap())}),
                json!({"request_id": id, "event_type": "stream_close"}),
            ];
            for event in events {
                sink.send(Message::text(event.to_string())).await.unwrap();
            }
        }
    });

    assert!(eventually(|| ctx.registry.has_active_connections()).await);

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{http_addr}/v1beta/models?key=test"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "GET /v1beta/models");

    let mode = client
        .get(format!("http://{http_addr}/admin/get-mode"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(mode, "current streaming mode: fake");

    agent.abort();
    let _ = agent.await;
    assert!(eventually(|| !ctx.registry.has_active_connections()).await);

    cancel.cancel();
    let stopped = tokio::time::timeout(Duration::from_secs(5), serving).await;
    assert!(matches!(stopped, Ok(Ok(Ok(())))));
}

#[tokio::test]
async fn http_without_agent_is_unavailable() {
    let config = BridgeConfig::default().with_ports(0, 0);
    let server = BridgeServer::bind(config).await.unwrap();
    let http_addr = server.http_addr();

    let cancel = CancellationToken::new();
    let serving = tokio::spawn(server.run(cancel.clone()));

    let response = reqwest::get(format!("http://{http_addr}/anything")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    cancel.cancel();
    assert!(serving.await.unwrap().is_ok());
}
