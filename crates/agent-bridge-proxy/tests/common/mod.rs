//! Shared helpers for router-level tests.

#![allow(dead_code)]

pub mod agent;

use std::sync::Arc;
use std::time::Duration;

use agent_bridge_core::{BridgeConfig, Timeouts};
use agent_bridge_proxy::{AppState, BridgeContext, CorsConfig, create_router};
use axum::Router;
use axum::body::Body;
use axum::http::Response;
use http_body_util::BodyExt;

/// Timeouts short enough for tests, long enough not to fire by accident.
pub fn test_timeouts() -> Timeouts {
    Timeouts {
        first_event: Duration::from_secs(5),
        stream_idle: Duration::from_secs(5),
        completion: Duration::from_secs(5),
        keep_alive: Duration::from_secs(60),
    }
}

pub fn test_context() -> AppState {
    context_with(BridgeConfig::default().with_timeouts(test_timeouts()))
}

pub fn context_with(config: BridgeConfig) -> AppState {
    Arc::new(BridgeContext::new(config))
}

pub fn app(ctx: &AppState) -> Router {
    create_router(Arc::clone(ctx), &CorsConfig::AllowAll)
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Payloads of an SSE body, in order.
pub fn sse_data(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(str::to_string)
        .collect()
}

/// Poll `condition` until it holds or a second has passed.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
